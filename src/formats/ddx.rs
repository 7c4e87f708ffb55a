//! DDX engine textures (3XDO / 3XDR variants).
//!
//! DDX is the console build of the engine's texture container: a 0x44-byte
//! header with big-endian GPU fields, followed by tiled block-compressed
//! data. The header does not declare its own length, so sizing combines a
//! boundary scan with a compression-ratio fallback derived from the mip
//! chain. A path literal frequently precedes the header and becomes the
//! output filename.

use crate::formats::{Category, Format, ParseContext, ParseResult, Signature, keys};
use crate::pathext;
use crate::reader;

const SIGNATURES: [Signature; 2] = [
    Signature {
        id: "ddx_3xdo",
        magic: b"3XDO",
        description: "DDX texture (opaque)",
    },
    Signature {
        id: "ddx_3xdr",
        magic: b"3XDR",
        description: "DDX texture (runtime)",
    },
];

pub const HEADER_LEN: usize = 0x44;
const MAX_DIM: u32 = 4096;
const MAX_MIPS: u32 = 13;

pub struct DdxFormat;

struct DdxHeader {
    width: u32,
    height: u32,
    mip_count: u32,
    gpu_format: u32,
    tiled: bool,
    version: u16,
}

fn read_header(h: &[u8]) -> Option<DdxHeader> {
    if h.len() < HEADER_LEN {
        return None;
    }
    let version = reader::u16_le(h, 7)?;
    if version < 3 {
        return None;
    }
    if h[4] == 0xFF {
        return None;
    }
    if h[0x24] < 0x80 {
        return None;
    }

    let gpu_format = reader::u32_be(h, 0x28)? & 0xFF;
    let dims = reader::u32_be(h, 0x2C)?;
    let width = (dims & 0x1FFF) + 1;
    let height = ((dims >> 13) & 0x1FFF) + 1;
    let mip_count = (((dims >> 16) & 0xF) + 1).min(MAX_MIPS);
    let tiled = (reader::u32_be(h, 0x24)? >> 22) & 1 == 1;

    if width > MAX_DIM || height > MAX_DIM {
        return None;
    }

    Some(DdxHeader {
        width,
        height,
        mip_count,
        gpu_format,
        tiled,
        version,
    })
}

/// Xenos GPU format byte to the DXT family, 0x40-flagged variants included.
fn gpu_format_name(gpu: u32) -> Option<(&'static str, u64)> {
    match gpu & !0x40 {
        0x12 => Some(("DXT1", 8)),
        0x13 => Some(("DXT3", 16)),
        0x14 => Some(("DXT5", 16)),
        0x1A => Some(("ATI1", 8)),
        0x1B => Some(("ATI2", 16)),
        _ => None,
    }
}

fn uncompressed_size(width: u32, height: u32, mip_count: u32, bpb: u64) -> u64 {
    let (mut w, mut h) = (width as u64, height as u64);
    let mut total = 0u64;
    for _ in 0..mip_count.max(1) {
        total += w.div_ceil(4) * h.div_ceil(4) * bpb;
        w = (w / 2).max(1);
        h = (h / 2).max(1);
    }
    total
}

impl Format for DdxFormat {
    fn format_id(&self) -> &'static str {
        "ddx"
    }

    fn display_name(&self) -> &'static str {
        "DDX Texture"
    }

    fn extension(&self) -> &'static str {
        ".ddx"
    }

    fn category(&self) -> Category {
        Category::Texture
    }

    fn output_folder(&self) -> &'static str {
        "ddx"
    }

    fn min_size(&self) -> u32 {
        HEADER_LEN as u32
    }

    fn max_size(&self) -> u32 {
        32 * 1024 * 1024
    }

    fn signatures(&self) -> &'static [Signature] {
        &SIGNATURES
    }

    fn parse(&self, window: &[u8], at: usize, ctx: &ParseContext<'_>) -> Option<ParseResult> {
        let h = window.get(at..)?;
        let header = read_header(h)?;
        let (format_name, bpb) = gpu_format_name(header.gpu_format)?;

        let uncompressed =
            uncompressed_size(header.width, header.height, header.mip_count, bpb);
        // Tiled console textures rarely compress below ~70% of the DXT
        // payload; the fallback keeps a truncated boundary scan honest.
        let ratio_fallback = (HEADER_LEN as u64 + (7 * uncompressed / 10).max(100))
            .min(self.max_size() as u64) as u32;

        let magic: &[u8] = if ctx.signature_id == "ddx_3xdr" {
            b"3XDR"
        } else {
            b"3XDO"
        };
        let estimated = ctx.boundary.find_boundary(
            ctx.dump,
            ctx.header_offset as usize,
            self.min_size(),
            self.max_size(),
            ratio_fallback,
            Some(magic),
            true,
        );

        let variant = if magic == b"3XDR" { "3XDR" } else { "3XDO" };
        let mut result = ParseResult::new(variant, estimated);
        result.set(keys::WIDTH, header.width);
        result.set(keys::HEIGHT, header.height);
        result.set(
            keys::DIMENSIONS,
            format!("{}x{}", header.width, header.height),
        );
        result.set(keys::MIP_COUNT, header.mip_count);
        result.set(keys::FORMAT_NAME, format_name);
        result.set(keys::GPU_FORMAT, header.gpu_format);
        result.set(keys::IS_TILED, header.tiled);
        result.set(keys::VERSION, header.version);
        result.set("variant", variant);

        if let Some(path) =
            pathext::find_preceding_path(window, at, ".ddx", pathext::DEFAULT_MAX_DIST)
        {
            if let Some(name) = path.rsplit(['\\', '/']).next() {
                result.file_name = Some(name.to_string());
            }
            if let Some(stem) = pathext::stem_of(&path) {
                result.set(keys::SAFE_NAME, stem);
            }
            result.set(keys::TEXTURE_PATH, path);
        }

        Some(result)
    }

    fn as_converter(&self) -> Option<&dyn crate::convert::Converter> {
        use once_cell::sync::Lazy;
        static CONVERTER: Lazy<crate::convert::ddx_dds::DdxConverter> =
            Lazy::new(crate::convert::ddx_dds::DdxConverter::from_env);
        Some(&*CONVERTER)
    }
}

#[cfg(test)]
pub(crate) fn synth_ddx(width: u32, height: u32, mips: u32, variant: &[u8; 4]) -> Vec<u8> {
    let mut h = vec![0u8; HEADER_LEN];
    h[0..4].copy_from_slice(variant);
    h[4] = 0x00;
    h[7..9].copy_from_slice(&5u16.to_le_bytes());
    // flags dword at 0x24: high byte >= 0x80, tiled bit set
    let flags: u32 = 0x9040_0000;
    h[0x24..0x28].copy_from_slice(&flags.to_be_bytes());
    // gpu format DXT1
    h[0x28..0x2C].copy_from_slice(&0x12u32.to_be_bytes());
    let dims: u32 = (width - 1) | ((height - 1) << 13) | ((mips - 1) << 16);
    h[0x2C..0x30].copy_from_slice(&dims.to_be_bytes());
    h
}
