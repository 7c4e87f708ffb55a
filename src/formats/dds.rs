//! DDS (DirectDraw Surface) texture headers.
//!
//! Dumps carry both little-endian PC-style headers and byte-swapped Xbox 360
//! ones. A header whose dimensions read absurd under LE is re-read as BE and
//! tagged `isXbox360`.

use crate::formats::{Category, Format, ParseContext, ParseResult, Signature, keys};
use crate::reader;

const SIGNATURES: [Signature; 1] = [Signature {
    id: "dds",
    magic: b"DDS ",
    description: "DirectDraw Surface texture",
}];

const HEADER_LEN: usize = 128;
const MAX_DIM: u32 = 16384;
const MAX_MIP_LEVELS: u32 = 16;

pub struct DdsFormat;

struct DdsHeader {
    width: u32,
    height: u32,
    mip_count: u32,
    fourcc: [u8; 4],
    is_xbox360: bool,
}

fn read_header(h: &[u8]) -> Option<DdsHeader> {
    if h.len() < HEADER_LEN || !h.starts_with(b"DDS ") {
        return None;
    }

    let mut header_size = reader::u32_le(h, 4)?;
    let mut height = reader::u32_le(h, 12)?;
    let mut width = reader::u32_le(h, 16)?;
    let mut mip_count = reader::u32_le(h, 28)?;
    let mut is_xbox360 = false;

    if width > MAX_DIM || height > MAX_DIM || header_size != 124 {
        header_size = reader::u32_be(h, 4)?;
        height = reader::u32_be(h, 12)?;
        width = reader::u32_be(h, 16)?;
        mip_count = reader::u32_be(h, 28)?;
        is_xbox360 = true;
    }

    if header_size != 124 || width == 0 || height == 0 || width > MAX_DIM || height > MAX_DIM {
        return None;
    }

    let mut fourcc = [0u8; 4];
    fourcc.copy_from_slice(h.get(84..88)?);

    Some(DdsHeader {
        width,
        height,
        mip_count,
        fourcc,
        is_xbox360,
    })
}

fn bytes_per_block(fourcc: &[u8; 4]) -> u64 {
    match fourcc {
        b"DXT1" | b"BC4U" | b"BC4S" | b"ATI1" => 8,
        _ => 16,
    }
}

/// 128-byte header plus the block-compressed payload of every mip level,
/// capped at 16 levels. A mip count of zero means a single level.
fn estimate_size(width: u32, height: u32, mip_count: u32, fourcc: &[u8; 4]) -> Option<u32> {
    let levels = mip_count.clamp(1, MAX_MIP_LEVELS);
    let bpb = bytes_per_block(fourcc);

    let mut total = HEADER_LEN as u64;
    let (mut w, mut h) = (width as u64, height as u64);
    for _ in 0..levels {
        total += w.div_ceil(4) * h.div_ceil(4) * bpb;
        w = (w / 2).max(1);
        h = (h / 2).max(1);
    }
    u32::try_from(total).ok()
}

impl Format for DdsFormat {
    fn format_id(&self) -> &'static str {
        "dds"
    }

    fn display_name(&self) -> &'static str {
        "DDS Texture"
    }

    fn extension(&self) -> &'static str {
        ".dds"
    }

    fn category(&self) -> Category {
        Category::Texture
    }

    fn output_folder(&self) -> &'static str {
        "dds"
    }

    fn min_size(&self) -> u32 {
        HEADER_LEN as u32
    }

    fn max_size(&self) -> u32 {
        64 * 1024 * 1024
    }

    fn signatures(&self) -> &'static [Signature] {
        &SIGNATURES
    }

    fn parse(&self, window: &[u8], at: usize, _ctx: &ParseContext<'_>) -> Option<ParseResult> {
        let h = window.get(at..)?;
        let header = read_header(h)?;
        let size = estimate_size(header.width, header.height, header.mip_count, &header.fourcc)?;

        let format_name = String::from_utf8_lossy(&header.fourcc).trim_end().to_string();
        let mut result = ParseResult::new("DDS", size);
        result.set(keys::WIDTH, header.width);
        result.set(keys::HEIGHT, header.height);
        result.set(keys::MIP_COUNT, header.mip_count);
        result.set(keys::FORMAT_NAME, format_name);
        result.set(
            keys::DIMENSIONS,
            format!("{}x{}", header.width, header.height),
        );
        result.set(keys::IS_XBOX_360, header.is_xbox360);
        Some(result)
    }
}
