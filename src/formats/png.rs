use memchr::memmem;

use crate::formats::{Category, Format, ParseContext, ParseResult, Signature, keys};
use crate::reader;

const SIGNATURES: [Signature; 1] = [Signature {
    id: "png",
    magic: b"\x89PNG\x0D\x0A\x1A\x0A",
    description: "PNG image",
}];

/// Forward scan limit when hunting for the IEND chunk.
const IEND_SCAN_LIMIT: usize = 50 * 1024 * 1024;

pub struct PngFormat;

impl Format for PngFormat {
    fn format_id(&self) -> &'static str {
        "png"
    }

    fn display_name(&self) -> &'static str {
        "PNG Image"
    }

    fn extension(&self) -> &'static str {
        ".png"
    }

    fn category(&self) -> Category {
        Category::Image
    }

    fn output_folder(&self) -> &'static str {
        "png"
    }

    fn min_size(&self) -> u32 {
        57 // signature + IHDR + empty IDAT + IEND
    }

    fn max_size(&self) -> u32 {
        IEND_SCAN_LIMIT as u32
    }

    fn signatures(&self) -> &'static [Signature] {
        &SIGNATURES
    }

    fn parse(&self, window: &[u8], at: usize, ctx: &ParseContext<'_>) -> Option<ParseResult> {
        let h = window.get(at..)?;
        if !h.starts_with(SIGNATURES[0].magic) {
            return None;
        }

        // The payload usually exceeds the header window; hunt for IEND over
        // the dump itself.
        let start = ctx.header_offset as usize;
        let limit = ctx.dump.len().min(start + IEND_SCAN_LIMIT);
        let hay = ctx.dump.get(start..limit)?;
        let iend = memmem::find(&hay[8..], b"IEND")? + 8;
        let size = u32::try_from(iend + 8).ok()?;

        let mut result = ParseResult::new("PNG", size);
        if h.get(12..16) == Some(b"IHDR".as_slice()) {
            if let (Some(width), Some(height)) = (reader::u32_be(h, 16), reader::u32_be(h, 20)) {
                result.set(keys::WIDTH, width);
                result.set(keys::HEIGHT, height);
                result.set(keys::DIMENSIONS, format!("{width}x{height}"));
            }
        }
        Some(result)
    }
}

#[cfg(test)]
pub(crate) fn synth_png(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"\x89PNG\x0D\x0A\x1A\x0A");
    data.extend_from_slice(&13u32.to_be_bytes());
    data.extend_from_slice(b"IHDR");
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&[8, 2, 0, 0, 0]);
    data.extend_from_slice(&[0u8; 4]); // crc
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(b"IDAT");
    data.extend_from_slice(&[0u8; 4]);
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(b"IEND");
    data.extend_from_slice(&[0u8; 4]);
    data
}
