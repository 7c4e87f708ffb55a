//! XMA audio (RIFF/WAVE container with an XMA or XMA2 stream).

use crate::formats::{Category, Format, ParseContext, ParseResult, Signature, keys};
use crate::reader;

const SIGNATURES: [Signature; 1] = [Signature {
    id: "xma_riff",
    magic: b"RIFF",
    description: "XMA audio stream",
}];

/// Chunk scan reach from the start of the file.
const CHUNK_SCAN_LIMIT: usize = 200;

const WAVE_FORMAT_XMA: u16 = 0x0165;
const WAVE_FORMAT_XMA2: u16 = 0x0166;

pub struct XmaFormat;

struct XmaInfo {
    file_size: u32,
    format_tag: u16,
    has_seek_chunk: bool,
}

fn read_info(h: &[u8]) -> Option<XmaInfo> {
    if !h.starts_with(b"RIFF") {
        return None;
    }
    let declared = reader::u32_le(h, 4)?;
    let file_size = declared.checked_add(8)?;
    if h.get(8..12) != Some(b"WAVE".as_slice()) {
        return None;
    }

    let mut format_tag = None;
    let mut has_seek_chunk = false;
    let limit = h.len().min(CHUNK_SCAN_LIMIT);
    let mut pos = 12usize;
    while pos + 8 <= limit {
        let id = &h[pos..pos + 4];
        let chunk_size = reader::u32_le(h, pos + 4)? as usize;
        match id {
            b"XMA2" => {
                format_tag.get_or_insert(WAVE_FORMAT_XMA2);
            }
            b"fmt " => {
                let tag = reader::u16_le(h, pos + 8)?;
                if tag == WAVE_FORMAT_XMA || tag == WAVE_FORMAT_XMA2 {
                    format_tag = Some(tag);
                }
            }
            b"seek" => has_seek_chunk = true,
            _ => {}
        }
        // RIFF chunks are word-aligned
        pos = pos + 8 + chunk_size;
        pos += pos & 1;
    }

    format_tag.map(|format_tag| XmaInfo {
        file_size,
        format_tag,
        has_seek_chunk,
    })
}

impl Format for XmaFormat {
    fn format_id(&self) -> &'static str {
        "xma"
    }

    fn display_name(&self) -> &'static str {
        "XMA Audio"
    }

    fn extension(&self) -> &'static str {
        ".xma"
    }

    fn category(&self) -> Category {
        Category::Audio
    }

    fn output_folder(&self) -> &'static str {
        "xma"
    }

    fn min_size(&self) -> u32 {
        44
    }

    fn max_size(&self) -> u32 {
        100 * 1024 * 1024
    }

    fn signatures(&self) -> &'static [Signature] {
        &SIGNATURES
    }

    fn parse(&self, window: &[u8], at: usize, _ctx: &ParseContext<'_>) -> Option<ParseResult> {
        let h = window.get(at..)?;
        let info = read_info(h)?;

        let mut result = ParseResult::new("XMA", info.file_size);
        result.set(keys::FORMAT_TAG, info.format_tag);
        result.set(keys::HAS_SEEK_CHUNK, info.has_seek_chunk);
        result.set(
            keys::NEEDS_REPAIR,
            info.format_tag == WAVE_FORMAT_XMA2 && !info.has_seek_chunk,
        );
        result.set(keys::IS_XMA, true);
        Some(result)
    }

    fn as_repairer(&self) -> Option<&dyn crate::convert::Repairer> {
        static REPAIRER: crate::convert::xma_repair::XmaRepairer =
            crate::convert::xma_repair::XmaRepairer;
        Some(&REPAIRER)
    }
}

#[cfg(test)]
pub(crate) fn synth_xma(payload_len: usize, tag: u16, with_seek: bool) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"RIFF");
    data.extend_from_slice(&0u32.to_le_bytes()); // patched below
    data.extend_from_slice(b"WAVE");

    data.extend_from_slice(b"fmt ");
    data.extend_from_slice(&16u32.to_le_bytes());
    data.extend_from_slice(&tag.to_le_bytes());
    data.extend_from_slice(&[0u8; 14]);

    if with_seek {
        data.extend_from_slice(b"seek");
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(&[0u8; 4]);
    }

    data.extend_from_slice(b"data");
    data.extend_from_slice(&(payload_len as u32).to_le_bytes());
    data.extend_from_slice(&vec![0u8; payload_len]);

    let declared = (data.len() - 8) as u32;
    data[4..8].copy_from_slice(&declared.to_le_bytes());
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::testutil::{bare_boundary, ctx_at};

    fn parse(data: &[u8]) -> Option<ParseResult> {
        let boundary = bare_boundary();
        let ctx = ctx_at(data, 0, &boundary, "xma_riff");
        XmaFormat.parse(data, 0, &ctx)
    }

    #[test]
    fn sizes_from_riff_header() {
        let data = synth_xma(256, WAVE_FORMAT_XMA2, true);
        let r = parse(&data).expect("parse");
        assert_eq!(r.estimated_size as usize, data.len());
        assert_eq!(r.metadata[keys::FORMAT_TAG], WAVE_FORMAT_XMA2);
        assert_eq!(r.metadata[keys::HAS_SEEK_CHUNK], true);
        assert_eq!(r.metadata[keys::NEEDS_REPAIR], false);
    }

    #[test]
    fn xma2_without_seek_needs_repair() {
        let data = synth_xma(64, WAVE_FORMAT_XMA2, false);
        let r = parse(&data).expect("parse");
        assert_eq!(r.metadata[keys::NEEDS_REPAIR], true);
    }

    #[test]
    fn plain_pcm_wave_is_rejected() {
        let data = synth_xma(64, 0x0001, false);
        assert!(parse(&data).is_none());
    }

    #[test]
    fn non_wave_riff_is_rejected() {
        let mut data = synth_xma(64, WAVE_FORMAT_XMA, false);
        data[8..12].copy_from_slice(b"AVI ");
        assert!(parse(&data).is_none());
    }
}
