//! Bink video streams. The header declares the file size directly.

use crate::formats::{Category, Format, ParseContext, ParseResult, Signature, keys};
use crate::reader;

const SIGNATURES: [Signature; 1] = [Signature {
    id: "bik",
    magic: b"BIK",
    description: "Bink video",
}];

const MAX_FRAMES: u32 = 1_000_000;

pub struct BikFormat;

impl Format for BikFormat {
    fn format_id(&self) -> &'static str {
        "bik"
    }

    fn display_name(&self) -> &'static str {
        "Bink Video"
    }

    fn extension(&self) -> &'static str {
        ".bik"
    }

    fn category(&self) -> Category {
        Category::Video
    }

    fn output_folder(&self) -> &'static str {
        "video"
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
        let revision = *h.get(3)?;
        if !(b'b'..=b'i').contains(&revision) {
            return None;
        }
        let declared = reader::u32_le(h, 4)?;
        let frames = reader::u32_le(h, 8)?;
        if frames == 0 || frames > MAX_FRAMES {
            return None;
        }
        let size = declared.checked_add(8)?;

        let mut result = ParseResult::new("BIK", size);
        result.set("frames", frames);
        result.set(keys::VERSION, (revision as char).to_string());
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::testutil::{bare_boundary, ctx_at};

    fn synth_bik(revision: u8, payload: u32, frames: u32) -> Vec<u8> {
        let mut h = vec![0u8; 64];
        h[0..3].copy_from_slice(b"BIK");
        h[3] = revision;
        h[4..8].copy_from_slice(&payload.to_le_bytes());
        h[8..12].copy_from_slice(&frames.to_le_bytes());
        h
    }

    #[test]
    fn sizes_from_declared_length() {
        let data = synth_bik(b'i', 5000, 10);
        let boundary = bare_boundary();
        let ctx = ctx_at(&data, 0, &boundary, "bik");
        let r = BikFormat.parse(&data, 0, &ctx).expect("parse");
        assert_eq!(r.estimated_size, 5008);
        assert_eq!(r.metadata["frames"], 10);
    }

    #[test]
    fn rejects_unknown_revision_and_zero_frames() {
        let boundary = bare_boundary();
        let data = synth_bik(b'z', 5000, 10);
        let ctx = ctx_at(&data, 0, &boundary, "bik");
        assert!(BikFormat.parse(&data, 0, &ctx).is_none());

        let data = synth_bik(b'i', 5000, 0);
        let ctx = ctx_at(&data, 0, &boundary, "bik");
        assert!(BikFormat.parse(&data, 0, &ctx).is_none());
    }
}
