//! SCDA compiled script bytecode blocks.

use crate::formats::{Category, Format, ParseContext, ParseResult, Signature};
use crate::reader;

const SIGNATURES: [Signature; 1] = [Signature {
    id: "script_scda",
    magic: b"SCDA",
    description: "Compiled script data",
}];

/// Subrecord framing: tag + u16 length.
const FRAME_LEN: u32 = 6;

pub struct ScdaFormat;

impl Format for ScdaFormat {
    fn format_id(&self) -> &'static str {
        "scda"
    }

    fn display_name(&self) -> &'static str {
        "Compiled Script"
    }

    fn extension(&self) -> &'static str {
        ".scda"
    }

    fn category(&self) -> Category {
        Category::Script
    }

    fn output_folder(&self) -> &'static str {
        "scripts"
    }

    fn min_size(&self) -> u32 {
        10
    }

    fn max_size(&self) -> u32 {
        64 * 1024
    }

    fn signatures(&self) -> &'static [Signature] {
        &SIGNATURES
    }

    fn parse(&self, window: &[u8], at: usize, _ctx: &ParseContext<'_>) -> Option<ParseResult> {
        let h = window.get(at..)?;
        let data_len = reader::u16_le(h, 4)? as u32;
        if data_len < 4 {
            return None;
        }
        Some(ParseResult::new("SCDA", FRAME_LEN + data_len))
    }
}
