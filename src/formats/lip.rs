//! LIP lip-sync data.

use crate::formats::{Category, Format, ParseContext, ParseResult, Signature, keys};
use crate::reader;

const SIGNATURES: [Signature; 1] = [Signature {
    id: "lip",
    magic: b"LIPS",
    description: "Lip-sync data",
}];

const FALLBACK_SIZE: u32 = 16 * 1024;
const MAX_VERSION: u32 = 0x10000;

pub struct LipFormat;

impl Format for LipFormat {
    fn format_id(&self) -> &'static str {
        "lip"
    }

    fn display_name(&self) -> &'static str {
        "Lip Sync"
    }

    fn extension(&self) -> &'static str {
        ".lip"
    }

    fn category(&self) -> Category {
        Category::Audio
    }

    fn output_folder(&self) -> &'static str {
        "lip"
    }

    fn min_size(&self) -> u32 {
        16
    }

    fn max_size(&self) -> u32 {
        1024 * 1024
    }

    fn signatures(&self) -> &'static [Signature] {
        &SIGNATURES
    }

    fn parse(&self, window: &[u8], at: usize, ctx: &ParseContext<'_>) -> Option<ParseResult> {
        let h = window.get(at..)?;
        let version = reader::u32_le(h, 4)?;
        if version > MAX_VERSION {
            return None;
        }

        let estimated = ctx.boundary.find_boundary(
            ctx.dump,
            ctx.header_offset as usize,
            self.min_size(),
            self.max_size(),
            FALLBACK_SIZE,
            None,
            true,
        );

        let mut result = ParseResult::new("LIP", estimated);
        result.set(keys::VERSION, version);
        Some(result)
    }
}
