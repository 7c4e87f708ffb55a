//! XDBF dashboard databases (gamer profiles, title caches).
//!
//! The header declares its entry and free-space tables outright; walking the
//! entry table gives the extent of the data region, which is as close to a
//! declared file size as this format gets.

use crate::formats::{Category, Format, ParseContext, ParseResult, Signature, keys};
use crate::reader;

const SIGNATURES: [Signature; 1] = [Signature {
    id: "xdbf",
    magic: b"XDBF",
    description: "Xbox dashboard database",
}];

const ENTRY_LEN: usize = 18;
const FREE_LEN: usize = 8;
const MAX_TABLE_ENTRIES: u32 = 0x10000;

pub struct XdbfFormat;

impl Format for XdbfFormat {
    fn format_id(&self) -> &'static str {
        "xdbf"
    }

    fn display_name(&self) -> &'static str {
        "XDBF Database"
    }

    fn extension(&self) -> &'static str {
        ".xdbf"
    }

    fn category(&self) -> Category {
        Category::Xbox
    }

    fn output_folder(&self) -> &'static str {
        "xdbf"
    }

    fn min_size(&self) -> u32 {
        24
    }

    fn max_size(&self) -> u32 {
        16 * 1024 * 1024
    }

    fn signatures(&self) -> &'static [Signature] {
        &SIGNATURES
    }

    fn parse(&self, window: &[u8], at: usize, ctx: &ParseContext<'_>) -> Option<ParseResult> {
        let h = window.get(at..)?;
        let version = reader::u32_be(h, 4)?;
        let entry_max = reader::u32_be(h, 8)?;
        let entry_cur = reader::u32_be(h, 12)?;
        let free_max = reader::u32_be(h, 16)?;

        if entry_max == 0 || entry_max > MAX_TABLE_ENTRIES || entry_cur > entry_max {
            return None;
        }
        if free_max == 0 || free_max > MAX_TABLE_ENTRIES {
            return None;
        }

        let tables_len = 24u64 + entry_max as u64 * ENTRY_LEN as u64 + free_max as u64 * FREE_LEN as u64;

        // Walk the live entries for the furthest data extent; fall back to a
        // boundary scan when the table does not fit the header window.
        let mut data_end = 0u64;
        let mut walked = true;
        for i in 0..entry_cur as usize {
            let entry_off = 24 + i * ENTRY_LEN;
            match (
                reader::u32_be(h, entry_off + 10),
                reader::u32_be(h, entry_off + 14),
            ) {
                (Some(offset), Some(length)) => {
                    data_end = data_end.max(offset as u64 + length as u64);
                }
                _ => {
                    walked = false;
                    break;
                }
            }
        }

        let estimated = if walked {
            (tables_len + data_end).min(self.max_size() as u64) as u32
        } else {
            ctx.boundary.find_boundary(
                ctx.dump,
                ctx.header_offset as usize,
                self.min_size(),
                self.max_size(),
                tables_len.min(self.max_size() as u64) as u32,
                Some(b"XDBF"),
                true,
            )
        };

        let mut result = ParseResult::new("XDBF", estimated);
        result.set(keys::VERSION, version);
        result.set("entryCount", entry_cur);
        Some(result)
    }
}
