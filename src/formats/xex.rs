//! XEX2 executables.

use crate::formats::{Category, Format, ParseContext, ParseResult, Signature, keys};
use crate::reader;

const SIGNATURES: [Signature; 1] = [Signature {
    id: "xex",
    magic: b"XEX2",
    description: "Xbox 360 executable",
}];

const FALLBACK_SIZE: u32 = 4 * 1024 * 1024;
const MIN_IMAGE: u32 = 4 * 1024;
const MAX_IMAGE: u32 = 128 * 1024 * 1024;

pub struct XexFormat;

impl Format for XexFormat {
    fn format_id(&self) -> &'static str {
        "xex"
    }

    fn display_name(&self) -> &'static str {
        "XEX Module"
    }

    fn extension(&self) -> &'static str {
        ".xex"
    }

    fn category(&self) -> Category {
        Category::Module
    }

    fn output_folder(&self) -> &'static str {
        "xex"
    }

    fn min_size(&self) -> u32 {
        24
    }

    fn max_size(&self) -> u32 {
        MAX_IMAGE
    }

    fn signatures(&self) -> &'static [Signature] {
        &SIGNATURES
    }

    fn parse(&self, window: &[u8], at: usize, ctx: &ParseContext<'_>) -> Option<ParseResult> {
        let h = window.get(at..)?;
        let module_flags = reader::u32_be(h, 4)?;
        let pe_data_offset = reader::u32_be(h, 8)?;
        let security_offset = reader::u32_be(h, 16)?;
        let header_count = reader::u32_be(h, 20)?;

        if pe_data_offset < 24 || pe_data_offset > 0x10000 {
            return None;
        }
        if header_count > 1024 {
            return None;
        }

        // The security info block declares the mapped image size; when it is
        // inside the header window that beats any scan.
        let estimated = match reader::u32_be(h, security_offset as usize + 4) {
            Some(image_size) if (MIN_IMAGE..=MAX_IMAGE).contains(&image_size) => {
                pe_data_offset.saturating_add(image_size).min(MAX_IMAGE)
            }
            _ => ctx.boundary.find_boundary(
                ctx.dump,
                ctx.header_offset as usize,
                self.min_size(),
                self.max_size(),
                FALLBACK_SIZE,
                Some(b"XEX2"),
                true,
            ),
        };

        let mut result = ParseResult::new("XEX2", estimated);
        result.set("moduleFlags", module_flags);
        result.set("headerCount", header_count);
        result.set(keys::IS_XBOX_360, true);
        Some(result)
    }
}
