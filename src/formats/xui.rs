//! XUI runtime UI resources: XUIS scenes and XUIB binaries.

use crate::formats::{Category, Format, ParseContext, ParseResult, Signature, keys};
use crate::reader;

const SIGNATURES: [Signature; 2] = [
    Signature {
        id: "xui_scene",
        magic: b"XUIS",
        description: "XUI scene",
    },
    Signature {
        id: "xui_binary",
        magic: b"XUIB",
        description: "XUI binary (XUR)",
    },
];

const MIN_DECLARED: u32 = 20;
const MAX_DECLARED: u32 = 10 * 1024 * 1024;
const FALLBACK_SIZE: u32 = 64 * 1024;

pub struct XuiFormat;

impl Format for XuiFormat {
    fn format_id(&self) -> &'static str {
        "xui"
    }

    fn display_name(&self) -> &'static str {
        "XUI Resource"
    }

    fn extension(&self) -> &'static str {
        ".xur"
    }

    fn category(&self) -> Category {
        Category::Xbox
    }

    fn output_folder(&self) -> &'static str {
        "xur"
    }

    fn min_size(&self) -> u32 {
        MIN_DECLARED
    }

    fn max_size(&self) -> u32 {
        MAX_DECLARED
    }

    fn signatures(&self) -> &'static [Signature] {
        &SIGNATURES
    }

    fn parse(&self, window: &[u8], at: usize, ctx: &ParseContext<'_>) -> Option<ParseResult> {
        let h = window.get(at..)?;
        let version = reader::u32_be(h, 4)?;
        if version != 5 && version != 8 {
            return None;
        }

        let declared = reader::u32_be(h, 14)?;
        let estimated = if (MIN_DECLARED..=MAX_DECLARED).contains(&declared) {
            declared
        } else {
            let magic: &[u8] = if ctx.signature_id == "xui_scene" {
                b"XUIS"
            } else {
                b"XUIB"
            };
            ctx.boundary.find_boundary(
                ctx.dump,
                ctx.header_offset as usize,
                self.min_size(),
                self.max_size(),
                FALLBACK_SIZE,
                Some(magic),
                true,
            )
        };

        let mut result = ParseResult::new(
            if ctx.signature_id == "xui_scene" {
                "XUIS"
            } else {
                "XUIB"
            },
            estimated,
        );
        result.set(keys::VERSION, version);
        Some(result)
    }

    fn as_converter(&self) -> Option<&dyn crate::convert::Converter> {
        use once_cell::sync::Lazy;
        static CONVERTER: Lazy<crate::convert::xur_xui::XuiConverter> =
            Lazy::new(crate::convert::xur_xui::XuiConverter::from_env);
        Some(&*CONVERTER)
    }
}
