//! FaceGen morph and geometry data (EGM / EGT / TRI).

use crate::formats::{Category, Format, ParseContext, ParseResult, Signature, keys};
use crate::reader;

const SIGNATURES: [Signature; 3] = [
    Signature {
        id: "facegen_egm",
        magic: b"FREGM",
        description: "FaceGen morph geometry",
    },
    Signature {
        id: "facegen_egt",
        magic: b"FREGT",
        description: "FaceGen texture morph",
    },
    Signature {
        id: "facegen_tri",
        magic: b"FRTRI",
        description: "FaceGen triangle mesh",
    },
];

const FALLBACK_SIZE: u32 = 256 * 1024;
const MAX_VERTS: u32 = 1_000_000;

pub struct FacegenFormat;

fn extension_for(signature_id: &str) -> &'static str {
    match signature_id {
        "facegen_egm" => ".egm",
        "facegen_egt" => ".egt",
        _ => ".tri",
    }
}

impl Format for FacegenFormat {
    fn format_id(&self) -> &'static str {
        "facegen"
    }

    fn display_name(&self) -> &'static str {
        "FaceGen Data"
    }

    fn extension(&self) -> &'static str {
        ".egm"
    }

    fn category(&self) -> Category {
        Category::Model
    }

    fn output_folder(&self) -> &'static str {
        "facegen"
    }

    fn min_size(&self) -> u32 {
        64
    }

    fn max_size(&self) -> u32 {
        8 * 1024 * 1024
    }

    fn signatures(&self) -> &'static [Signature] {
        &SIGNATURES
    }

    fn parse(&self, window: &[u8], at: usize, ctx: &ParseContext<'_>) -> Option<ParseResult> {
        let h = window.get(at..)?;
        // magic is followed by a three-digit ASCII version, e.g. "FRTRI003"
        let version = h.get(5..8)?;
        if !version.iter().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let estimated = if ctx.signature_id == "facegen_tri" {
            let verts = reader::u32_le(h, 8)?;
            let tris = reader::u32_le(h, 12)?;
            if verts == 0 || verts > MAX_VERTS || tris > MAX_VERTS {
                return None;
            }
            let geometry = 64u64 + verts as u64 * 12 + tris as u64 * 12;
            geometry.min(self.max_size() as u64) as u32
        } else {
            ctx.boundary.find_boundary(
                ctx.dump,
                ctx.header_offset as usize,
                self.min_size(),
                self.max_size(),
                FALLBACK_SIZE,
                None,
                true,
            )
        };

        let mut result = ParseResult::new("FaceGen", estimated);
        result.set(keys::VERSION, String::from_utf8_lossy(version).into_owned());
        result.extension_override = Some(extension_for(ctx.signature_id));
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::testutil::{bare_boundary, ctx_at};

    #[test]
    fn tri_sizes_from_counts() {
        let mut data = b"FRTRI003".to_vec();
        data.extend_from_slice(&100u32.to_le_bytes());
        data.extend_from_slice(&50u32.to_le_bytes());
        data.resize(4096, 0);
        let boundary = bare_boundary();
        let ctx = ctx_at(&data, 0, &boundary, "facegen_tri");
        let r = FacegenFormat.parse(&data, 0, &ctx).expect("parse");
        assert_eq!(r.estimated_size as u64, 64 + 100 * 12 + 50 * 12);
        assert_eq!(r.extension_override, Some(".tri"));
    }

    #[test]
    fn egm_defers_to_boundary_fallback() {
        let mut data = b"FREGM002".to_vec();
        data.resize(1024, 0);
        let boundary = bare_boundary();
        let ctx = ctx_at(&data, 0, &boundary, "facegen_egm");
        let r = FacegenFormat.parse(&data, 0, &ctx).expect("parse");
        assert_eq!(r.estimated_size, 1024, "fallback capped at dump");
        assert_eq!(r.extension_override, Some(".egm"));
    }

    #[test]
    fn rejects_non_digit_version() {
        let mut data = b"FREGMxyz".to_vec();
        data.resize(128, 0);
        let boundary = bare_boundary();
        let ctx = ctx_at(&data, 0, &boundary, "facegen_egm");
        assert!(FacegenFormat.parse(&data, 0, &ctx).is_none());
    }
}
