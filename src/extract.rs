//! Per-match extraction: header window read, parse, size clamping, output
//! path composition, and the final payload copy.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::boundary::BoundaryScanner;
use crate::formats::{ParseContext, keys};
use crate::pool::BufferPool;
use crate::registry::FormatRegistry;

/// Bytes of context read before the signature (path literals, leading
/// comments).
pub const PRE_READ: usize = 512;

/// Header window sizes. DDX boundary estimation wants to see much further
/// ahead than ordinary header parsing does.
const HEADER_SCAN_DDX: usize = 512 * 1024;
const HEADER_SCAN_DEFAULT: usize = 64 * 1024;

/// A deduplicated scanner hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarveMatch {
    pub signature_id: &'static str,
    pub offset: u64,
}

/// Why a match produced no file. Rejections are counted, never surfaced as
/// errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    UnknownSignature,
    ParseFailed,
    SizeOutOfRange,
}

#[derive(Debug)]
pub struct Extracted {
    pub signature_id: &'static str,
    pub format_id: &'static str,
    pub offset: u64,
    pub data: Vec<u8>,
    pub output_file: PathBuf,
    pub original_path: Option<String>,
    pub is_partial: bool,
    pub metadata: Map<String, Value>,
}

pub struct CarveExtractor<'a> {
    dump: &'a [u8],
    registry: &'static FormatRegistry,
    boundary: &'a BoundaryScanner,
    pool: Arc<BufferPool>,
    output_root: PathBuf,
}

impl<'a> CarveExtractor<'a> {
    pub fn new(
        dump: &'a [u8],
        registry: &'static FormatRegistry,
        boundary: &'a BoundaryScanner,
        pool: Arc<BufferPool>,
        output_root: PathBuf,
    ) -> Self {
        Self {
            dump,
            registry,
            boundary,
            pool,
            output_root,
        }
    }

    pub fn extract(&self, m: &CarveMatch) -> Result<Extracted, Rejection> {
        let format = self
            .registry
            .by_signature_id(m.signature_id)
            .ok_or(Rejection::UnknownSignature)?;

        let offset = m.offset as usize;
        let pre_read = PRE_READ.min(offset);
        let header_scan = if m.signature_id.starts_with("ddx") {
            HEADER_SCAN_DDX
        } else {
            HEADER_SCAN_DEFAULT
        };
        let header_scan = header_scan
            .min(format.max_size() as usize)
            .min(self.dump.len() - offset);

        let mut window = self.pool.get(pre_read + header_scan);
        window.copy_from_slice(&self.dump[offset - pre_read..offset + header_scan]);

        let ctx = ParseContext {
            dump: self.dump,
            header_offset: m.offset,
            boundary: self.boundary,
            signature_id: m.signature_id,
        };
        let parsed = format
            .parse(&window, pre_read, &ctx)
            .ok_or(Rejection::ParseFailed)?;

        let leading = parsed.leading_comment_size().min(pre_read as u64);
        let adjusted_offset = m.offset - leading;
        let mut adjusted_size = parsed.estimated_size as u64 + leading;

        if adjusted_size < format.min_size() as u64 || adjusted_size > format.max_size() as u64 {
            return Err(Rejection::SizeOutOfRange);
        }

        let mut is_partial = false;
        let remaining = self.dump.len() as u64 - adjusted_offset;
        if adjusted_size > remaining {
            adjusted_size = remaining;
            is_partial = true;
        }

        let folder = parsed
            .output_folder_override
            .unwrap_or_else(|| format.output_folder());
        let extension = parsed.extension_override.unwrap_or_else(|| format.extension());
        let stem = parsed
            .safe_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{:08x}", m.offset));
        let output_file = self
            .output_root
            .join(folder)
            .join(format!("{stem}{extension}"));

        let original_path = parsed.original_path().map(str::to_string);

        let mut metadata = parsed.metadata;
        metadata.remove(keys::SAFE_NAME);
        metadata.remove(keys::LEADING_COMMENT_SIZE);
        metadata.remove(keys::TEXTURE_PATH);
        metadata.remove(keys::EMBEDDED_PATH);

        let start = adjusted_offset as usize;
        let data = self.dump[start..start + adjusted_size as usize].to_vec();

        Ok(Extracted {
            signature_id: m.signature_id,
            format_id: format.format_id(),
            offset: adjusted_offset,
            data,
            output_file,
            original_path,
            is_partial,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FormatRegistry;

    fn harness() -> (BoundaryScanner, Arc<BufferPool>, PathBuf) {
        let registry = FormatRegistry::global();
        let boundary = BoundaryScanner::new(&registry.boundary_magics());
        (boundary, BufferPool::new(), PathBuf::from("/out/dump"))
    }

    fn synth_dds_le(width: u32, height: u32) -> Vec<u8> {
        let mut h = vec![0u8; 128];
        h[0..4].copy_from_slice(b"DDS ");
        h[4..8].copy_from_slice(&124u32.to_le_bytes());
        h[12..16].copy_from_slice(&height.to_le_bytes());
        h[16..20].copy_from_slice(&width.to_le_bytes());
        h[84..88].copy_from_slice(b"DXT1");
        h
    }

    #[test]
    fn extracts_dds_at_offset() {
        let mut dump = vec![0u8; 2048];
        dump.extend_from_slice(&synth_dds_le(64, 64));
        dump.extend_from_slice(&vec![0x11u8; 2048]);
        dump.extend_from_slice(&[0u8; 512]);

        let (boundary, pool, root) = harness();
        let extractor =
            CarveExtractor::new(&dump, FormatRegistry::global(), &boundary, pool, root);
        let m = CarveMatch {
            signature_id: "dds",
            offset: 2048,
        };
        let out = extractor.extract(&m).expect("extract");
        assert_eq!(out.offset, 2048);
        assert_eq!(out.data.len(), 128 + 2048);
        assert_eq!(
            out.output_file,
            PathBuf::from("/out/dump/dds/00000800.dds")
        );
        assert!(!out.is_partial);
        assert!(out.metadata.contains_key(keys::WIDTH));
    }

    #[test]
    fn clamps_to_dump_end_and_flags_partial() {
        let mut dump = vec![0u8; 64];
        dump.extend_from_slice(&synth_dds_le(256, 256));
        dump.extend_from_slice(&[0u8; 100]); // far less than the payload

        let (boundary, pool, root) = harness();
        let extractor =
            CarveExtractor::new(&dump, FormatRegistry::global(), &boundary, pool, root);
        let m = CarveMatch {
            signature_id: "dds",
            offset: 64,
        };
        let out = extractor.extract(&m).expect("extract");
        assert!(out.is_partial);
        assert_eq!(out.data.len(), 128 + 100);
    }

    #[test]
    fn leading_comments_pull_the_start_back() {
        let mut dump = vec![0u8; 32];
        dump.extend_from_slice(b"; spawn gate\n");
        let header_at = dump.len() as u64;
        dump.extend_from_slice(b"scn GateScript\nend\n\0");
        dump.resize(dump.len() + 256, 0xCC);

        let (boundary, pool, root) = harness();
        let extractor =
            CarveExtractor::new(&dump, FormatRegistry::global(), &boundary, pool, root);
        let m = CarveMatch {
            signature_id: "script_scn",
            offset: header_at,
        };
        let out = extractor.extract(&m).expect("extract");
        assert_eq!(out.offset, header_at - b"; spawn gate\n".len() as u64);
        assert!(out.data.starts_with(b"; spawn gate\nscn GateScript"));
        assert_eq!(
            out.output_file,
            PathBuf::from("/out/dump/scripts/GateScript.txt")
        );
    }

    #[test]
    fn rejects_unknown_signature_and_bad_parse() {
        let dump = vec![0u8; 1024];
        let (boundary, pool, root) = harness();
        let extractor =
            CarveExtractor::new(&dump, FormatRegistry::global(), &boundary, pool, root);

        let m = CarveMatch {
            signature_id: "never_registered",
            offset: 0,
        };
        assert_eq!(
            extractor.extract(&m).unwrap_err(),
            Rejection::UnknownSignature
        );

        // zeros under a DDS signature id parse as nothing
        let m = CarveMatch {
            signature_id: "dds",
            offset: 0,
        };
        assert_eq!(extractor.extract(&m).unwrap_err(), Rejection::ParseFailed);
    }

    #[test]
    fn rejects_size_out_of_range() {
        // An XMA whose declared size is below the format minimum.
        let mut dump = Vec::new();
        dump.extend_from_slice(b"RIFF");
        dump.extend_from_slice(&12u32.to_le_bytes()); // file_size = 20 < min 44
        dump.extend_from_slice(b"WAVE");
        dump.extend_from_slice(b"fmt ");
        dump.extend_from_slice(&16u32.to_le_bytes());
        dump.extend_from_slice(&0x0165u16.to_le_bytes());
        dump.resize(1024, 0);

        let (boundary, pool, root) = harness();
        let extractor =
            CarveExtractor::new(&dump, FormatRegistry::global(), &boundary, pool, root);
        let m = CarveMatch {
            signature_id: "xma_riff",
            offset: 0,
        };
        assert_eq!(
            extractor.extract(&m).unwrap_err(),
            Rejection::SizeOutOfRange
        );
    }
}
