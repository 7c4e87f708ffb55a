//! TES4 plugin files (.esp / .esm).
//!
//! Only the leading TES4 record is parsed; the total plugin length is a
//! boundary-scan estimate since record streams carry no file-level size.

use crate::formats::{Category, Format, ParseContext, ParseResult, Signature, keys};
use crate::reader;

const SIGNATURES: [Signature; 1] = [Signature {
    id: "plugin_tes4",
    magic: b"TES4",
    description: "TES4 plugin",
}];

/// Record header: type, data size, flags, form id, version control info.
const RECORD_HEADER_LEN: u32 = 20;
const MASTER_FLAG: u32 = 0x1;
const MAX_HEADER_DATA: u32 = 0x10000;

pub struct PluginFormat;

impl Format for PluginFormat {
    fn format_id(&self) -> &'static str {
        "plugin"
    }

    fn display_name(&self) -> &'static str {
        "TES4 Plugin"
    }

    fn extension(&self) -> &'static str {
        ".esp"
    }

    fn category(&self) -> Category {
        Category::Plugin
    }

    fn output_folder(&self) -> &'static str {
        "plugins"
    }

    fn min_size(&self) -> u32 {
        RECORD_HEADER_LEN
    }

    fn max_size(&self) -> u32 {
        64 * 1024 * 1024
    }

    fn signatures(&self) -> &'static [Signature] {
        &SIGNATURES
    }

    fn parse(&self, window: &[u8], at: usize, ctx: &ParseContext<'_>) -> Option<ParseResult> {
        let h = window.get(at..)?;
        let data_size = reader::u32_le(h, 4)?;
        let flags = reader::u32_le(h, 8)?;
        if data_size == 0 || data_size > MAX_HEADER_DATA {
            return None;
        }

        // The TES4 record data starts with a HEDR subrecord on every real
        // plugin; random "TES4" bytes rarely carry one.
        if h.get(RECORD_HEADER_LEN as usize..RECORD_HEADER_LEN as usize + 4)
            != Some(b"HEDR".as_slice())
        {
            return None;
        }

        let header_record_len = RECORD_HEADER_LEN + data_size;
        let estimated = ctx.boundary.find_boundary(
            ctx.dump,
            ctx.header_offset as usize,
            header_record_len.min(self.max_size()),
            self.max_size(),
            header_record_len.saturating_add(1024 * 1024),
            Some(b"TES4"),
            true,
        );

        let is_master = flags & MASTER_FLAG != 0;
        let mut result = ParseResult::new(if is_master { "ESM" } else { "ESP" }, estimated);
        result.set("isMaster", is_master);
        if is_master {
            result.extension_override = Some(".esm");
        }
        if let Some(num_records) = reader::u32_le(h, RECORD_HEADER_LEN as usize + 10) {
            result.set("recordCount", num_records);
        }
        result.set(keys::VERSION, flags >> 24);
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::BoundaryScanner;
    use crate::formats::testutil::ctx_at;

    fn synth_tes4(flags: u32, data_size: u32) -> Vec<u8> {
        let mut h = Vec::new();
        h.extend_from_slice(b"TES4");
        h.extend_from_slice(&data_size.to_le_bytes());
        h.extend_from_slice(&flags.to_le_bytes());
        h.extend_from_slice(&[0u8; 8]);
        h.extend_from_slice(b"HEDR");
        h.extend_from_slice(&12u16.to_le_bytes());
        h.extend_from_slice(&[0u8; 4]); // version float
        h.extend_from_slice(&42u32.to_le_bytes()); // record count
        h.extend_from_slice(&[0u8; 4]);
        h.resize(4096, 0);
        h
    }

    #[test]
    fn master_flag_selects_esm() {
        let data = synth_tes4(MASTER_FLAG, 64);
        let boundary = BoundaryScanner::new(&[b"TES4"]);
        let ctx = ctx_at(&data, 0, &boundary, "plugin_tes4");
        let r = PluginFormat.parse(&data, 0, &ctx).expect("parse");
        assert_eq!(r.extension_override, Some(".esm"));
        assert_eq!(r.metadata["isMaster"], true);
        assert_eq!(r.metadata["recordCount"], 42);
    }

    #[test]
    fn plain_plugin_keeps_esp() {
        let data = synth_tes4(0, 64);
        let boundary = BoundaryScanner::new(&[b"TES4"]);
        let ctx = ctx_at(&data, 0, &boundary, "plugin_tes4");
        let r = PluginFormat.parse(&data, 0, &ctx).expect("parse");
        assert!(r.extension_override.is_none());
    }

    #[test]
    fn rejects_missing_hedr() {
        let mut data = synth_tes4(0, 64);
        data[20..24].copy_from_slice(b"XXXX");
        let boundary = BoundaryScanner::new(&[b"TES4"]);
        let ctx = ctx_at(&data, 0, &boundary, "plugin_tes4");
        assert!(PluginFormat.parse(&data, 0, &ctx).is_none());
    }
}
