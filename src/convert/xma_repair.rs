//! In-process XMA header repair.
//!
//! Carved XMA streams often leave the dump with a RIFF size field describing
//! the file as it sat in memory, not the byte range actually recovered.
//! Players refuse such files outright, so the repairer rewrites the declared
//! size to match the carved payload.

use serde_json::{Map, Value};

use crate::convert::Repairer;
use crate::formats::keys;

pub struct XmaRepairer;

impl Repairer for XmaRepairer {
    fn needs_repair(&self, metadata: &Map<String, Value>) -> bool {
        metadata
            .get(keys::NEEDS_REPAIR)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    fn repair(&self, mut data: Vec<u8>, _metadata: &Map<String, Value>) -> Vec<u8> {
        if data.len() >= 8 && data.starts_with(b"RIFF") {
            let declared = (data.len() - 8) as u32;
            data[4..8].copy_from_slice(&declared.to_le_bytes());
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patches_riff_size_to_payload() {
        let mut data = Vec::new();
        data.extend_from_slice(b"RIFF");
        data.extend_from_slice(&9999u32.to_le_bytes());
        data.extend_from_slice(b"WAVE");
        data.extend_from_slice(&[0u8; 32]);

        let repaired = XmaRepairer.repair(data.clone(), &Map::new());
        let declared = u32::from_le_bytes([repaired[4], repaired[5], repaired[6], repaired[7]]);
        assert_eq!(declared as usize, repaired.len() - 8);
    }

    #[test]
    fn gate_reads_metadata_flag() {
        let mut meta = Map::new();
        assert!(!XmaRepairer.needs_repair(&meta));
        meta.insert(keys::NEEDS_REPAIR.to_string(), Value::from(true));
        assert!(XmaRepairer.needs_repair(&meta));
    }

    #[test]
    fn non_riff_bytes_pass_through() {
        let data = vec![1u8, 2, 3];
        assert_eq!(XmaRepairer.repair(data.clone(), &Map::new()), data);
    }
}
