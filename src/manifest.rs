//! Run manifest: one entry per saved file, serialized as an indented JSON
//! array at the end of the run.

use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManifestEntry {
    pub file_type: String,
    pub offset: u64,
    pub size_in_dump: u32,
    pub size_output: u32,
    pub filename: String,
    pub original_path: Option<String>,
    pub is_compressed: bool,
    pub content_type: Option<String>,
    pub is_partial: bool,
    pub notes: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

/// Append-only, multi-producer collection of manifest entries. Append order
/// across extraction workers is unspecified; serialization happens once, from
/// the orchestrator thread.
#[derive(Default)]
pub struct Manifest {
    entries: Mutex<Vec<ManifestEntry>>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, entry: ManifestEntry) {
        self.entries.lock().expect("manifest poisoned").push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("manifest poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize all entries as a two-space-indented UTF-8 JSON array.
    pub fn write_json(&self, path: &Path) -> Result<(), ManifestError> {
        let entries = self.entries.lock().expect("manifest poisoned");
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"  ");
        let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
        entries.serialize(&mut ser)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<ManifestEntry> {
        self.entries.lock().expect("manifest poisoned").clone()
    }
}
