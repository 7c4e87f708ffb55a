//! Persisting extracted files.
//!
//! The writer owns everything after a successful extraction: optional
//! conversion or repair, collision-free naming, the physical write with
//! retry, and the manifest entry. Conversion failures are never fatal; the
//! raw bytes are written instead and the failure is recorded.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, warn};

use crate::convert::ConvertError;
use crate::extract::Extracted;
use crate::manifest::{Manifest, ManifestEntry};
use crate::registry::FormatRegistry;

const WRITE_RETRIES: usize = 3;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run-scoped writer options.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub enable_conversion: bool,
    pub save_atlas: bool,
}

pub struct CarveWriter {
    registry: &'static FormatRegistry,
    options: WriterOptions,
    // paths claimed this run, so concurrent workers cannot race two files
    // into the same name
    claimed: Mutex<HashSet<PathBuf>>,
    failed_conversions: Mutex<Vec<u64>>,
}

impl CarveWriter {
    pub fn new(registry: &'static FormatRegistry, options: WriterOptions) -> Self {
        Self {
            registry,
            options,
            claimed: Mutex::new(HashSet::new()),
            failed_conversions: Mutex::new(Vec::new()),
        }
    }

    /// Offsets whose conversion failed and fell back to a raw write.
    pub fn failed_conversion_offsets(&self) -> Vec<u64> {
        self.failed_conversions
            .lock()
            .expect("writer state poisoned")
            .clone()
    }

    /// Persist one extraction and append its manifest entry.
    pub fn write(&self, extracted: Extracted, manifest: &Manifest) -> Result<(), WriteError> {
        let format = self.registry.by_signature_id(extracted.signature_id);
        let size_in_dump = extracted.data.len() as u32;

        let mut data = extracted.data;
        let mut target = extracted.output_file.clone();
        let mut is_compressed = false;
        let mut content_type = None;
        let mut is_partial = extracted.is_partial;
        let mut notes = None;
        let mut atlas = None;

        if self.options.enable_conversion {
            if let Some(converter) = format.and_then(|f| f.as_converter()) {
                if converter.can_convert(extracted.signature_id, &extracted.metadata) {
                    match converter.convert(&data, &extracted.metadata) {
                        Ok(converted) => {
                            converter.stats().record_converted();
                            data = converted.data;
                            atlas = converted.atlas;
                            target = redirect_target(
                                &extracted.output_file,
                                converter.target_folder(),
                                converter.target_extension(),
                            );
                            is_compressed = true;
                            is_partial = is_partial || converted.is_partial;
                            content_type = Some(if converted.is_partial {
                                "converted_partial".to_string()
                            } else {
                                "converted".to_string()
                            });
                            notes = converted.notes;
                        }
                        Err(err) => {
                            converter.stats().record_failed();
                            self.failed_conversions
                                .lock()
                                .expect("writer state poisoned")
                                .push(extracted.offset);
                            match err {
                                ConvertError::Unavailable(msg) => {
                                    debug!("converter unavailable at {:#x}: {msg}", extracted.offset)
                                }
                                other => warn!(
                                    "conversion failed at {:#x}: {other}",
                                    extracted.offset
                                ),
                            }
                        }
                    }
                }
            }
        }

        if let Some(repairer) = format.and_then(|f| f.as_repairer()) {
            if repairer.needs_repair(&extracted.metadata) {
                data = repairer.repair(data, &extracted.metadata);
                notes = Some("Repaired".to_string());
            }
        }

        let final_path = self.claim_unique(&target);
        let written = write_with_retry(&final_path, &data)?;

        if self.options.save_atlas {
            if let Some(atlas_bytes) = atlas {
                let atlas_path = atlas_path_for(&final_path);
                if let Err(err) = write_with_retry(&atlas_path, &atlas_bytes) {
                    warn!("atlas write failed for {}: {err}", atlas_path.display());
                }
            }
        }

        let filename = written
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        manifest.append(ManifestEntry {
            file_type: extracted.signature_id.to_string(),
            offset: extracted.offset,
            size_in_dump,
            size_output: data.len() as u32,
            filename,
            original_path: extracted.original_path,
            is_compressed,
            content_type,
            is_partial,
            notes,
            metadata: if extracted.metadata.is_empty() {
                None
            } else {
                Some(extracted.metadata)
            },
        });

        Ok(())
    }

    /// Reserve a final path, appending `_1`, `_2`, ... while the name is
    /// already claimed in this run or present on disk.
    fn claim_unique(&self, target: &Path) -> PathBuf {
        let mut claimed = self.claimed.lock().expect("writer state poisoned");
        if !claimed.contains(target) && !target.exists() {
            claimed.insert(target.to_path_buf());
            return target.to_path_buf();
        }

        let stem = target
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = target
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        for n in 1.. {
            let candidate = target.with_file_name(format!("{stem}_{n}{ext}"));
            if !claimed.contains(&candidate) && !candidate.exists() {
                claimed.insert(candidate.clone());
                return candidate;
            }
        }
        unreachable!("suffix search is unbounded")
    }
}

fn redirect_target(original: &Path, folder: &str, extension: &str) -> PathBuf {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent_of_folder = original
        .parent()
        .and_then(|p| p.parent())
        .unwrap_or_else(|| Path::new(""));
    parent_of_folder
        .join(folder)
        .join(format!("{stem}{extension}"))
}

fn atlas_path_for(final_path: &Path) -> PathBuf {
    let stem = final_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    final_path.with_file_name(format!("{stem}_full_atlas.dds"))
}

fn rand_suffix() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    format!("{nanos:08x}")
}

/// Write bytes, retrying under a randomized name when another process races
/// us for the same path.
fn write_with_retry(path: &Path, data: &[u8]) -> Result<PathBuf, WriteError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut target = path.to_path_buf();
    let mut last_err = None;
    for attempt in 0..WRITE_RETRIES {
        match std::fs::write(&target, data) {
            Ok(()) => return Ok(target),
            Err(err) => {
                debug!(
                    "write attempt {} failed for {}: {err}",
                    attempt + 1,
                    target.display()
                );
                last_err = Some(err);
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let ext = path
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_default();
                target = path.with_file_name(format!("{stem}_{}{ext}", rand_suffix()));
            }
        }
    }
    Err(WriteError::Io(last_err.expect("retries imply an error")))
}
