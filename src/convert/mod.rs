//! Conversion and repair capabilities.
//!
//! Converters wrap external tools discovered through environment variables
//! and are treated as opaque actors: bytes in, bytes out. A format that owns
//! a converter exposes it through `Format::as_converter`; the writer decides
//! whether to invoke it. Repairers are in-process byte patchers gated on
//! parser metadata.

pub mod ddx_dds;
pub mod xma_repair;
pub mod xur_xui;

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("converter unavailable: {0}")]
    Unavailable(String),
    #[error("conversion failed: {0}")]
    Failed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a successful conversion.
#[derive(Debug)]
pub struct Converted {
    pub data: Vec<u8>,
    /// Optional flattened-mip sidecar emitted by the tool.
    pub atlas: Option<Vec<u8>>,
    pub is_partial: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Default)]
pub struct ConversionStats {
    converted: AtomicU64,
    failed: AtomicU64,
}

impl ConversionStats {
    pub fn record_converted(&self) {
        self.converted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn converted_count(&self) -> u64 {
        self.converted.load(Ordering::Relaxed)
    }

    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

pub trait Converter: Send + Sync {
    fn name(&self) -> &'static str;
    /// Folder that replaces the format's `output_folder` for converted files.
    fn target_folder(&self) -> &'static str;
    /// Extension (dot included) that replaces the format's extension.
    fn target_extension(&self) -> &'static str;
    /// Whether this converter claims the given match. Returning `false` is a
    /// silent skip; a claimed match whose `convert` fails falls back to the
    /// raw bytes and is counted as a failure.
    fn can_convert(&self, signature_id: &str, metadata: &Map<String, Value>) -> bool;
    fn convert(&self, data: &[u8], metadata: &Map<String, Value>)
    -> Result<Converted, ConvertError>;
    fn stats(&self) -> &ConversionStats;
}

pub trait Repairer: Send + Sync {
    fn needs_repair(&self, metadata: &Map<String, Value>) -> bool;
    fn repair(&self, data: Vec<u8>, metadata: &Map<String, Value>) -> Vec<u8>;
}

fn temp_suffix() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    format!("{nanos:08x}")
}

/// Temp files removed best-effort on every exit path, including panics in
/// the calling worker.
struct TempFiles {
    paths: Vec<PathBuf>,
}

impl TempFiles {
    fn new() -> Self {
        Self { paths: Vec::new() }
    }

    fn create(&mut self, label: &str, ext: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("xbcarve_{}_{}{ext}", temp_suffix(), label));
        self.paths.push(path.clone());
        path
    }

    fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Run an external conversion tool: write `input` to a temp file, invoke
/// `exe temp_in temp_out`, read `temp_out` back. The optional atlas sidecar
/// (`<temp_out_stem>_full_atlas.dds`) is read when the tool produced one.
fn run_tool(
    exe: &Path,
    input: &[u8],
    in_ext: &str,
    out_ext: &str,
) -> Result<(Vec<u8>, Option<Vec<u8>>), ConvertError> {
    let mut temps = TempFiles::new();
    let in_path = temps.create("in", in_ext);
    let out_path = temps.create("out", out_ext);

    std::fs::write(&in_path, input)?;

    let status = Command::new(exe)
        .arg(&in_path)
        .arg(&out_path)
        .status()
        .map_err(|e| ConvertError::Unavailable(format!("{}: {e}", exe.display())))?;
    if !status.success() {
        return Err(ConvertError::Failed(format!(
            "{} exited with {status}",
            exe.display()
        )));
    }

    let data = std::fs::read(&out_path)
        .map_err(|e| ConvertError::Failed(format!("no tool output: {e}")))?;

    let atlas_path = atlas_sidecar_path(&out_path);
    let atlas = match std::fs::read(&atlas_path) {
        Ok(bytes) => {
            temps.track(atlas_path);
            Some(bytes)
        }
        Err(_) => None,
    };

    Ok((data, atlas))
}

fn atlas_sidecar_path(out_path: &Path) -> PathBuf {
    let stem = out_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    out_path.with_file_name(format!("{stem}_full_atlas.dds"))
}

fn tool_from_env(var: &str) -> Option<PathBuf> {
    std::env::var_os(var).map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_count_independently() {
        let stats = ConversionStats::default();
        stats.record_converted();
        stats.record_converted();
        stats.record_failed();
        assert_eq!(stats.converted_count(), 2);
        assert_eq!(stats.failed_count(), 1);
    }

    #[test]
    fn atlas_sidecar_next_to_output() {
        let p = atlas_sidecar_path(Path::new("/tmp/xbcarve_ab_out.dds"));
        assert_eq!(
            p,
            Path::new("/tmp/xbcarve_ab_out_full_atlas.dds").to_path_buf()
        );
    }

    #[test]
    fn missing_tool_reports_unavailable() {
        let err = run_tool(
            Path::new("/nonexistent/xbcarve-tool"),
            b"data",
            ".ddx",
            ".dds",
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::Unavailable(_)));
    }
}
