//! Run orchestration.
//!
//! A run is a strict two-phase pipeline over one memory-mapped dump: a
//! sequential scan pass collects, quota-filters, and deduplicates every
//! signature hit, then a pool of worker threads extracts the sorted match
//! list in parallel. The phases are separate so the per-type quota applies
//! against the complete match set rather than scan order luck.

pub mod quota;
pub mod workers;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::bounded;
use memmap2::Mmap;
use tracing::{info, warn};

use crate::boundary::BoundaryScanner;
use crate::extract::CarveMatch;
use crate::manifest::Manifest;
use crate::pool::BufferPool;
use crate::registry::FormatRegistry;
use crate::writer::{CarveWriter, WriterOptions};

use quota::{ClaimedOffsets, QuotaTracker};
use workers::{ExtractCounters, ExtractShared};

/// Default scan window: 64 MiB plus the matcher overlap.
pub const DEFAULT_WINDOW_SIZE: u64 = 64 * 1024 * 1024;

/// Run-scoped settings, one per invocation.
#[derive(Debug, Clone)]
pub struct CarveOptions {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub max_files_per_type: Option<u64>,
    pub enable_conversion: bool,
    pub save_atlas: bool,
    /// Signature ids to carve; `None` carves everything.
    pub requested_filter: Option<HashSet<&'static str>>,
    pub workers: usize,
    pub window_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    Scanning,
    Extracting,
}

/// Progress snapshot reported during a run.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub stage: ProgressStage,
    pub bytes_scanned: u64,
    pub total_bytes: u64,
    pub matches_found: u64,
    pub files_written: u64,
    pub elapsed_seconds: f64,
    pub throughput_mib: f64,
    /// 0.0 - 100.0 across both phases; scanning maps to 0-50, extraction
    /// to 50-100.
    pub completion_pct: f64,
}

pub trait ProgressReporter: Send + Sync {
    fn on_progress(&self, snapshot: &ProgressSnapshot);
}

/// Final statistics for a run.
#[derive(Debug, Clone, Default)]
pub struct CarveStats {
    pub bytes_scanned: u64,
    pub windows_scanned: u64,
    pub matches_found: u64,
    pub files_written: u64,
    pub parse_rejects: u64,
    pub size_rejects: u64,
    pub quota_skips: u64,
    pub write_failures: u64,
    pub conversion_failures: u64,
    pub cancelled: bool,
}

pub struct MemoryCarver {
    registry: &'static FormatRegistry,
    options: CarveOptions,
}

impl MemoryCarver {
    pub fn new(options: CarveOptions) -> Self {
        Self {
            registry: FormatRegistry::global(),
            options,
        }
    }

    /// Execute a full run: map, scan, extract, serialize the manifest.
    ///
    /// Cancellation is cooperative: the scan stops between windows, the
    /// extraction stops enqueuing, in-flight extractions finish, and the
    /// partial manifest is still flushed.
    pub fn run(
        &self,
        cancel: Option<Arc<AtomicBool>>,
        progress: Option<Arc<dyn ProgressReporter>>,
    ) -> Result<CarveStats> {
        let started = Instant::now();
        let dump_stem = self
            .options
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dump".to_string());
        let run_dir = self.options.output_dir.join(&dump_stem);
        std::fs::create_dir_all(&run_dir)
            .with_context(|| format!("creating output directory {}", run_dir.display()))?;

        let file = std::fs::File::open(&self.options.input)
            .with_context(|| format!("opening dump {}", self.options.input.display()))?;
        let dump_len = file
            .metadata()
            .with_context(|| format!("reading metadata of {}", self.options.input.display()))?
            .len();

        let manifest = Manifest::new();
        if dump_len == 0 {
            info!("dump is empty; writing empty manifest");
            manifest
                .write_json(&run_dir.join("manifest.json"))
                .context("writing manifest")?;
            return Ok(CarveStats::default());
        }

        // Mapping. The map is the only shared resource; workers see it as a
        // read-only slice.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("mapping dump {}", self.options.input.display()))?;
        let dump: &[u8] = &mmap;
        info!("mapped {} ({} bytes)", self.options.input.display(), dump_len);

        let matcher = self.registry.build_matcher();
        let boundary = BoundaryScanner::new(&self.registry.boundary_magics());
        let quota = QuotaTracker::new(self.options.max_files_per_type);

        // Phase 1: sequential scan.
        let (matches, scan_stats) = self.scan_phase(
            dump,
            &matcher,
            &quota,
            cancel.as_deref(),
            progress.as_deref(),
            started,
        );
        info!(
            "scan complete: {} windows, {} matches",
            scan_stats.windows, scan_stats.matches_total
        );

        // Phase 2: parallel extraction.
        let writer = CarveWriter::new(
            self.registry,
            WriterOptions {
                enable_conversion: self.options.enable_conversion,
                save_atlas: self.options.save_atlas,
            },
        );
        let counters = ExtractCounters::default();
        let claimed = ClaimedOffsets::new();
        let cancelled_in_extract = self.extract_phase(
            dump,
            &boundary,
            matches,
            &writer,
            &manifest,
            &quota,
            &claimed,
            &counters,
            run_dir.clone(),
            dump_len,
            started,
            cancel.as_deref(),
            progress.clone(),
        );

        // Finalizing: the manifest is flushed even after cancellation.
        let manifest_path = run_dir.join("manifest.json");
        manifest
            .write_json(&manifest_path)
            .with_context(|| format!("writing manifest {}", manifest_path.display()))?;

        if let Some(reporter) = &progress {
            reporter.on_progress(&ProgressSnapshot {
                stage: ProgressStage::Extracting,
                bytes_scanned: scan_stats.bytes,
                total_bytes: dump_len,
                matches_found: scan_stats.matches_total,
                files_written: counters.files_written.load(Ordering::Relaxed),
                elapsed_seconds: started.elapsed().as_secs_f64(),
                throughput_mib: throughput_mib(scan_stats.bytes, started.elapsed()),
                completion_pct: 100.0,
            });
        }

        let stats = CarveStats {
            bytes_scanned: scan_stats.bytes,
            windows_scanned: scan_stats.windows,
            matches_found: scan_stats.matches_total,
            files_written: counters.files_written.load(Ordering::Relaxed),
            parse_rejects: counters.parse_rejects.load(Ordering::Relaxed),
            size_rejects: counters.size_rejects.load(Ordering::Relaxed),
            quota_skips: counters.quota_skips.load(Ordering::Relaxed),
            write_failures: counters.write_failures.load(Ordering::Relaxed),
            conversion_failures: writer.failed_conversion_offsets().len() as u64,
            cancelled: scan_stats.cancelled || cancelled_in_extract,
        };

        info!(
            "run_summary bytes_scanned={} windows={} matches={} files_written={} parse_rejects={} size_rejects={} write_failures={} conversion_failures={}",
            stats.bytes_scanned,
            stats.windows_scanned,
            stats.matches_found,
            stats.files_written,
            stats.parse_rejects,
            stats.size_rejects,
            stats.write_failures,
            stats.conversion_failures
        );

        Ok(stats)
    }

    fn scan_phase(
        &self,
        dump: &[u8],
        matcher: &crate::matcher::SignatureMatcher,
        quota: &QuotaTracker,
        cancel: Option<&AtomicBool>,
        progress: Option<&dyn ProgressReporter>,
        started: Instant,
    ) -> (Vec<CarveMatch>, ScanPhaseStats) {
        let total_bytes = dump.len() as u64;
        // Successive windows re-read the longest magic's worth of bytes so a
        // signature straddling a seam is seen whole by at least one window;
        // the seen-hits set collapses the double sighting.
        let stride = (self.options.window_size as usize).max(1);
        let overlap = matcher.max_pattern_len();

        let mut seen_hits: HashSet<(&'static str, u64)> = HashSet::new();
        let mut seen_offsets: HashSet<u64> = HashSet::new();
        let mut matches = Vec::new();
        let mut stats = ScanPhaseStats::default();

        for base in (0..dump.len()).step_by(stride) {
            if let Some(flag) = cancel {
                if flag.load(Ordering::Relaxed) {
                    stats.cancelled = true;
                    break;
                }
            }

            let reach = dump.len().min(base + stride + overlap);
            let hits = matcher.search(&dump[base..reach], base as u64);

            for hit in hits {
                // window-overlap duplicates collapse here
                if !seen_hits.insert((hit.signature_id, hit.offset)) {
                    continue;
                }
                if let Some(filter) = &self.options.requested_filter {
                    if !filter.contains(hit.signature_id) {
                        continue;
                    }
                }
                if !quota.admit_match(hit.signature_id) {
                    continue;
                }
                if !seen_offsets.insert(hit.offset) {
                    continue;
                }
                matches.push(CarveMatch {
                    signature_id: hit.signature_id,
                    offset: hit.offset,
                });
            }

            stats.windows += 1;
            stats.bytes = reach as u64;

            if let Some(reporter) = progress {
                let elapsed = started.elapsed();
                reporter.on_progress(&ProgressSnapshot {
                    stage: ProgressStage::Scanning,
                    bytes_scanned: stats.bytes,
                    total_bytes,
                    matches_found: matches.len() as u64,
                    files_written: 0,
                    elapsed_seconds: elapsed.as_secs_f64(),
                    throughput_mib: throughput_mib(stats.bytes, elapsed),
                    completion_pct: 50.0 * stats.bytes as f64 / total_bytes as f64,
                });
            }
        }

        matches.sort_by_key(|m| m.offset);
        stats.matches_total = matches.len() as u64;
        (matches, stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn extract_phase(
        &self,
        dump: &[u8],
        boundary: &BoundaryScanner,
        matches: Vec<CarveMatch>,
        writer: &CarveWriter,
        manifest: &Manifest,
        quota: &QuotaTracker,
        claimed: &ClaimedOffsets,
        counters: &ExtractCounters,
        output_root: PathBuf,
        total_bytes: u64,
        started: Instant,
        cancel: Option<&AtomicBool>,
        progress: Option<Arc<dyn ProgressReporter>>,
    ) -> bool {
        if matches.is_empty() {
            return false;
        }

        let shared = ExtractShared {
            dump,
            registry: self.registry,
            boundary,
            pool: BufferPool::new(),
            writer,
            manifest,
            quota,
            claimed,
            counters,
            output_root,
            total_matches: matches.len() as u64,
            total_bytes,
            started,
        };

        let channel_cap = (self.options.workers * 4).max(16);
        let mut cancelled = false;

        std::thread::scope(|scope| {
            let (tx, rx) = bounded::<CarveMatch>(channel_cap);
            let handles = workers::spawn_extract_workers(
                scope,
                self.options.workers,
                &shared,
                rx,
                progress.clone(),
            );

            for m in matches {
                if let Some(flag) = cancel {
                    if flag.load(Ordering::Relaxed) {
                        cancelled = true;
                        break;
                    }
                }
                if tx.send(m).is_err() {
                    warn!("extraction channel closed early");
                    break;
                }
            }
            drop(tx);

            for handle in handles {
                let _ = handle.join();
            }
        });

        cancelled
    }
}

#[derive(Default)]
struct ScanPhaseStats {
    bytes: u64,
    windows: u64,
    matches_total: u64,
    cancelled: bool,
}

fn throughput_mib(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        bytes as f64 / (1024.0 * 1024.0) / secs
    } else {
        0.0
    }
}

/// Snapshot for phase-2 progress callbacks, mapped onto the 50-100% range.
pub(crate) fn extract_snapshot(shared: &ExtractShared<'_>, processed: u64) -> ProgressSnapshot {
    let elapsed = shared.started.elapsed();
    ProgressSnapshot {
        stage: ProgressStage::Extracting,
        bytes_scanned: shared.total_bytes,
        total_bytes: shared.total_bytes,
        matches_found: shared.total_matches,
        files_written: shared.counters.files_written.load(Ordering::Relaxed),
        elapsed_seconds: elapsed.as_secs_f64(),
        throughput_mib: throughput_mib(shared.total_bytes, elapsed),
        completion_pct: 50.0 + 50.0 * processed as f64 / shared.total_matches.max(1) as f64,
    }
}

/// Run a carve with no cancellation flag and no progress reporting.
pub fn run_carve(options: CarveOptions) -> Result<CarveStats> {
    MemoryCarver::new(options).run(None, None)
}

impl CarveOptions {
    /// Sensible defaults for an input/output pair; mirrors the CLI defaults.
    pub fn new(input: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            input,
            output_dir,
            max_files_per_type: Some(10_000),
            enable_conversion: true,
            save_atlas: false,
            requested_filter: None,
            workers: num_cpus::get(),
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_default_shape() {
        let opts = CarveOptions::new(PathBuf::from("a.dmp"), PathBuf::from("out"));
        assert_eq!(opts.max_files_per_type, Some(10_000));
        assert!(opts.enable_conversion);
        assert!(opts.requested_filter.is_none());
        assert!(opts.workers >= 1);
    }

    #[test]
    fn throughput_handles_zero_elapsed() {
        assert_eq!(throughput_mib(1024, Duration::ZERO), 0.0);
    }

    #[test]
    fn scan_covers_window_seams_without_duplicates() {
        let mut options = CarveOptions::new(PathBuf::from("x.dmp"), PathBuf::from("out"));
        options.window_size = 4096;
        let carver = MemoryCarver::new(options);
        let matcher = carver.registry.build_matcher();
        let quota = QuotaTracker::new(None);

        // magic entirely inside the overlap region: both windows see it
        let mut dump = vec![0u8; 10_000];
        dump[4100..4104].copy_from_slice(b"DDS ");

        let (matches, stats) =
            carver.scan_phase(&dump, &matcher, &quota, None, None, Instant::now());
        assert_eq!(stats.windows, 3);
        let offsets: Vec<u64> = matches.iter().map(|m| m.offset).collect();
        assert_eq!(offsets, vec![4100]);
    }

    #[test]
    fn scan_finds_magic_straddling_a_seam() {
        let mut options = CarveOptions::new(PathBuf::from("x.dmp"), PathBuf::from("out"));
        options.window_size = 4096;
        let carver = MemoryCarver::new(options);
        let matcher = carver.registry.build_matcher();
        let quota = QuotaTracker::new(None);

        let mut dump = vec![0u8; 8192];
        dump[4094..4098].copy_from_slice(b"LIPS");

        let (matches, _) =
            carver.scan_phase(&dump, &matcher, &quota, None, None, Instant::now());
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].offset, 4094);
    }
}
