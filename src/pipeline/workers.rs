//! Extraction worker threads.
//!
//! Phase 2 fans the sorted match list out to a fixed set of scoped threads.
//! Workers share the mapped dump as a plain slice; all cross-worker state is
//! the quota map, the claimed-offset set, the manifest, and a handful of
//! atomic counters.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{Scope, ScopedJoinHandle};
use std::time::Instant;

use crossbeam_channel::Receiver;
use tracing::{debug, warn};

use crate::boundary::BoundaryScanner;
use crate::extract::{CarveExtractor, CarveMatch, Rejection};
use crate::manifest::Manifest;
use crate::pipeline::quota::{ClaimedOffsets, QuotaTracker};
use crate::pipeline::{ProgressReporter, extract_snapshot};
use crate::pool::BufferPool;
use crate::registry::FormatRegistry;
use crate::writer::CarveWriter;

#[derive(Default)]
pub struct ExtractCounters {
    pub processed: AtomicU64,
    pub files_written: AtomicU64,
    pub parse_rejects: AtomicU64,
    pub size_rejects: AtomicU64,
    pub quota_skips: AtomicU64,
    pub write_failures: AtomicU64,
}

/// Everything a worker borrows from the orchestrator for the duration of the
/// extraction phase.
pub struct ExtractShared<'a> {
    pub dump: &'a [u8],
    pub registry: &'static FormatRegistry,
    pub boundary: &'a BoundaryScanner,
    pub pool: Arc<BufferPool>,
    pub writer: &'a CarveWriter,
    pub manifest: &'a Manifest,
    pub quota: &'a QuotaTracker,
    pub claimed: &'a ClaimedOffsets,
    pub counters: &'a ExtractCounters,
    pub output_root: std::path::PathBuf,
    pub total_matches: u64,
    pub total_bytes: u64,
    pub started: Instant,
}

pub fn spawn_extract_workers<'scope, 'env>(
    scope: &'scope Scope<'scope, 'env>,
    workers: usize,
    shared: &'env ExtractShared<'env>,
    rx: Receiver<CarveMatch>,
    progress: Option<Arc<dyn ProgressReporter>>,
) -> Vec<ScopedJoinHandle<'scope, ()>> {
    let mut handles = Vec::new();
    let worker_count = workers.max(1);
    // report roughly every 1% of matches
    let step = (shared.total_matches / 100).max(1);

    for _ in 0..worker_count {
        let rx = rx.clone();
        let progress = progress.clone();

        handles.push(scope.spawn(move || {
            let extractor = CarveExtractor::new(
                shared.dump,
                shared.registry,
                shared.boundary,
                Arc::clone(&shared.pool),
                shared.output_root.clone(),
            );

            for m in rx.iter() {
                process_match(shared, &extractor, &m);

                let processed = shared.counters.processed.fetch_add(1, Ordering::Relaxed) + 1;
                if processed % step == 0 {
                    if let Some(reporter) = &progress {
                        reporter.on_progress(&extract_snapshot(shared, processed));
                    }
                }
            }
        }));
    }

    handles
}

fn process_match(shared: &ExtractShared<'_>, extractor: &CarveExtractor<'_>, m: &CarveMatch) {
    if !shared.quota.below_written_cap(m.signature_id) {
        shared.counters.quota_skips.fetch_add(1, Ordering::Relaxed);
        return;
    }
    if !shared.claimed.try_claim(m.offset) {
        return;
    }

    match extractor.extract(m) {
        Ok(extracted) => {
            shared.quota.record_written(m.signature_id);
            match shared.writer.write(extracted, shared.manifest) {
                Ok(()) => {
                    shared.counters.files_written.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    shared
                        .counters
                        .write_failures
                        .fetch_add(1, Ordering::Relaxed);
                    warn!("write failed at {:#x}: {err}", m.offset);
                }
            }
        }
        Err(Rejection::SizeOutOfRange) => {
            shared.counters.size_rejects.fetch_add(1, Ordering::Relaxed);
            debug!("size out of range at {:#x} ({})", m.offset, m.signature_id);
        }
        Err(Rejection::ParseFailed) | Err(Rejection::UnknownSignature) => {
            shared.counters.parse_rejects.fetch_add(1, Ordering::Relaxed);
            debug!("candidate rejected at {:#x} ({})", m.offset, m.signature_id);
        }
    }
}
