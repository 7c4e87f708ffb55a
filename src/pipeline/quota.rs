//! Per-signature quotas and offset claiming.
//!
//! Quotas are best-effort caps: concurrent workers may race an increment or
//! two past the limit, which the contract permits. The claimed-offset set is
//! the single mechanism preventing two workers from extracting the same
//! byte range when overlapping magics match at one offset.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub struct QuotaTracker {
    cap: Option<u64>,
    matched: Mutex<HashMap<&'static str, u64>>,
    written: Mutex<HashMap<&'static str, u64>>,
}

impl QuotaTracker {
    pub fn new(cap: Option<u64>) -> Self {
        Self {
            cap,
            matched: Mutex::new(HashMap::new()),
            written: Mutex::new(HashMap::new()),
        }
    }

    /// Scan-phase admission: count the match unless its signature already hit
    /// the cap.
    pub fn admit_match(&self, signature_id: &'static str) -> bool {
        let Some(cap) = self.cap else {
            return true;
        };
        let mut matched = self.matched.lock().expect("quota poisoned");
        let count = matched.entry(signature_id).or_insert(0);
        if *count >= cap {
            return false;
        }
        *count += 1;
        true
    }

    /// Extract-phase re-check against files actually produced.
    pub fn below_written_cap(&self, signature_id: &str) -> bool {
        let Some(cap) = self.cap else {
            return true;
        };
        let written = self.written.lock().expect("quota poisoned");
        written.get(signature_id).copied().unwrap_or(0) < cap
    }

    pub fn record_written(&self, signature_id: &'static str) {
        let mut written = self.written.lock().expect("quota poisoned");
        *written.entry(signature_id).or_insert(0) += 1;
    }
}

/// Concurrent set of offsets already handed to an extractor.
#[derive(Default)]
pub struct ClaimedOffsets {
    set: Mutex<HashSet<u64>>,
}

impl ClaimedOffsets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim an offset; `false` means another worker got there
    /// first.
    pub fn try_claim(&self, offset: u64) -> bool {
        self.set.lock().expect("claims poisoned").insert(offset)
    }
}
