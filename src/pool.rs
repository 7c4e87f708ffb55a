//! Shared byte-buffer pool for extractor header windows.
//!
//! Buffers are keyed by capacity and returned to the pool when the guard
//! drops, so a long extraction phase reuses a handful of allocations instead
//! of churning one per match. Final payload buffers are NOT pooled; they are
//! handed off to the writer by value.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct BufferPool {
    shelves: Mutex<HashMap<usize, Vec<Vec<u8>>>>,
}

impl BufferPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Check out a zeroed buffer of exactly `size` bytes.
    pub fn get(self: &Arc<Self>, size: usize) -> PooledBuf {
        let mut shelves = self.shelves.lock().expect("buffer pool poisoned");
        let buf = match shelves.get_mut(&size).and_then(|shelf| shelf.pop()) {
            Some(mut buf) => {
                buf.iter_mut().for_each(|b| *b = 0);
                buf
            }
            None => vec![0u8; size],
        };
        PooledBuf {
            buf: Some(buf),
            pool: Arc::clone(self),
        }
    }

    fn put_back(&self, buf: Vec<u8>) {
        let mut shelves = self.shelves.lock().expect("buffer pool poisoned");
        let shelf = shelves.entry(buf.len()).or_default();
        // cap per-size retention so odd window sizes don't accumulate
        if shelf.len() < 16 {
            shelf.push(buf);
        }
    }

    #[cfg(test)]
    fn shelf_len(&self, size: usize) -> usize {
        self.shelves
            .lock()
            .expect("buffer pool poisoned")
            .get(&size)
            .map_or(0, |s| s.len())
    }
}

pub struct PooledBuf {
    buf: Option<Vec<u8>>,
    pool: Arc<BufferPool>,
}

impl Deref for PooledBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().expect("buffer taken")
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().expect("buffer taken")
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.put_back(buf);
        }
    }
}
