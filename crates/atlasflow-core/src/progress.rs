//! Shared run progress and cooperative cancellation
//!
//! Both pipeline tasks update one set of counters behind a single mutex, so
//! a snapshot is always internally consistent (no torn reads across fields).
//! Cancellation is a separate atomic flag checked at page boundaries by the
//! producer and at batch boundaries by the writer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub pages_processed: u32,
    pub records_enqueued: u64,
    pub records_written: u64,
    pub records_filtered: u64,
}

#[derive(Debug, Default)]
struct Counters {
    pages_processed: u32,
    records_enqueued: u64,
    records_written: u64,
    records_filtered: u64,
}

/// Run progress shared between the fetch and write tasks
#[derive(Debug, Default, Clone)]
pub struct Progress {
    counters: Arc<Mutex<Counters>>,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_page(&self, enqueued: u64, filtered: u64) {
        if let Ok(mut c) = self.counters.lock() {
            c.pages_processed += 1;
            c.records_enqueued += enqueued;
            c.records_filtered += filtered;
        }
    }

    pub fn record_written(&self, count: u64) {
        if let Ok(mut c) = self.counters.lock() {
            c.records_written += count;
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        match self.counters.lock() {
            Ok(c) => ProgressSnapshot {
                pages_processed: c.pages_processed,
                records_enqueued: c.records_enqueued,
                records_written: c.records_written,
                records_filtered: c.records_filtered,
            },
            Err(_) => ProgressSnapshot::default(),
        }
    }
}

/// Cooperative cancellation flag, checked between pages and between batches
#[derive(Debug, Default, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
