//! Persistence writer
//!
//! The consumer side of a run. Accumulates records from the transfer queue
//! into batches and commits each batch in one transaction. A partial batch
//! is flushed whenever the queue stays quiet for one poll interval, so a
//! stalled producer never leaves records sitting in memory. End-of-stream
//! (queue closed and drained) triggers a final flush.

use std::time::Duration;
use tracing::{debug, info};

use crate::error::PipelineResult;
use crate::models::ExtractedRecord;
use crate::progress::Progress;
use crate::queue::{Polled, TransferReceiver};
use crate::store::RecordStore;

pub struct PersistenceWriter<S: RecordStore> {
    store: S,
    batch_size: usize,
    poll_interval: Duration,
    progress: Progress,
}

impl<S: RecordStore> PersistenceWriter<S> {
    pub fn new(store: S, batch_size: usize, poll_interval: Duration, progress: Progress) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            poll_interval,
            progress,
        }
    }

    /// Consume the queue until it is closed and drained. Returns the total
    /// number of rows inserted across all batches.
    pub async fn run(self, mut rx: TransferReceiver<ExtractedRecord>) -> PipelineResult<u64> {
        let mut buffer: Vec<ExtractedRecord> = Vec::with_capacity(self.batch_size);
        let mut total: u64 = 0;

        loop {
            match rx.get(self.poll_interval).await {
                Polled::Item(record) => {
                    buffer.push(record);
                    if buffer.len() >= self.batch_size {
                        total += self.flush(&mut buffer).await?;
                    }
                },
                Polled::Empty => {
                    if !buffer.is_empty() {
                        total += self.flush(&mut buffer).await?;
                    }
                },
                Polled::Closed => {
                    total += self.flush(&mut buffer).await?;
                    info!(total, "Transfer queue drained, writer finished");
                    return Ok(total);
                },
            }
        }
    }

    async fn flush(&self, buffer: &mut Vec<ExtractedRecord>) -> PipelineResult<u64> {
        if buffer.is_empty() {
            return Ok(0);
        }
        let batch_len = buffer.len();
        let inserted = self.store.insert_batch(buffer).await?;
        buffer.clear();

        self.progress.record_written(inserted);
        debug!(
            batch = batch_len,
            inserted,
            skipped = batch_len as u64 - inserted,
            "Batch committed"
        );
        Ok(inserted)
    }
}
