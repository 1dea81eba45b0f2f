//! Pagination controller
//!
//! The producer side of a run. Walks the remote API page by page, filters
//! records against the job's date window, hashes each surviving payload and
//! enqueues it for the writer. The controller owns the sending half of the
//! transfer queue; dropping it at the end of `run` is what signals
//! end-of-stream to the writer.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, info};

use atlasflow_common::hash::content_hash;

use crate::error::{PipelineError, PipelineResult};
use crate::fetch::{DateWindow, FetchedPage, PageFetcher};
use crate::models::ExtractedRecord;
use crate::progress::{CancelToken, Progress};
use crate::queue::TransferQueue;

/// Decide whether another page should be requested after `page` was fetched
/// as page number `current`.
///
/// The upstream APIs disagree on which pagination fields they populate, so
/// any one positive signal is enough: an explicit next-page URL, or a
/// current page below `last_page` or `total_pages`. A page with no records
/// always terminates regardless of metadata.
pub fn has_next_page(page: &FetchedPage, current: u32) -> bool {
    if page.records.is_empty() {
        return false;
    }
    if page.next_page_url.is_some() {
        return true;
    }
    let current = page.current_page.unwrap_or(current);
    if let Some(last) = page.last_page {
        if current < last {
            return true;
        }
    }
    if let Some(total) = page.total_pages {
        if current < total {
            return true;
        }
    }
    false
}

/// Extract the reference date of a payload by probing the candidate fields
/// in priority order. Datetime strings are accepted; only the leading
/// `YYYY-MM-DD` prefix is parsed.
pub fn reference_date(payload: &Value, date_fields: &[String]) -> Option<NaiveDate> {
    let map = payload.as_object()?;
    for field in date_fields {
        if let Some(raw) = map.get(field).and_then(Value::as_str) {
            let prefix = raw.get(..10).unwrap_or(raw);
            if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
                return Some(date);
            }
        }
    }
    None
}

/// Producer task for one run
pub struct PaginationController<F: PageFetcher> {
    fetcher: F,
    queue: TransferQueue<ExtractedRecord>,
    window: DateWindow,
    cliente_id: i32,
    origem: String,
    date_fields: Vec<String>,
    progress: Progress,
    cancel: CancelToken,
}

impl<F: PageFetcher> PaginationController<F> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fetcher: F,
        queue: TransferQueue<ExtractedRecord>,
        window: DateWindow,
        cliente_id: i32,
        origem: String,
        date_fields: Vec<String>,
        progress: Progress,
        cancel: CancelToken,
    ) -> Self {
        Self {
            fetcher,
            queue,
            window,
            cliente_id,
            origem,
            date_fields,
            progress,
            cancel,
        }
    }

    /// Walk all pages until the API reports no more data, a fetch fails, or
    /// the run is cancelled. Consumes the controller so the queue sender is
    /// dropped on every exit path.
    pub async fn run(self) -> PipelineResult<()> {
        let mut page: u32 = 1;
        loop {
            if self.cancel.is_cancelled() {
                info!(page, "Run cancelled before fetching next page");
                return Err(PipelineError::Cancelled);
            }

            let fetched = self.fetcher.fetch_page(page).await?;
            if fetched.records.is_empty() {
                debug!(page, "Empty page, pagination complete");
                return Ok(());
            }

            let mut enqueued: u64 = 0;
            let mut filtered: u64 = 0;
            for payload in &fetched.records {
                if let Some(date) = reference_date(payload, &self.date_fields) {
                    if !self.window.contains(date) {
                        filtered += 1;
                        continue;
                    }
                }

                let record = ExtractedRecord {
                    cliente_id: self.cliente_id,
                    origem: self.origem.clone(),
                    payload: payload.clone(),
                    hash_conteudo: content_hash(payload),
                };
                if !self.queue.put(record).await {
                    // Writer gone, the run is already failing on its side.
                    return Err(PipelineError::Cancelled);
                }
                enqueued += 1;
            }

            self.progress.record_page(enqueued, filtered);
            debug!(page, enqueued, filtered, "Page processed");

            if !has_next_page(&fetched, page) {
                return Ok(());
            }
            page += 1;
        }
    }
}
