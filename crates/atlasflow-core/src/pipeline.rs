//! Run orchestration
//!
//! [`run_extraction`] wires the two tasks of a run together over a bounded
//! queue and is generic over the fetch and store seams. [`run_job`] is the
//! production entry point: it loads the job, route and credential from
//! Postgres, drives the extraction, and lands the job in a terminal state
//! with its final counters.

use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::fetch::{DateWindow, HttpPageFetcher, PageFetcher};
use crate::jobs::JobRepository;
use crate::models::{JobStatus, RunStats, ScrapJob};
use crate::pagination::PaginationController;
use crate::progress::{CancelToken, Progress};
use crate::queue;
use crate::store::{PgRecordStore, RecordStore};
use crate::writer::PersistenceWriter;

/// How long the writer waits on an idle queue before flushing a partial
/// batch.
const WRITER_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Everything the extraction needs besides the two seams
#[derive(Debug, Clone)]
pub struct ExtractionParams {
    pub cliente_id: i32,
    pub origem: String,
    pub window: DateWindow,
    pub date_fields: Vec<String>,
    pub queue_capacity: usize,
    pub batch_size: usize,
}

impl ExtractionParams {
    pub fn from_config(
        config: &PipelineConfig,
        cliente_id: i32,
        origem: String,
        window: DateWindow,
    ) -> Self {
        Self {
            cliente_id,
            origem,
            window,
            date_fields: config.date_fields.clone(),
            queue_capacity: config.queue_capacity,
            batch_size: config.batch_size,
        }
    }
}

/// Run one extraction to completion.
///
/// The producer runs on the calling task; the writer runs on a spawned task.
/// The queue sender is dropped when the producer returns, which lets the
/// writer drain the remaining buffer before finishing, even when the
/// producer failed or was cancelled.
pub async fn run_extraction<F, S>(
    fetcher: F,
    store: S,
    params: ExtractionParams,
    progress: Progress,
    cancel: CancelToken,
) -> PipelineResult<RunStats>
where
    F: PageFetcher + 'static,
    S: RecordStore + 'static,
{
    let started = Instant::now();

    let (tx, rx) = queue::bounded(params.queue_capacity);

    let writer = PersistenceWriter::new(
        store,
        params.batch_size,
        WRITER_POLL_INTERVAL,
        progress.clone(),
    );
    let writer_handle: JoinHandle<PipelineResult<u64>> =
        tokio::spawn(async move { writer.run(rx).await });

    let controller = PaginationController::new(
        fetcher,
        tx,
        params.window,
        params.cliente_id,
        params.origem,
        params.date_fields,
        progress.clone(),
        cancel,
    );
    let producer_result = controller.run().await;

    // The sender is gone at this point, so the writer terminates after a
    // final drain whatever the producer outcome was.
    let writer_result = match writer_handle.await {
        Ok(result) => result,
        Err(join_err) => Err(PipelineError::Common(atlasflow_common::AtlasError::Unknown(
            format!("writer task failed: {}", join_err),
        ))),
    };

    let snapshot = progress.snapshot();
    let stats = RunStats {
        pages_processed: snapshot.pages_processed,
        records_written: snapshot.records_written,
        records_filtered: snapshot.records_filtered,
        elapsed_secs: started.elapsed().as_secs_f64(),
    };

    // A dead writer makes the producer see a closed queue and report
    // Cancelled; the writer's own error is the real cause in that case.
    match (producer_result, writer_result) {
        (Err(PipelineError::Cancelled), Err(err)) => Err(err),
        (Err(err), _) => Err(err),
        (Ok(()), Err(err)) => Err(err),
        (Ok(()), Ok(_)) => Ok(stats),
    }
}

/// Outcome of a finished job, regardless of terminal state
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub stats: RunStats,
    pub error: Option<String>,
}

impl JobOutcome {
    pub fn summary(&self) -> String {
        match &self.error {
            Some(err) => format!(
                "job {} {}: {} pages, {} records in {:.1}s ({})",
                self.job_id,
                self.status,
                self.stats.pages_processed,
                self.stats.records_written,
                self.stats.elapsed_secs,
                err
            ),
            None => format!(
                "job {} {}: {} pages, {} records in {:.1}s ({:.1} rec/s)",
                self.job_id,
                self.status,
                self.stats.pages_processed,
                self.stats.records_written,
                self.stats.elapsed_secs,
                self.stats.throughput()
            ),
        }
    }
}

/// Execute a `created` job end to end, with external cancellation.
///
/// Once the job is marked running, every failure path lands it in a
/// terminal state with the error recorded; a job row is never stranded
/// in `running`.
pub async fn run_job_with_cancel(
    pool: &sqlx::PgPool,
    config: &PipelineConfig,
    job_id: Uuid,
    cancel: CancelToken,
) -> PipelineResult<JobOutcome> {
    let repo = JobRepository::new(pool.clone());

    let job = repo.mark_running(job_id).await?;

    let started = Instant::now();
    let progress = Progress::new();
    let result = execute_job(pool, config, &repo, &job, progress.clone(), cancel).await;

    // Counters survive a failed or cancelled run; the job row records what
    // was actually processed before the stop.
    let partial_stats = || {
        let snap = progress.snapshot();
        RunStats {
            pages_processed: snap.pages_processed,
            records_written: snap.records_written,
            records_filtered: snap.records_filtered,
            elapsed_secs: started.elapsed().as_secs_f64(),
        }
    };

    let (status, stats, message) = match terminal_state(result) {
        (status, Some(stats), message) => (status, stats, message),
        (status, None, message) => (status, partial_stats(), message),
    };

    if status == JobStatus::Failed {
        if let Some(err) = &message {
            error!(job_id = %job.id, error = %err, "Extraction failed");
        }
    }

    repo.mark_finished(job_id, status, &stats, message.as_deref())
        .await?;

    Ok(JobOutcome {
        job_id,
        status,
        stats,
        error: message,
    })
}

/// Everything that can fail after the job is marked running. Credential,
/// route and client-build failures happen here so the caller records them
/// on the job row like any extraction failure.
async fn execute_job(
    pool: &sqlx::PgPool,
    config: &PipelineConfig,
    repo: &JobRepository,
    job: &ScrapJob,
    progress: Progress,
    cancel: CancelToken,
) -> PipelineResult<RunStats> {
    let route = repo.get_route(job.rota_id).await?;
    let token = repo.find_token(job.cliente_id).await?;

    info!(
        job_id = %job.id,
        cliente_id = job.cliente_id,
        nome_rota = %route.nome_rota,
        data_inicio = %job.data_inicio,
        data_fim = %job.data_fim,
        "Starting extraction"
    );

    let window = DateWindow::new(job.data_inicio, job.data_fim);
    let fetcher = HttpPageFetcher::new(&route, &token.token, window, config)?;
    let store = PgRecordStore::new(pool.clone());
    let params =
        ExtractionParams::from_config(config, job.cliente_id, route.nome_rota.clone(), window);

    run_extraction(fetcher, store, params, progress, cancel).await
}

/// Map an execution result to the job's terminal state. `None` stats mean
/// the caller should substitute the partial counters.
fn terminal_state(
    result: PipelineResult<RunStats>,
) -> (JobStatus, Option<RunStats>, Option<String>) {
    match result {
        Ok(stats) => (JobStatus::Completed, Some(stats), None),
        Err(PipelineError::Cancelled) => {
            (JobStatus::Cancelled, None, Some("cancelled".to_string()))
        },
        Err(err) => (JobStatus::Failed, None, Some(err.to_string())),
    }
}

/// Execute a `created` job end to end without external cancellation.
pub async fn run_job(
    pool: &sqlx::PgPool,
    config: &PipelineConfig,
    job_id: Uuid,
) -> PipelineResult<JobOutcome> {
    run_job_with_cancel(pool, config, job_id, CancelToken::new()).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_state_completed() {
        let stats = RunStats {
            pages_processed: 2,
            records_written: 155,
            records_filtered: 5,
            elapsed_secs: 1.0,
        };
        let (status, stats, message) = terminal_state(Ok(stats));
        assert_eq!(status, JobStatus::Completed);
        assert_eq!(stats.unwrap().records_written, 155);
        assert!(message.is_none());
    }

    #[test]
    fn test_credential_missing_lands_in_failed() {
        let (status, stats, message) =
            terminal_state(Err(PipelineError::CredentialMissing { cliente_id: 2151 }));
        assert_eq!(status, JobStatus::Failed);
        assert!(stats.is_none());
        assert!(message.unwrap().contains("2151"));
    }

    #[test]
    fn test_route_lookup_failure_lands_in_failed() {
        let (status, _, message) = terminal_state(Err(PipelineError::RouteNotFound {
            cliente_id: 2151,
            nome_rota: "pedido".to_string(),
        }));
        assert_eq!(status, JobStatus::Failed);
        assert!(message.unwrap().contains("pedido"));
    }

    #[test]
    fn test_cancellation_is_not_a_failure() {
        let (status, stats, message) = terminal_state(Err(PipelineError::Cancelled));
        assert_eq!(status, JobStatus::Cancelled);
        assert!(stats.is_none());
        assert_eq!(message.unwrap(), "cancelled");
    }
}
