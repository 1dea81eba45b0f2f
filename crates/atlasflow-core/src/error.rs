//! Pipeline error taxonomy
//!
//! Only unrecoverable conditions live here. A transient fetch failure inside
//! the retry budget is absorbed by the fetcher, and a content-hash conflict
//! on insert is an expected idempotent no-op, not an error.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Unrecoverable pipeline failures; each one is fatal to the running job.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A transient failure survived past the retry budget.
    #[error("fetch exhausted {attempts} attempts on page {page}: {source}")]
    FetchExhausted {
        page: u32,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// The remote API rejected the request; retrying cannot help.
    #[error("fetch rejected on page {page} (status {status}): {message}")]
    FetchRejected {
        page: u32,
        status: u16,
        message: String,
    },

    /// No active token exists for the requested client.
    #[error("no active token for cliente_id {cliente_id}")]
    CredentialMissing { cliente_id: i32 },

    /// The requested job does not exist.
    #[error("job {0} not found")]
    JobNotFound(uuid::Uuid),

    /// The job exists but is not in the state the transition expects.
    #[error("job {job_id} is '{status}', expected 'created'")]
    NotRunnable { job_id: uuid::Uuid, status: String },

    /// No active route matches the requested client and name.
    #[error("no active route '{nome_rota}' for cliente_id {cliente_id}")]
    RouteNotFound { cliente_id: i32, nome_rota: String },

    /// The job's date window is inverted.
    #[error("invalid date range: {start} is after {end}")]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    /// The destination store is unavailable or rejected the write.
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    /// Infrastructure failure surfaced from the common crate.
    #[error(transparent)]
    Common(#[from] atlasflow_common::AtlasError),

    /// The job was cancelled cooperatively.
    #[error("job cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Whether this error corresponds to the `failed` terminal state, as
    /// opposed to a cooperative cancellation.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PipelineError::Cancelled)
    }
}
