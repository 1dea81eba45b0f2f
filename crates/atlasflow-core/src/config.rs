//! Pipeline configuration

use serde::{Deserialize, Serialize};

// ============================================================================
// Pipeline Configuration Constants
// ============================================================================

/// Default maximum fetch attempts per page (first try + retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default backoff base delay in milliseconds.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;

/// Default fixed backoff offset in milliseconds.
pub const DEFAULT_BACKOFF_OFFSET_MS: u64 = 500;

/// Default backoff cap in milliseconds.
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 60_000;

/// Default number of records per transactional commit.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default transfer queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1_000;

/// Default page size requested from the remote API.
pub const DEFAULT_PER_PAGE: u32 = 1_000;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default candidate payload fields for the per-record reference date, in
/// priority order.
pub const DEFAULT_DATE_FIELDS: &[&str] =
    &["data_pedido", "data_emissao", "data_baixa", "created_at"];

/// Pipeline configuration
///
/// Supplied by the job-creation collaborator; the core never reads the
/// process environment at run time. `from_env` exists for the CLI to build
/// a config once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum fetch attempts per page before `FetchExhausted`
    pub max_attempts: u32,
    /// Backoff base delay in milliseconds
    pub backoff_base_ms: u64,
    /// Fixed backoff offset in milliseconds
    pub backoff_offset_ms: u64,
    /// Backoff cap in milliseconds
    pub backoff_max_ms: u64,
    /// Records per transactional commit
    pub batch_size: usize,
    /// Transfer queue capacity
    pub queue_capacity: usize,
    /// Page size requested from the remote API
    pub per_page: u32,
    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
    /// Candidate payload fields for the reference date, in priority order
    pub date_fields: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_offset_ms: DEFAULT_BACKOFF_OFFSET_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            per_page: DEFAULT_PER_PAGE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            date_fields: DEFAULT_DATE_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment, falling back to defaults.
    ///
    /// Environment variables:
    /// - `ATLASFLOW_MAX_ATTEMPTS`
    /// - `ATLASFLOW_BACKOFF_BASE_MS`
    /// - `ATLASFLOW_BACKOFF_OFFSET_MS`
    /// - `ATLASFLOW_BACKOFF_MAX_MS`
    /// - `ATLASFLOW_BATCH_SIZE`
    /// - `ATLASFLOW_QUEUE_CAPACITY`
    /// - `ATLASFLOW_PER_PAGE`
    /// - `ATLASFLOW_REQUEST_TIMEOUT_SECS`
    /// - `ATLASFLOW_DATE_FIELDS` (comma-separated, priority order)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse("ATLASFLOW_MAX_ATTEMPTS") {
            config.max_attempts = v;
        }
        if let Some(v) = env_parse("ATLASFLOW_BACKOFF_BASE_MS") {
            config.backoff_base_ms = v;
        }
        if let Some(v) = env_parse("ATLASFLOW_BACKOFF_OFFSET_MS") {
            config.backoff_offset_ms = v;
        }
        if let Some(v) = env_parse("ATLASFLOW_BACKOFF_MAX_MS") {
            config.backoff_max_ms = v;
        }
        if let Some(v) = env_parse("ATLASFLOW_BATCH_SIZE") {
            config.batch_size = v;
        }
        if let Some(v) = env_parse("ATLASFLOW_QUEUE_CAPACITY") {
            config.queue_capacity = v;
        }
        if let Some(v) = env_parse("ATLASFLOW_PER_PAGE") {
            config.per_page = v;
        }
        if let Some(v) = env_parse("ATLASFLOW_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = v;
        }
        if let Ok(fields) = std::env::var("ATLASFLOW_DATE_FIELDS") {
            let fields: Vec<String> = fields
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !fields.is_empty() {
                config.date_fields = fields;
            }
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
