//! Core domain types for the extraction pipeline

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upstream account credential (maps to `clientes_tokens`).
///
/// Owned by the credential store; read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ClientToken {
    pub cliente_id: i32,
    pub token: String,
    pub ativo: bool,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

/// Remote API route configuration (maps to `clientes_api_rotas`).
///
/// `url` and `headers` may carry `{token}` and `{cliente_id}` placeholders,
/// substituted at fetch time.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApiRoute {
    pub id: Uuid,
    pub cliente_id: i32,
    pub nome_rota: String,
    pub url: String,
    pub metodo_http: String,
    pub headers: serde_json::Value,
    pub ativo: bool,
}

/// Job status (maps to `clientes_scraps.status`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Created => "created",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states are never left.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "created" => JobStatus::Created,
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            "cancelled" => JobStatus::Cancelled,
            _ => JobStatus::Created,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One configured extraction task (maps to `clientes_scraps`)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScrapJob {
    pub id: Uuid,
    pub cliente_id: i32,
    pub rota_id: Uuid,
    pub data_inicio: NaiveDate,
    pub data_fim: NaiveDate,
    pub status: String,
    pub paginas_processadas: i32,
    pub registros_coletados: i64,
    pub duracao_segundos: f64,
    pub erro: Option<String>,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

impl ScrapJob {
    pub fn status(&self) -> JobStatus {
        JobStatus::from(self.status.clone())
    }
}

/// Final statistics for a finished run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Pages fetched from the remote API
    pub pages_processed: u32,
    /// Rows actually inserted (conflicts excluded)
    pub records_written: u64,
    /// Records dropped by the date filter
    pub records_filtered: u64,
    /// Wall-clock duration in seconds
    pub elapsed_secs: f64,
}

impl RunStats {
    /// Records written per second, 0 for an instantaneous run.
    pub fn throughput(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.records_written as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }
}

/// A record accepted by the pagination controller, in flight to the raw
/// store. This is the transfer queue item.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRecord {
    pub cliente_id: i32,
    pub origem: String,
    pub payload: serde_json::Value,
    pub hash_conteudo: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_round_trip() {
        for status in [
            JobStatus::Created,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert_eq!(JobStatus::from(status.as_str().to_string()), status);
        }
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(!JobStatus::Created.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_run_stats_throughput() {
        let stats = RunStats {
            pages_processed: 2,
            records_written: 155,
            records_filtered: 5,
            elapsed_secs: 31.0,
        };
        assert_eq!(stats.throughput(), 5.0);

        let empty = RunStats::default();
        assert_eq!(empty.throughput(), 0.0);
    }
}
