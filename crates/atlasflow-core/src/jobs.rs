//! Job lifecycle and repository
//!
//! `clientes_scraps` is the system of record for runs. Status transitions
//! are guarded in SQL (`WHERE status = ...`) so a crashed or concurrent
//! process can never resurrect a terminal job, and the row's counters are
//! only written once, when the run reaches a terminal state.

use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{ApiRoute, ClientToken, JobStatus, RunStats, ScrapJob};

/// Repository for `clientes_scraps` and its collaborating tables
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a job in `created` state for an active route of the client.
    pub async fn create_job(
        &self,
        cliente_id: i32,
        nome_rota: &str,
        data_inicio: NaiveDate,
        data_fim: NaiveDate,
    ) -> PipelineResult<ScrapJob> {
        if data_inicio > data_fim {
            return Err(PipelineError::InvalidDateRange {
                start: data_inicio,
                end: data_fim,
            });
        }

        let route = self.find_route(cliente_id, nome_rota).await?;

        let job = sqlx::query_as::<_, ScrapJob>(
            r#"
            INSERT INTO clientes_scraps (id, cliente_id, rota_id, data_inicio, data_fim, status)
            VALUES ($1, $2, $3, $4, $5, 'created')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(cliente_id)
        .bind(route.id)
        .bind(data_inicio)
        .bind(data_fim)
        .fetch_one(&self.pool)
        .await?;

        info!(job_id = %job.id, cliente_id, nome_rota, "Job created");
        Ok(job)
    }

    pub async fn get_job(&self, job_id: Uuid) -> PipelineResult<ScrapJob> {
        sqlx::query_as::<_, ScrapJob>("SELECT * FROM clientes_scraps WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(PipelineError::JobNotFound(job_id))
    }

    /// Most recent jobs first, optionally filtered by client.
    pub async fn list_jobs(
        &self,
        cliente_id: Option<i32>,
        limit: i64,
    ) -> PipelineResult<Vec<ScrapJob>> {
        let jobs = match cliente_id {
            Some(cliente_id) => {
                sqlx::query_as::<_, ScrapJob>(
                    r#"
                    SELECT * FROM clientes_scraps
                    WHERE cliente_id = $1
                    ORDER BY criado_em DESC
                    LIMIT $2
                    "#,
                )
                .bind(cliente_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            },
            None => {
                sqlx::query_as::<_, ScrapJob>(
                    "SELECT * FROM clientes_scraps ORDER BY criado_em DESC LIMIT $1",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            },
        };
        Ok(jobs)
    }

    /// Look up the active route for a client by name.
    pub async fn find_route(&self, cliente_id: i32, nome_rota: &str) -> PipelineResult<ApiRoute> {
        sqlx::query_as::<_, ApiRoute>(
            r#"
            SELECT id, cliente_id, nome_rota, url, metodo_http, headers, ativo
            FROM clientes_api_rotas
            WHERE cliente_id = $1 AND nome_rota = $2 AND ativo = TRUE
            "#,
        )
        .bind(cliente_id)
        .bind(nome_rota)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PipelineError::RouteNotFound {
            cliente_id,
            nome_rota: nome_rota.to_string(),
        })
    }

    pub async fn get_route(&self, rota_id: Uuid) -> PipelineResult<ApiRoute> {
        sqlx::query_as::<_, ApiRoute>(
            r#"
            SELECT id, cliente_id, nome_rota, url, metodo_http, headers, ativo
            FROM clientes_api_rotas
            WHERE id = $1
            "#,
        )
        .bind(rota_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PipelineError::Storage(sqlx::Error::RowNotFound))
    }

    /// Resolve the client's active credential. Missing or inactive tokens
    /// fail the job before any request is issued.
    pub async fn find_token(&self, cliente_id: i32) -> PipelineResult<ClientToken> {
        sqlx::query_as::<_, ClientToken>(
            r#"
            SELECT cliente_id, token, ativo, criado_em, atualizado_em
            FROM clientes_tokens
            WHERE cliente_id = $1 AND ativo = TRUE
            "#,
        )
        .bind(cliente_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PipelineError::CredentialMissing { cliente_id })
    }

    /// Transition `created -> running`. Returns the fresh row, or an error
    /// if the job was already picked up or is terminal.
    pub async fn mark_running(&self, job_id: Uuid) -> PipelineResult<ScrapJob> {
        let job = sqlx::query_as::<_, ScrapJob>(
            r#"
            UPDATE clientes_scraps
            SET status = 'running', atualizado_em = NOW()
            WHERE id = $1 AND status = 'created'
            RETURNING *
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        match job {
            Some(job) => Ok(job),
            None => {
                let current = self.get_job(job_id).await?;
                warn!(job_id = %job_id, status = %current.status, "Job is not in created state");
                Err(PipelineError::NotRunnable {
                    job_id,
                    status: current.status,
                })
            },
        }
    }

    /// Transition `running` to a terminal state, recording final counters.
    /// Guarded so only the owning run can finish the job.
    pub async fn mark_finished(
        &self,
        job_id: Uuid,
        status: JobStatus,
        stats: &RunStats,
        erro: Option<&str>,
    ) -> PipelineResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE clientes_scraps
            SET status = $2,
                paginas_processadas = $3,
                registros_coletados = $4,
                duracao_segundos = $5,
                erro = $6,
                atualizado_em = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .bind(status.as_str())
        .bind(stats.pages_processed as i32)
        .bind(stats.records_written as i64)
        .bind(stats.elapsed_secs)
        .bind(erro)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(job_id = %job_id, "Finish skipped, job is no longer running");
        } else {
            info!(
                job_id = %job_id,
                status = %status,
                pages = stats.pages_processed,
                records = stats.records_written,
                "Job finished"
            );
        }
        Ok(())
    }
}
