//! Raw record store
//!
//! One generic landing table (`dados_raw`) receives every payload regardless
//! of route. Duplicate detection is delegated to the database through the
//! `(cliente_id, hash_conteudo)` unique constraint with `ON CONFLICT DO
//! NOTHING`, so re-running a window is idempotent without any read-side
//! bookkeeping.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::PipelineResult;
use crate::models::ExtractedRecord;

/// Persistence seam for the writer task
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a batch atomically. Returns the number of rows actually
    /// inserted; records rejected by the uniqueness constraint are counted
    /// out silently.
    async fn insert_batch(&self, records: &[ExtractedRecord]) -> PipelineResult<u64>;
}

/// Postgres-backed [`RecordStore`] over `dados_raw`
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn insert_batch(&self, records: &[ExtractedRecord]) -> PipelineResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted: u64 = 0;
        for record in records {
            let result = sqlx::query(
                r#"
                INSERT INTO dados_raw (cliente_id, origem, payload, hash_conteudo)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (cliente_id, hash_conteudo) DO NOTHING
                "#,
            )
            .bind(record.cliente_id)
            .bind(&record.origem)
            .bind(&record.payload)
            .bind(&record.hash_conteudo)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;

        Ok(inserted)
    }
}
