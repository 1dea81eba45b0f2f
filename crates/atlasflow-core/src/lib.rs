//! AtlasFlow Core
//!
//! The collection-and-persistence pipeline: paginated extraction from remote
//! APIs with retry/backoff, a bounded producer/consumer hand-off, and
//! idempotent batched persistence into the raw store.
//!
//! # Architecture
//!
//! A running job consists of exactly two concurrent tasks connected by a
//! bounded [`queue::TransferQueue`]:
//!
//! - the extraction task ([`pagination::PaginationController`] driving a
//!   [`fetch::PageFetcher`]) walks the remote API page by page, filters
//!   records by their reference date, and enqueues accepted records;
//! - the persistence task ([`writer::PersistenceWriter`]) drains the queue
//!   and commits batches into the raw store with insert-or-ignore semantics
//!   keyed by (cliente_id, hash_conteudo).
//!
//! [`pipeline::run_job`] wires both tasks together and drives the job record
//! through its lifecycle (`created -> running -> completed/failed/cancelled`).
//!
//! # Example
//!
//! ```no_run
//! use atlasflow_core::{config::PipelineConfig, db, pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db_config = db::DbConfig::from_env()?;
//!     let pool = db::create_pool(&db_config).await?;
//!     let config = PipelineConfig::from_env();
//!     let job_id = uuid::Uuid::new_v4();
//!     let outcome = pipeline::run_job(&pool, &config, job_id).await?;
//!     println!("{}", outcome.summary());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod fetch;
pub mod jobs;
pub mod models;
pub mod pagination;
pub mod pipeline;
pub mod progress;
pub mod queue;
pub mod retry;
pub mod store;
pub mod writer;

pub use error::{PipelineError, PipelineResult};
