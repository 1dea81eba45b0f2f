//! AtlasFlow - incremental API extraction tool

use anyhow::{Context, Result};
use atlasflow_common::logging::{init_logging, LogConfig, LogLevel};
use atlasflow_core::config::PipelineConfig;
use atlasflow_core::db::{self, DbConfig};
use atlasflow_core::jobs::JobRepository;
use atlasflow_core::pipeline;
use atlasflow_core::progress::CancelToken;
use chrono::NaiveDate;
use clap::Parser;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "atlasflow")]
#[command(author, version, about = "Incremental paginated-API extraction to Postgres")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Apply pending database migrations
    Migrate,

    /// Create an extraction job for a client route and date window
    CreateJob {
        /// Client identifier
        #[arg(long)]
        cliente_id: i32,

        /// Route name (e.g. "pedido")
        #[arg(long)]
        rota: String,

        /// Window start, YYYY-MM-DD
        #[arg(long)]
        data_inicio: NaiveDate,

        /// Window end, YYYY-MM-DD
        #[arg(long)]
        data_fim: NaiveDate,
    },

    /// Execute a created job to completion
    Run {
        /// Job identifier
        job_id: Uuid,
    },

    /// List recent jobs
    ListJobs {
        /// Restrict to one client
        #[arg(long)]
        cliente_id: Option<i32>,

        /// Maximum number of jobs to show
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Show one job's current state
    Status {
        /// Job identifier
        job_id: Uuid,
    },
}

/// Logging setup: environment configuration first, then the verbose flag
/// raises the level on top of whatever the environment chose.
fn resolve_log_config(verbose: bool) -> LogConfig {
    let mut config = LogConfig::from_env().unwrap_or_default();
    if verbose {
        config.level = LogLevel::Debug;
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging(&resolve_log_config(cli.verbose))?;

    let db_config = DbConfig::from_env().context("database configuration")?;
    let pool = db::create_pool(&db_config).await?;

    match cli.command {
        Command::Migrate => {
            sqlx::migrate!("../../migrations")
                .run(&pool)
                .await
                .context("running migrations")?;
            info!("Migrations applied");
        },
        Command::CreateJob {
            cliente_id,
            rota,
            data_inicio,
            data_fim,
        } => {
            let repo = JobRepository::new(pool.clone());
            let job = repo
                .create_job(cliente_id, &rota, data_inicio, data_fim)
                .await?;
            println!("{}", job.id);
        },
        Command::Run { job_id } => {
            let config = PipelineConfig::from_env();

            let cancel = CancelToken::new();
            let signal_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, finishing current batch");
                    signal_cancel.cancel();
                }
            });

            let outcome = pipeline::run_job_with_cancel(&pool, &config, job_id, cancel).await?;
            println!("{}", outcome.summary());
            if outcome.error.is_some() {
                std::process::exit(1);
            }
        },
        Command::ListJobs { cliente_id, limit } => {
            let repo = JobRepository::new(pool.clone());
            let jobs = repo.list_jobs(cliente_id, limit).await?;
            for job in jobs {
                println!(
                    "{}  {:<9}  cliente {}  {} .. {}  pages {}  records {}",
                    job.id,
                    job.status,
                    job.cliente_id,
                    job.data_inicio,
                    job.data_fim,
                    job.paginas_processadas,
                    job.registros_coletados
                );
            }
        },
        Command::Status { job_id } => {
            let repo = JobRepository::new(pool.clone());
            let job = repo.get_job(job_id).await?;
            println!("id:         {}", job.id);
            println!("status:     {}", job.status);
            println!("cliente_id: {}", job.cliente_id);
            println!("window:     {} .. {}", job.data_inicio, job.data_fim);
            println!("pages:      {}", job.paginas_processadas);
            println!("records:    {}", job.registros_coletados);
            println!("duration:   {:.1}s", job.duracao_segundos);
            if let Some(erro) = &job.erro {
                println!("error:      {}", erro);
            }
        },
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_flag_raises_log_level() {
        assert_eq!(resolve_log_config(true).level, LogLevel::Debug);
    }
}
