//! slotpool - drive a blocking connection pool from several threads

mod config;
mod logging;
mod retry;
mod workload;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use slotpool_connection::{ConnectionPool, HealthCheckConfig, HealthChecker, PoolConfig};
use slotpool_core::ConnectParams;
use slotpool_driver_sqlite::SqliteFactory;

use crate::config::FileConfig;
use crate::logging::{LogFormat, LoggingConfig};
use crate::workload::WorkloadOptions;

#[derive(Parser, Debug)]
#[command(name = "slotpool", version, about = "Fixed-capacity connection pool demo over SQLite")]
struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty, env = "SLOTPOOL_LOG_FORMAT")]
    log_format: LogFormat,

    /// Enable debug logging for the pool
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert rows from several worker threads through the pool
    Run {
        #[command(flatten)]
        pool: PoolArgs,

        /// Number of worker threads
        #[arg(long, default_value_t = 16, env = "SLOTPOOL_WORKERS")]
        workers: usize,

        /// Rows inserted by each worker
        #[arg(long, default_value_t = 100, env = "SLOTPOOL_ROWS")]
        rows: usize,
    },
    /// Open the pool, ping every connection and report its health
    Check {
        #[command(flatten)]
        pool: PoolArgs,
    },
}

#[derive(Args, Debug)]
struct PoolArgs {
    /// SQLite database file
    #[arg(long, env = "SLOTPOOL_DATABASE")]
    database: Option<String>,

    /// Number of pooled connections
    #[arg(long, env = "SLOTPOOL_CAPACITY")]
    capacity: Option<usize>,

    /// Seconds an acquire may wait for a free connection
    #[arg(long, env = "SLOTPOOL_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// TOML file with [pool], [connect] and [retry] sections
    #[arg(long, env = "SLOTPOOL_CONFIG")]
    config: Option<PathBuf>,
}

impl PoolArgs {
    /// File settings with command-line overrides applied
    fn resolve(&self) -> anyhow::Result<FileConfig> {
        let mut config = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        if let Some(capacity) = self.capacity {
            config.pool = PoolConfig::new(capacity)
                .with_acquire_timeout(config.pool.acquire_timeout());
        }
        if let Some(secs) = self.timeout_secs {
            config.pool = config.pool.with_acquire_timeout_ms(secs.saturating_mul(1000));
        }
        if let Some(database) = &self.database {
            config.connect = config.connect.with_database(database);
        }
        if config.connect.database.is_none() {
            config.connect = config.connect.with_database("slotpool.db");
        }
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::default().with_format(cli.log_format);
    if cli.verbose {
        logging = logging.verbose();
    }
    if let Err(e) = logging::init(logging) {
        eprintln!("failed to initialize logging: {e:#}");
        return ExitCode::FAILURE;
    }

    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "slotpool failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Run {
            pool,
            workers,
            rows,
        } => {
            let config = pool.resolve()?;
            let pool = open_pool(&config.pool, &config.connect)?;
            let options = WorkloadOptions {
                workers,
                rows_per_worker: rows,
                retry: config.retry,
            };

            let report = workload::run(&pool, &options);
            pool.close().context("failed to close the pool")?;
            let report = report?;

            println!("{}", serde_json::to_string_pretty(&report)?);
            anyhow::ensure!(report.failed == 0, "{} rows could not be inserted", report.failed);
            Ok(())
        }
        Command::Check { pool } => {
            let config = pool.resolve()?;
            let pool = open_pool(&config.pool, &config.connect)?;
            let checker = HealthChecker::new(HealthCheckConfig::new(1));

            let mut leases = Vec::with_capacity(config.pool.capacity());
            for _ in 0..config.pool.capacity() {
                leases.push(pool.acquire().context("failed to acquire a connection")?);
            }
            for lease in &mut leases {
                let result = checker.check(&pool, lease);
                println!(
                    "slot {}: {:?} ({})",
                    lease.slot(),
                    result.status,
                    result
                        .latency
                        .map(|l| format!("{} us", l.as_micros()))
                        .or(result.error)
                        .unwrap_or_default()
                );
            }
            drop(leases);

            println!("{}", serde_json::to_string_pretty(&pool.stats())?);
            pool.close().context("failed to close the pool")?;
            Ok(())
        }
    }
}

fn open_pool(
    config: &PoolConfig,
    params: &ConnectParams,
) -> anyhow::Result<ConnectionPool<SqliteFactory>> {
    let pool = ConnectionPool::new(config.clone(), SqliteFactory::new());
    pool.open(params)
        .with_context(|| format!("failed to open pool for {}", params.display_target()))?;
    tracing::info!(
        capacity = config.capacity(),
        timeout_ms = config.acquire_timeout().as_millis() as u64,
        "pool ready"
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::time::Duration;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "slotpool",
            "run",
            "--database",
            "bench.db",
            "--capacity",
            "4",
            "--timeout-secs",
            "2",
            "--workers",
            "3",
        ])
        .unwrap();

        let Command::Run { pool, workers, rows } = cli.command else {
            panic!("expected run");
        };
        assert_eq!((workers, rows), (3, 100));

        let config = pool.resolve().unwrap();
        assert_eq!(config.pool.capacity(), 4);
        assert_eq!(config.pool.acquire_timeout(), Duration::from_secs(2));
        assert_eq!(config.connect.database.as_deref(), Some("bench.db"));
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slotpool.toml");
        std::fs::write(
            &path,
            "[pool]\ncapacity = 2\nacquire_timeout_ms = 750\n[connect]\ndatabase = \"file.db\"\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "slotpool",
            "check",
            "--config",
            path.to_str().unwrap(),
            "--capacity",
            "5",
        ])
        .unwrap();
        let Command::Check { pool } = cli.command else {
            panic!("expected check");
        };

        let config = pool.resolve().unwrap();
        assert_eq!(config.pool.capacity(), 5);
        assert_eq!(config.pool.acquire_timeout(), Duration::from_millis(750));
        assert_eq!(config.connect.database.as_deref(), Some("file.db"));
    }
}
