//! Multi-threaded insert workload run through the pool

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use serde::Serialize;
use slotpool_connection::{ConnectionPool, PoolStats};
use slotpool_driver_sqlite::{SqliteFactory, is_busy};

use crate::retry::{RetryConfig, retry};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS workload_rows (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    worker INTEGER NOT NULL,
    seq INTEGER NOT NULL,
    slot INTEGER NOT NULL
)";

const INSERT_ROW: &str = "INSERT INTO workload_rows (worker, seq, slot) VALUES (?1, ?2, ?3)";

#[derive(Debug, Clone)]
pub struct WorkloadOptions {
    pub workers: usize,
    pub rows_per_worker: usize,
    pub retry: RetryConfig,
}

/// Totals printed once every worker has finished
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadReport {
    pub inserted: u64,
    pub failed: u64,
    pub busy_retries: u64,
    pub acquire_timeouts: u64,
    pub elapsed_ms: u64,
    pub table_rows: i64,
    pub stats: PoolStats,
}

#[derive(Default)]
struct Counters {
    inserted: AtomicU64,
    failed: AtomicU64,
    busy_retries: AtomicU64,
    acquire_timeouts: AtomicU64,
}

pub fn prepare(pool: &ConnectionPool<SqliteFactory>) -> anyhow::Result<()> {
    let lease = pool.acquire().context("no connection to create the table")?;
    retry(
        &RetryConfig::default(),
        || lease.raw().execute_batch(CREATE_TABLE),
        is_busy,
    )
    .context("failed to create workload table")?;
    pool.release(lease)?;
    Ok(())
}

/// Insert `rows_per_worker` rows from each of `workers` threads
pub fn run(
    pool: &ConnectionPool<SqliteFactory>,
    options: &WorkloadOptions,
) -> anyhow::Result<WorkloadReport> {
    prepare(pool)?;

    let counters = Counters::default();
    let started = Instant::now();

    thread::scope(|scope| {
        for worker in 0..options.workers {
            let counters = &counters;
            thread::Builder::new()
                .name(format!("worker-{worker}"))
                .spawn_scoped(scope, move || run_worker(pool, worker, options, counters))
                .map(|_| ())
                .with_context(|| format!("failed to spawn worker {worker}"))?;
        }
        anyhow::Ok(())
    })?;

    let elapsed = started.elapsed();
    let table_rows = count_rows(pool)?;

    Ok(WorkloadReport {
        inserted: counters.inserted.load(Ordering::Relaxed),
        failed: counters.failed.load(Ordering::Relaxed),
        busy_retries: counters.busy_retries.load(Ordering::Relaxed),
        acquire_timeouts: counters.acquire_timeouts.load(Ordering::Relaxed),
        elapsed_ms: elapsed.as_millis() as u64,
        table_rows,
        stats: pool.stats(),
    })
}

fn run_worker(
    pool: &ConnectionPool<SqliteFactory>,
    worker: usize,
    options: &WorkloadOptions,
    counters: &Counters,
) {
    let _scope = pool.thread_scope();

    for seq in 0..options.rows_per_worker {
        let lease = match pool.acquire() {
            Ok(lease) => lease,
            Err(e) => {
                if e.is_transient() {
                    counters.acquire_timeouts.fetch_add(1, Ordering::Relaxed);
                }
                counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(worker, seq, error = %e, "could not acquire a connection");
                continue;
            }
        };

        let slot = lease.slot();
        let inserted = retry(
            &options.retry,
            || lease.raw().execute(INSERT_ROW, (worker as i64, seq as i64, slot as i64)),
            is_busy,
        );
        match inserted {
            Ok((_, retries)) => {
                counters.inserted.fetch_add(1, Ordering::Relaxed);
                counters.busy_retries.fetch_add(u64::from(retries), Ordering::Relaxed);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(worker, seq, slot, error = %e, "insert failed");
            }
        }

        if let Err(e) = pool.release(lease) {
            tracing::error!(worker, slot, error = %e, "failed to release connection");
        }
    }

    tracing::debug!(worker, "worker finished");
}

fn count_rows(pool: &ConnectionPool<SqliteFactory>) -> anyhow::Result<i64> {
    let lease = pool
        .acquire_timeout(Duration::from_secs(5))
        .context("no connection to count rows")?;
    let rows = lease
        .raw()
        .query_row("SELECT COUNT(*) FROM workload_rows", [], |row| row.get(0))?;
    pool.release(lease)?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use slotpool_connection::PoolConfig;
    use slotpool_core::ConnectParams;

    #[test]
    fn test_every_row_is_inserted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workload.db");
        let pool = ConnectionPool::new(PoolConfig::new(3), SqliteFactory::new());
        pool.open(&ConnectParams::for_database(path.to_str().unwrap()))
            .unwrap();

        let options = WorkloadOptions {
            workers: 6,
            rows_per_worker: 20,
            retry: RetryConfig::default(),
        };
        let report = run(&pool, &options).unwrap();

        assert_eq!(report.inserted, 120);
        assert_eq!(report.failed, 0);
        assert_eq!(report.table_rows, 120);
        assert_eq!(report.stats.leased(), 0);
        assert_eq!(report.stats.available_permits(), 3);

        pool.close().unwrap();
    }
}
