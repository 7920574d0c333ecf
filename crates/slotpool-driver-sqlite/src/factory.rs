//! SQLite connection factory

use std::time::Duration;

use slotpool_core::{ConnectParams, ConnectionFactory, PoolError, Result};

use crate::SqliteConnection;

/// Default time a connection waits on a locked database before failing
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens SQLite connections for a pool
///
/// `ConnectParams::database` is the database file path (or `:memory:`).
/// Host, port and credentials are ignored.
#[derive(Debug, Clone)]
pub struct SqliteFactory {
    busy_timeout: Duration,
    wal: bool,
}

impl SqliteFactory {
    pub fn new() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            wal: true,
        }
    }

    /// How long a statement waits for a lock held by another connection
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Use write-ahead logging (on by default)
    pub fn with_wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }

    /// Busy timeout applied to every new connection
    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }
}

impl Default for SqliteFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionFactory for SqliteFactory {
    type Connection = SqliteConnection;

    fn is_thread_safe(&self) -> bool {
        // SAFETY: sqlite3_threadsafe only reads a compile-time constant.
        unsafe { rusqlite::ffi::sqlite3_threadsafe() != 0 }
    }

    fn init_library(&self) -> Result<()> {
        tracing::info!(version = rusqlite::version(), "SQLite library ready");
        Ok(())
    }

    #[tracing::instrument(skip(self, params), fields(database = params.database.as_deref()))]
    fn connect(&self, params: &ConnectParams) -> Result<SqliteConnection> {
        let path = params.database.as_deref().ok_or_else(|| {
            PoolError::InvalidInput(
                "SQLite requires 'database' to be the database file path".into(),
            )
        })?;
        if !params.autocommit {
            return Err(PoolError::InvalidInput(
                "SQLite connections always autocommit outside explicit transactions".into(),
            ));
        }

        SqliteConnection::open(path, self.busy_timeout, self.wal)
    }

    fn ping(&self, conn: &mut SqliteConnection) -> Result<()> {
        conn.ping()
    }

    fn close(&self, conn: SqliteConnection) {
        if let Err(e) = conn.close() {
            tracing::warn!(error = %e, "failed to close SQLite connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotpool_core::ErrorKind;

    #[test]
    fn test_bundled_sqlite_is_thread_safe() {
        assert!(SqliteFactory::new().is_thread_safe());
    }

    #[test]
    fn test_connect_requires_database_path() {
        let factory = SqliteFactory::new();
        let err = factory
            .connect(&ConnectParams::new("localhost", 0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_connect_rejects_manual_commit() {
        let factory = SqliteFactory::new();
        let params = ConnectParams::for_database(":memory:").with_autocommit(false);
        let err = factory.connect(&params).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_connect_ping_close_in_memory() {
        let factory = SqliteFactory::new().with_wal(false);
        let mut conn = factory
            .connect(&ConnectParams::for_database(":memory:"))
            .unwrap();
        factory.ping(&mut conn).unwrap();
        factory.close(conn);
    }

    #[test]
    fn test_busy_timeout_is_applied_to_new_connections() {
        let factory = SqliteFactory::new()
            .with_wal(false)
            .with_busy_timeout(Duration::from_millis(250));
        assert_eq!(factory.busy_timeout(), Duration::from_millis(250));
        assert_eq!(SqliteFactory::default().busy_timeout(), DEFAULT_BUSY_TIMEOUT);

        let conn = factory
            .connect(&ConnectParams::for_database(":memory:"))
            .unwrap();
        let applied: i64 = conn
            .raw()
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, 250);
        factory.close(conn);
    }
}
