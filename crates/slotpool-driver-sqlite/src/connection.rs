//! SQLite connection wrapper lent out by the pool

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection as RusqliteConnection, ErrorCode, OpenFlags};
use slotpool_core::{PoolError, Result};

/// One pooled SQLite connection
///
/// Opened with WAL journaling and a busy timeout so several pooled
/// connections can share one database file.
pub struct SqliteConnection {
    conn: RusqliteConnection,
    path: String,
}

impl SqliteConnection {
    /// Open a connection to the database at `path`
    pub fn open(path: &str, busy_timeout: Duration, wal: bool) -> Result<Self> {
        tracing::debug!(path = %path, "opening SQLite connection");
        let expanded_path = Self::expand_path(path)?;

        // Each lease has exclusive use of its connection, so SQLite's own
        // per-connection mutex is not needed.
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory().map_err(|e| {
                PoolError::Driver(format!("failed to open in-memory database: {}", e))
            })?
        } else {
            if !expanded_path.starts_with("file:")
                && let Some(parent) = Path::new(&expanded_path).parent()
                && !parent.exists()
            {
                return Err(PoolError::InvalidInput(format!(
                    "parent directory does not exist: {}",
                    parent.display()
                )));
            }

            RusqliteConnection::open_with_flags(&expanded_path, flags).map_err(|e| {
                PoolError::Driver(format!(
                    "failed to open SQLite database at '{}': {}",
                    expanded_path, e
                ))
            })?
        };

        conn.busy_timeout(busy_timeout)
            .map_err(|e| PoolError::Driver(format!("failed to set busy timeout: {}", e)))?;

        if wal {
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(|e| PoolError::Driver(format!("failed to set journal mode: {}", e)))?;
            conn.pragma_update(None, "synchronous", "NORMAL").map_err(|e| {
                PoolError::Driver(format!("failed to set synchronous mode: {}", e))
            })?;
        }

        Ok(Self {
            conn,
            path: expanded_path,
        })
    }

    fn expand_path(path: &str) -> Result<String> {
        if path == ":memory:" || path.starts_with("file:") {
            return Ok(path.to_string());
        }

        let expanded = if let Some(rest) = path.strip_prefix("~/") {
            match std::env::var_os("HOME") {
                Some(home) => PathBuf::from(home).join(rest),
                None => {
                    return Err(PoolError::InvalidInput(
                        "unable to determine HOME directory".into(),
                    ));
                }
            }
        } else if path.starts_with('~') {
            return Err(PoolError::InvalidInput(
                "user-specific home directories (~user) are not supported".into(),
            ));
        } else {
            PathBuf::from(path)
        };

        let absolute = if expanded.is_relative() {
            std::env::current_dir()
                .map_err(|e| PoolError::InvalidInput(format!("no current directory: {}", e)))?
                .join(expanded)
        } else {
            expanded
        };

        Ok(absolute.to_string_lossy().to_string())
    }

    /// Resolved database path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The underlying rusqlite connection
    pub fn raw(&self) -> &RusqliteConnection {
        &self.conn
    }

    /// Round-trip a trivial query
    pub fn ping(&self) -> Result<()> {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|e| PoolError::Driver(e.to_string()))
    }

    /// Close the connection, reporting SQLite's error if it refuses
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| PoolError::Driver(format!("failed to close '{}': {}", self.path, e)))
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .finish()
    }
}

/// Whether a query failed only because another connection held the lock
///
/// Such failures are worth retrying after a short backoff.
pub fn is_busy(error: &rusqlite::Error) -> bool {
    matches!(
        error.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}
