//! The connection factory collaborator

use std::sync::Arc;

use crate::{ConnectParams, Result};

/// Factory trait for creating, checking and destroying connections.
///
/// A pool never talks to the database itself; everything driver-specific goes
/// through this trait. All methods are blocking.
pub trait ConnectionFactory: Send + Sync + 'static {
    /// The connection object lent out by the pool
    type Connection: Send + 'static;

    /// Whether the underlying client library may be used from several threads.
    ///
    /// Checked once, on the first `open`. A `false` answer is permanent for
    /// the pool that asked.
    fn is_thread_safe(&self) -> bool {
        true
    }

    /// One-time client library bootstrap, run before the first connect
    fn init_library(&self) -> Result<()> {
        Ok(())
    }

    /// Open a new connection.
    ///
    /// Implementations enable reconnect-on-ping where the driver supports it
    /// and apply `params.autocommit` before returning.
    fn connect(&self, params: &ConnectParams) -> Result<Self::Connection>;

    /// Check that a connection is still usable, reconnecting if the driver can
    fn ping(&self, conn: &mut Self::Connection) -> Result<()>;

    /// Close a connection. Best-effort, failures are only logged.
    fn close(&self, conn: Self::Connection);

    /// Per-thread client initialization, before a thread first uses a connection
    fn thread_init(&self) {}

    /// Per-thread client teardown, when a thread no longer needs the database
    fn thread_end(&self) {}
}

impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    type Connection = T::Connection;

    fn is_thread_safe(&self) -> bool {
        (**self).is_thread_safe()
    }

    fn init_library(&self) -> Result<()> {
        (**self).init_library()
    }

    fn connect(&self, params: &ConnectParams) -> Result<Self::Connection> {
        (**self).connect(params)
    }

    fn ping(&self, conn: &mut Self::Connection) -> Result<()> {
        (**self).ping(conn)
    }

    fn close(&self, conn: Self::Connection) {
        (**self).close(conn)
    }

    fn thread_init(&self) {
        (**self).thread_init()
    }

    fn thread_end(&self) {
        (**self).thread_end()
    }
}
