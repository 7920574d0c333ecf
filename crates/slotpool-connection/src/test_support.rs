//! Mock factory and tracing setup shared by the unit tests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use slotpool_core::{ConnectParams, ConnectionFactory, PoolError, Result};

use crate::pool::{ConnectionPool, PoolConfig};

pub(crate) fn init_test_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("slotpool_connection=debug".parse().unwrap()),
            )
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

#[derive(Debug)]
pub(crate) struct MockConnection {
    pub serial: usize,
}

/// Factory that numbers its connections and can be told to fail
#[derive(Default)]
pub(crate) struct MockFactory {
    pub thread_unsafe: bool,
    pub fail_library_init: bool,
    /// 1-based index of the connect call that fails
    pub fail_connect_at: Option<usize>,
    pub fail_pings: AtomicBool,
    /// Time each connect call sleeps before answering
    pub connect_delay: Mutex<Option<Duration>>,
    pub connects: AtomicUsize,
    pub pings: AtomicUsize,
    pub library_inits: AtomicUsize,
    pub thread_inits: AtomicUsize,
    pub thread_ends: AtomicUsize,
    pub closed: Mutex<Vec<usize>>,
}

impl MockFactory {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn failing_connect_at(nth: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_connect_at: Some(nth),
            ..Self::default()
        })
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> Vec<usize> {
        self.closed.lock().clone()
    }

    /// Connections created and not yet closed
    pub(crate) fn live(&self) -> usize {
        self.connects() - self.closed.lock().len()
    }

    pub(crate) fn set_fail_pings(&self, fail: bool) {
        self.fail_pings.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock() = Some(delay);
    }
}

impl ConnectionFactory for MockFactory {
    type Connection = MockConnection;

    fn is_thread_safe(&self) -> bool {
        !self.thread_unsafe
    }

    fn init_library(&self) -> Result<()> {
        self.library_inits.fetch_add(1, Ordering::SeqCst);
        if self.fail_library_init {
            return Err(PoolError::Driver("client library unavailable".into()));
        }
        Ok(())
    }

    fn connect(&self, _params: &ConnectParams) -> Result<MockConnection> {
        let delay = *self.connect_delay.lock();
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        let attempt = self.connects.load(Ordering::SeqCst) + 1;
        if self.fail_connect_at == Some(attempt) {
            return Err(PoolError::Driver("connection refused".into()));
        }
        let id = self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection { serial: id })
    }

    fn ping(&self, _conn: &mut MockConnection) -> Result<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.fail_pings.load(Ordering::SeqCst) {
            return Err(PoolError::Driver("server has gone away".into()));
        }
        Ok(())
    }

    fn close(&self, conn: MockConnection) {
        self.closed.lock().push(conn.serial);
    }

    fn thread_init(&self) {
        self.thread_inits.fetch_add(1, Ordering::SeqCst);
    }

    fn thread_end(&self) {
        self.thread_ends.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) fn params() -> ConnectParams {
    ConnectParams::new("localhost", 3306)
        .with_user("app")
        .with_database("test")
}

pub(crate) fn open_pool(
    capacity: usize,
    factory: Arc<MockFactory>,
) -> ConnectionPool<Arc<MockFactory>> {
    init_test_tracing();
    let pool = ConnectionPool::new(PoolConfig::new(capacity), factory);
    pool.open(&params()).expect("open should succeed");
    pool
}
