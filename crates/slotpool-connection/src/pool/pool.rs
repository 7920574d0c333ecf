//! Connection pool implementation

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex, RwLock};
use slotpool_core::{ConnectParams, ConnectionFactory, ErrorKind, PoolError, Result};

use super::config::PoolConfig;
use super::gate::AdmissionGate;
use super::slots::{Claim, LeaseId, SlotTable};
use super::state::{PoolState, PoolStatus, ThreadSafety};
use super::stats::PoolStats;

/// The guts of a `ConnectionPool`, shared with every outstanding `Lease`.
///
/// Lock order when both are held: `slots`, then `state`. The state lock is
/// never held while waiting on the gate or the slot lock.
struct SharedPool<F: ConnectionFactory> {
    config: PoolConfig,
    factory: F,
    slots: Mutex<SlotTable<F::Connection>>,
    /// Notified on every release, discard and reopen; `close` waits on it
    drained: Condvar,
    gate: OnceCell<AdmissionGate>,
    state: RwLock<PoolState>,
    last_error: Mutex<Option<PoolError>>,
    next_lease: AtomicU64,
}

impl<F: ConnectionFactory> SharedPool<F> {
    /// Store a failure as the pool's last error
    fn record<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_invariant_violation() {
                tracing::error!(error = %e, kind = ?e.kind(), "connection pool invariant violated");
            } else if e.is_transient() {
                tracing::debug!(error = %e, kind = ?e.kind(), "connection pool operation timed out");
            } else {
                tracing::warn!(error = %e, kind = ?e.kind(), "connection pool operation failed");
            }
            *self.last_error.lock() = Some(e.clone());
        }
        result
    }

    fn gate(&self) -> Result<&AdmissionGate> {
        self.gate.get().ok_or(PoolError::NotInitialized)
    }

    /// One-time library bootstrap and gate creation
    fn initialize(&self) -> Result<()> {
        {
            let state = self.state.read();
            if state.thread_safety() == ThreadSafety::Unsafe {
                return Err(PoolError::NotThreadSafe);
            }
            if state.is_initialized() {
                return Ok(());
            }
        }

        let mut state = self.state.write();
        match state.thread_safety() {
            ThreadSafety::Unsafe => return Err(PoolError::NotThreadSafe),
            ThreadSafety::Unchecked => {
                let safe = self.factory.is_thread_safe();
                state.record_thread_safety(safe);
                if !safe {
                    return Err(PoolError::NotThreadSafe);
                }
            }
            ThreadSafety::Safe => {}
        }
        if state.is_initialized() {
            return Ok(());
        }

        self.factory
            .init_library()
            .map_err(|e| PoolError::LibraryInit(e.to_string()))?;
        let gate = AdmissionGate::new(self.config.capacity())?;
        if self.gate.set(gate).is_err() {
            tracing::debug!("admission gate already created");
        }
        state.mark_initialized();
        tracing::info!(capacity = self.config.capacity(), "connection pool initialized");
        Ok(())
    }

    fn open(&self, params: &ConnectParams) -> Result<()> {
        self.initialize()?;

        let mut slots = self.slots.lock();
        let report = slots.fill_or_validate(&self.factory, params)?;

        let mut state = self.state.write();
        let previous = state.status();
        state.mark_open();
        drop(state);
        drop(slots);
        self.drained.notify_all();

        tracing::info!(
            created = report.created,
            validated = report.validated,
            skipped_leased = report.skipped_leased,
            previous = ?previous,
            "connection pool open"
        );
        Ok(())
    }

    fn close(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            if state.thread_safety() == ThreadSafety::Unsafe {
                return Err(PoolError::NotThreadSafe);
            }
            if !state.is_initialized() {
                return Err(PoolError::NotInitialized);
            }
            if state.status() == PoolStatus::ClosedExplicit {
                return Ok(());
            }
            state.mark_closed();
        }
        tracing::info!("connection pool closing");

        let mut slots = self.slots.lock();
        loop {
            if !self.state.read().is_closed() {
                tracing::info!("connection pool reopened while draining, keeping connections");
                return Ok(());
            }
            let leased = slots.leased_count();
            if leased == 0 {
                break;
            }
            tracing::debug!(leased, "waiting for leased connections to come back");
            self.drained.wait(&mut slots);
        }

        let closed = slots.drain_and_close(&self.factory);
        tracing::info!(closed, "connection pool closed");
        Ok(())
    }

    fn check_open(&self) -> Result<()> {
        let state = self.state.read();
        if state.thread_safety() == ThreadSafety::Unsafe {
            return Err(PoolError::NotThreadSafe);
        }
        if !state.is_initialized() {
            return Err(PoolError::NotInitialized);
        }
        if !state.is_open() {
            return Err(PoolError::NotOpen);
        }
        Ok(())
    }

    fn acquire(self: &Arc<Self>, timeout: Duration) -> Result<Lease<F>> {
        self.check_open()?;
        let gate = self.gate()?;
        let deadline = Instant::now().checked_add(timeout).ok_or_else(|| {
            PoolError::InvalidInput(format!("acquire timeout {:?} is too large", timeout))
        })?;

        gate.acquire_until(deadline)?;

        match self.lease_slot(deadline) {
            Ok((slot, id, conn)) => {
                tracing::debug!(slot, lease = id, "connection acquired");
                Ok(Lease {
                    pool: Arc::clone(self),
                    slot,
                    id,
                    conn: Some(conn),
                })
            }
            Err(e) => {
                if let Err(signal) = gate.release() {
                    tracing::error!(error = %signal, "failed to return permit after a failed acquire");
                }
                Err(e)
            }
        }
    }

    /// Take a slot once a gate permit is held, re-checking that no close began
    fn lease_slot(&self, deadline: Instant) -> Result<(usize, LeaseId, F::Connection)> {
        let mut slots = self
            .slots
            .try_lock_until(deadline)
            .ok_or(PoolError::LockTimeout)?;
        self.check_open()?;

        let id = self.next_lease.fetch_add(1, Ordering::Relaxed);
        let claim = slots.claim_free(id)?;
        drop(slots);

        match claim {
            Claim::Ready(slot, conn) => Ok((slot, id, conn)),
            Claim::Refill(slot, params) => match self.factory.connect(&params) {
                Ok(conn) => {
                    tracing::debug!(slot, lease = id, "refilled vacant slot on demand");
                    Ok((slot, id, conn))
                }
                Err(e) => {
                    self.slots.lock().vacate(slot, id)?;
                    self.drained.notify_all();
                    Err(PoolError::Connect {
                        slot,
                        reason: e.to_string(),
                    })
                }
            },
        }
    }

    fn return_slot(&self, slot: usize, id: LeaseId, conn: F::Connection) -> Result<()> {
        let returned = self.slots.lock().release_slot(slot, id, conn);
        if let Err((e, conn)) = returned {
            self.factory.close(conn);
            return Err(e);
        }
        self.drained.notify_all();
        self.gate()?.release()?;
        tracing::debug!(slot, lease = id, "connection released");
        Ok(())
    }

    fn discard_slot(&self, slot: usize, id: LeaseId, conn: F::Connection) -> Result<()> {
        self.factory.close(conn);
        self.slots.lock().vacate(slot, id)?;
        self.drained.notify_all();
        self.gate()?.release()?;
        tracing::info!(slot, lease = id, "connection discarded, slot vacated");
        Ok(())
    }

    fn ping(&self, conn: &mut F::Connection) -> Result<Duration> {
        if !self.state.read().is_initialized() {
            return Err(PoolError::NotInitialized);
        }
        let start = Instant::now();
        self.factory
            .ping(conn)
            .map_err(|e| PoolError::Ping(e.to_string()))?;
        Ok(start.elapsed())
    }
}

/// A fixed-capacity pool of blocking database connections
///
/// `open` fills every slot eagerly, `acquire` lends one connection out as a
/// [`Lease`], and `close` waits for every lease to come back before closing
/// the connections. Clones share the same pool.
pub struct ConnectionPool<F: ConnectionFactory> {
    shared: Arc<SharedPool<F>>,
}

impl<F: ConnectionFactory> Clone for ConnectionPool<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: ConnectionFactory> ConnectionPool<F> {
    /// Create a new, unopened connection pool
    pub fn new(config: PoolConfig, factory: F) -> Self {
        let slots = SlotTable::new(config.capacity());
        Self {
            shared: Arc::new(SharedPool {
                config,
                factory,
                slots: Mutex::new(slots),
                drained: Condvar::new(),
                gate: OnceCell::new(),
                state: RwLock::new(PoolState::new()),
                last_error: Mutex::new(None),
                next_lease: AtomicU64::new(0),
            }),
        }
    }

    /// Initialize the pool once, then connect or re-validate every slot
    ///
    /// On failure the pool keeps its previous status and any connection
    /// created during this call is closed again.
    #[tracing::instrument(skip(self, params), fields(target = %params.display_target()))]
    pub fn open(&self, params: &ConnectParams) -> Result<()> {
        self.shared.record(self.shared.open(params))
    }

    /// Close the pool, blocking until every lease has been returned
    ///
    /// New acquires are rejected as soon as this is called. Calling it on a
    /// pool that is already closed returns immediately.
    #[tracing::instrument(skip(self))]
    pub fn close(&self) -> Result<()> {
        self.shared.record(self.shared.close())
    }

    /// Borrow a connection, waiting up to the configured acquire timeout
    pub fn acquire(&self) -> Result<Lease<F>> {
        self.acquire_timeout(self.shared.config.acquire_timeout())
    }

    /// Borrow a connection, waiting at most `timeout` for a free one
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<Lease<F>> {
        self.shared.record(self.shared.acquire(timeout))
    }

    /// Return a lease to the pool
    ///
    /// A lease taken from a different pool is rejected with `InvalidInput`
    /// and goes back to its own pool when dropped.
    pub fn release(&self, lease: Lease<F>) -> Result<()> {
        if !Arc::ptr_eq(&lease.pool, &self.shared) {
            return self.shared.record(Err(PoolError::InvalidInput(
                "lease was acquired from a different pool".into(),
            )));
        }
        lease.release()
    }

    /// Ping the leased connection and return the round-trip time
    ///
    /// Slot state is not touched; the caller still owns the lease afterwards.
    pub fn ping(&self, lease: &mut Lease<F>) -> Result<Duration> {
        let result = match lease.conn.as_mut() {
            Some(conn) => self.shared.ping(conn),
            None => Err(PoolError::InvalidInput("lease holds no connection".into())),
        };
        self.shared.record(result)
    }

    /// Record that connectivity was lost without an explicit close.
    ///
    /// The pool stops lending connections until `open` re-validates them.
    pub fn mark_lost(&self) -> Result<()> {
        let mut state = self.shared.state.write();
        if !state.is_initialized() {
            drop(state);
            return self.shared.record(Err(PoolError::NotInitialized));
        }
        if state.is_open() {
            state.mark_lost();
            tracing::warn!("connection pool marked as lost");
        }
        Ok(())
    }

    /// Whether connections can currently be acquired
    pub fn is_open(&self) -> bool {
        self.shared.state.read().is_open()
    }

    /// Whether the pool was never opened or was closed with `close`
    pub fn is_closed(&self) -> bool {
        self.shared.state.read().is_closed()
    }

    /// Current lifecycle status
    pub fn status(&self) -> PoolStatus {
        self.shared.state.read().status()
    }

    /// The most recent failure, or the reason the pool is unusable
    ///
    /// Precedence: last recorded error, then not-thread-safe, not
    /// initialized, not open. `None` means no known error.
    pub fn last_error(&self) -> Option<PoolError> {
        if let Some(e) = self.shared.last_error.lock().clone() {
            return Some(e);
        }
        let state = self.shared.state.read();
        if state.thread_safety() == ThreadSafety::Unsafe {
            Some(PoolError::NotThreadSafe)
        } else if !state.is_initialized() {
            Some(PoolError::NotInitialized)
        } else if !state.is_open() {
            Some(PoolError::NotOpen)
        } else {
            None
        }
    }

    /// Kind of [`last_error`](Self::last_error)
    pub fn last_error_kind(&self) -> Option<ErrorKind> {
        self.last_error().map(|e| e.kind())
    }

    /// Human-readable form of [`last_error`](Self::last_error)
    pub fn last_error_message(&self) -> String {
        self.last_error()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error or no error".to_string())
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        let slots = self.shared.slots.lock();
        let (available, waiting) = match self.shared.gate.get() {
            Some(gate) => (gate.available(), gate.waiting()),
            None => (slots.capacity(), 0),
        };
        PoolStats::new(
            slots.capacity(),
            slots.idle_count(),
            slots.leased_count(),
            slots.vacant_count(),
            available,
            waiting,
        )
    }

    /// Run the factory's per-thread init now and its teardown when the scope drops
    pub fn thread_scope(&self) -> ThreadScope<'_, F> {
        self.shared.factory.thread_init();
        ThreadScope {
            factory: &self.shared.factory,
        }
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Get the connection factory
    pub fn factory(&self) -> &F {
        &self.shared.factory
    }

    #[cfg(test)]
    pub(crate) fn with_slots<R>(&self, f: impl FnOnce(&SlotTable<F::Connection>) -> R) -> R {
        f(&self.shared.slots.lock())
    }
}

impl<F: ConnectionFactory> std::fmt::Debug for ConnectionPool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.shared.config)
            .field("status", &self.status())
            .finish()
    }
}

/// A connection borrowed from the pool
///
/// The holder has exclusive use of the connection until the lease is
/// released, discarded or dropped. Dropping returns it like `release` does.
pub struct Lease<F: ConnectionFactory> {
    pool: Arc<SharedPool<F>>,
    slot: usize,
    id: LeaseId,
    conn: Option<F::Connection>,
}

impl<F: ConnectionFactory> Lease<F> {
    /// Index of the slot this connection belongs to
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Identity of this loan, unique within its pool
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Swap in a reconnected connection object; it goes back to the same slot
    pub fn replace(&mut self, conn: F::Connection) -> F::Connection {
        std::mem::replace(&mut **self, conn)
    }

    /// Return the connection to its slot and the permit to the gate
    pub fn release(mut self) -> Result<()> {
        let result = match self.conn.take() {
            Some(conn) => self.pool.return_slot(self.slot, self.id, conn),
            None => Err(PoolError::InvalidInput("lease holds no connection".into())),
        };
        self.pool.record(result)
    }

    /// Close a broken connection instead of returning it.
    ///
    /// The slot stays empty until the next acquire or `open` refills it.
    pub fn discard(mut self) -> Result<()> {
        let result = match self.conn.take() {
            Some(conn) => self.pool.discard_slot(self.slot, self.id, conn),
            None => Err(PoolError::InvalidInput("lease holds no connection".into())),
        };
        self.pool.record(result)
    }
}

impl<F: ConnectionFactory> Deref for Lease<F> {
    type Target = F::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection taken")
    }
}

impl<F: ConnectionFactory> DerefMut for Lease<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection taken")
    }
}

impl<F: ConnectionFactory> Drop for Lease<F> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let result = self.pool.return_slot(self.slot, self.id, conn);
            if self.pool.record(result).is_err() {
                tracing::error!(slot = self.slot, lease = self.id, "dropped lease could not be returned");
            }
        }
    }
}

impl<F: ConnectionFactory> std::fmt::Debug for Lease<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("slot", &self.slot)
            .field("id", &self.id)
            .finish()
    }
}

/// Guard pairing the factory's per-thread init and teardown hooks
#[must_use = "the thread teardown hook runs when this guard is dropped"]
pub struct ThreadScope<'a, F: ConnectionFactory> {
    factory: &'a F,
}

impl<F: ConnectionFactory> Drop for ThreadScope<'_, F> {
    fn drop(&mut self) {
        self.factory.thread_end();
    }
}

impl<F: ConnectionFactory> std::fmt::Debug for ThreadScope<'_, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadScope").finish_non_exhaustive()
    }
}
