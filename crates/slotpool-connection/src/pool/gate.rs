//! Admission gate: a blocking counting semaphore bounding checked-out connections

use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use slotpool_core::{PoolError, Result};

struct Permits {
    available: usize,
    waiting: usize,
}

/// Counting gate with `capacity` permits.
///
/// `acquire_until` blocks while no permit is free; `release` never blocks.
/// The count stays within `0..=capacity`.
pub(crate) struct AdmissionGate {
    capacity: usize,
    permits: Mutex<Permits>,
    freed: Condvar,
}

impl AdmissionGate {
    pub(crate) fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PoolError::GateInit(
                "pool capacity must be at least one connection".into(),
            ));
        }
        Ok(Self {
            capacity,
            permits: Mutex::new(Permits {
                available: capacity,
                waiting: 0,
            }),
            freed: Condvar::new(),
        })
    }

    /// Take one permit, waiting no later than `deadline`
    pub(crate) fn acquire_until(&self, deadline: Instant) -> Result<()> {
        let started = Instant::now();
        let mut permits = self.permits.lock();
        permits.waiting += 1;
        while permits.available == 0 {
            if self.freed.wait_until(&mut permits, deadline).timed_out() && permits.available == 0
            {
                permits.waiting -= 1;
                return Err(PoolError::GateTimeout {
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
        }
        permits.waiting -= 1;
        permits.available -= 1;
        Ok(())
    }

    /// Return one permit and wake one waiter
    pub(crate) fn release(&self) -> Result<()> {
        let mut permits = self.permits.lock();
        if permits.available >= self.capacity {
            return Err(PoolError::GateSignal(format!(
                "release without a matching acquire ({} of {} permits already free)",
                permits.available, self.capacity
            )));
        }
        permits.available += 1;
        drop(permits);
        self.freed.notify_one();
        Ok(())
    }

    pub(crate) fn available(&self) -> usize {
        self.permits.lock().available
    }

    pub(crate) fn waiting(&self) -> usize {
        self.permits.lock().waiting
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_zero_capacity_is_rejected() {
        let err = AdmissionGate::new(0).err().expect("zero capacity must fail");
        assert_eq!(err.kind(), slotpool_core::ErrorKind::GateInitFailed);
    }

    #[test]
    fn test_acquire_until_exhausted_then_timeout() {
        let gate = AdmissionGate::new(2).unwrap();
        let deadline = Instant::now() + Duration::from_millis(50);
        gate.acquire_until(deadline).unwrap();
        gate.acquire_until(deadline).unwrap();
        assert_eq!(gate.available(), 0);

        let err = gate
            .acquire_until(Instant::now() + Duration::from_millis(30))
            .unwrap_err();
        assert!(matches!(err, PoolError::GateTimeout { .. }));
        assert_eq!(gate.waiting(), 0);
    }

    #[test]
    fn test_release_over_capacity_fails() {
        let gate = AdmissionGate::new(1).unwrap();
        let err = gate.release().unwrap_err();
        assert_eq!(err.kind(), slotpool_core::ErrorKind::GateSignalFailed);
        assert_eq!(gate.available(), 1);
    }

    #[test]
    fn test_release_wakes_blocked_acquirer() {
        let gate = Arc::new(AdmissionGate::new(1).unwrap());
        gate.acquire_until(Instant::now() + Duration::from_secs(1))
            .unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.acquire_until(Instant::now() + Duration::from_secs(5)))
        };

        while gate.waiting() == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        gate.release().unwrap();

        waiter.join().unwrap().expect("waiter should get the released permit");
        assert_eq!(gate.available(), 0);
    }
}
