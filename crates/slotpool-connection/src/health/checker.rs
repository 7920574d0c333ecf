//! Failure-counting health checker for pooled connections

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use slotpool_core::ConnectionFactory;

use super::status::{HealthStatus, HealthThresholds};
use crate::pool::{ConnectionPool, Lease};

/// Configuration for a [`HealthChecker`]
#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    /// Latency bounds for classifying a successful ping
    pub thresholds: HealthThresholds,
    /// Consecutive failed pings after which the pool is marked lost
    pub failure_threshold: u32,
}

impl HealthCheckConfig {
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            thresholds: HealthThresholds::default(),
            failure_threshold: failure_threshold.max(1),
        }
    }

    pub fn with_thresholds(mut self, thresholds: HealthThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Outcome of one health check
#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    /// Round-trip time, when the ping succeeded
    pub latency: Option<Duration>,
    /// Failure message, when it did not
    pub error: Option<String>,
    pub checked_at: Instant,
    /// Failed checks in a row, including this one
    pub consecutive_failures: u32,
    /// Whether this check pushed the pool into the lost state
    pub marked_lost: bool,
}

/// Pings leased connections and marks the pool lost after repeated failures.
///
/// One checker can be shared by several threads checking the same pool.
#[derive(Debug)]
pub struct HealthChecker {
    config: HealthCheckConfig,
    consecutive_failures: AtomicU32,
    last_status: Mutex<HealthStatus>,
}

impl HealthChecker {
    pub fn new(config: HealthCheckConfig) -> Self {
        Self {
            config,
            consecutive_failures: AtomicU32::new(0),
            last_status: Mutex::new(HealthStatus::Healthy),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(HealthCheckConfig::default())
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.config
    }

    /// Status reported by the most recent check
    pub fn last_status(&self) -> HealthStatus {
        *self.last_status.lock()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Ping `lease` through `pool` and classify the result
    pub fn check<F: ConnectionFactory>(
        &self,
        pool: &ConnectionPool<F>,
        lease: &mut Lease<F>,
    ) -> HealthCheckResult {
        let result = match pool.ping(lease) {
            Ok(latency) => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
                HealthCheckResult {
                    status: HealthStatus::classify(latency, &self.config.thresholds),
                    latency: Some(latency),
                    error: None,
                    checked_at: Instant::now(),
                    consecutive_failures: 0,
                    marked_lost: false,
                }
            }
            Err(e) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                let marked_lost = failures >= self.config.failure_threshold && pool.is_open();
                if marked_lost {
                    tracing::warn!(failures, slot = lease.slot(), "connection health lost");
                    if let Err(e) = pool.mark_lost() {
                        tracing::error!(error = %e, "failed to mark pool lost");
                    }
                }
                HealthCheckResult {
                    status: HealthStatus::Unhealthy,
                    latency: None,
                    error: Some(e.to_string()),
                    checked_at: Instant::now(),
                    consecutive_failures: failures,
                    marked_lost,
                }
            }
        };

        let mut last = self.last_status.lock();
        if *last != result.status {
            tracing::info!(from = ?*last, to = ?result.status, "connection health changed");
            *last = result.status;
        }
        result
    }

    /// Forget previous failures, e.g. after the pool was reopened
    pub fn reset(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        *self.last_status.lock() = HealthStatus::Healthy;
    }
}
