//! slotpool connection - blocking connection pooling
//!
//! This crate lends database connections from a fixed set of slots to
//! concurrent threads and checks their health.

pub mod health;
pub mod pool;

#[cfg(test)]
mod test_support;

pub use health::{HealthCheckConfig, HealthCheckResult, HealthChecker, HealthStatus, HealthThresholds};
pub use pool::{ConnectionPool, Lease, PoolConfig, PoolStats, PoolStatus, ThreadScope};
