//! Health checking for pooled connections
//!
//! Pings are classified by latency; repeated failures mark the pool lost so
//! that the next `open` re-validates every slot.
//!
//! # Example
//!
//! ```ignore
//! use slotpool_connection::health::{HealthCheckConfig, HealthChecker};
//!
//! let checker = HealthChecker::new(HealthCheckConfig::new(3));
//! let mut lease = pool.acquire()?;
//! let result = checker.check(&pool, &mut lease);
//! println!("{:?} in {:?}", result.status, result.latency);
//! ```

mod checker;
mod status;


pub use checker::{HealthCheckConfig, HealthCheckResult, HealthChecker};
pub use status::{HealthStatus, HealthThresholds};
