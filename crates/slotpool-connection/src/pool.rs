//! Fixed-capacity blocking connection pool
//!
//! A pool owns `capacity` slots. `open` connects all of them up front; an
//! admission gate then lets at most `capacity` callers hold a connection at
//! once, and everyone else waits up to the acquire timeout.
//!
//! # Example
//!
//! ```ignore
//! use slotpool_connection::pool::{ConnectionPool, PoolConfig};
//! use slotpool_core::ConnectParams;
//!
//! let config = PoolConfig::new(8).with_acquire_timeout_ms(5_000);
//! let pool = ConnectionPool::new(config, factory);
//! pool.open(&ConnectParams::for_database("app.db"))?;
//!
//! let lease = pool.acquire()?;
//! // Use the connection through the lease...
//! pool.release(lease)?;
//!
//! pool.close()?;
//! ```

mod config;
mod gate;
mod pool;
mod slots;
mod state;
mod stats;


pub use config::PoolConfig;
pub use pool::{ConnectionPool, Lease, ThreadScope};
pub use state::PoolStatus;
pub use stats::PoolStats;
