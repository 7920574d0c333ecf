//! slotpool core - shared abstractions for the connection pool
//!
//! This crate provides the types every other slotpool crate depends on:
//!
//! - `ConnectionFactory` - trait a database driver implements for the pool
//! - `ConnectParams` - parameters used to open each pooled connection
//! - `PoolError` / `ErrorKind` - the error taxonomy

mod error;
mod factory;
mod params;

pub use error::*;
pub use factory::*;
pub use params::*;
