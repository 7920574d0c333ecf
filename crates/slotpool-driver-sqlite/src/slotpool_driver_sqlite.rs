//! SQLite connection factory for slotpool

mod connection;
mod factory;

pub use connection::{SqliteConnection, is_busy};
pub use factory::SqliteFactory;
