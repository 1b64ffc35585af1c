//! SQLite storage layer for the waymark forum.
//!
//! Owns connection pooling and schema migrations. Everything above this
//! crate borrows a [`DbPool`] connection and runs plain SQL against the
//! tables created by [`migrations::run_migrations`].

pub mod migrations;
pub mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, PoolError, PoolSettings};
