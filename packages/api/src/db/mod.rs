//! # Database module — explicit PostgreSQL pool and the Postgres store
//!
//! The pool is created once at startup by [`connect`] and handed to [`PgStore`],
//! which the HTTP layer receives through application state. Nothing here is
//! process-global.
//!
//! ## Pool policy
//!
//! - Idle connections are closed after `database.idle_timeout_secs`.
//! - Acquiring a connection waits at most `database.acquire_timeout_secs`.
//! - The initial connection is retried `database.connect_attempts` times with
//!   linear backoff (`attempt × database.connect_backoff_ms`).

mod pool;
mod postgres;

pub use pool::{backoff, connect, migrate};
pub use postgres::PgStore;
