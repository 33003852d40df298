//! Scoped, tenant-bound access to a shared multi-tenant database.
//!
//! Every transaction issued through this crate binds a validated tenant
//! identity as its first statement, screens caller statements for
//! multi-statement smuggling before they are transmitted, and guarantees
//! the binding never outlives the transaction. The raw connection pool is
//! private to the crate: there is no exported path that borrows a
//! connection without going through the guard.

pub mod config;
pub mod connection;
pub mod error;
pub mod postgres;
pub mod rls;
pub mod scoped;

pub use config::DatabaseConfig;
pub use connection::{DriverError, GuardDriver, GuardTransaction};
pub use error::{GuardError, PoolError, Result};
pub use postgres::{PgGuardTransaction, ScopedDatabase};
pub use rls::{SESSION_TENANT_KEY, TENANT_BIND_STATEMENT};
pub use scoped::{GuardStats, ScopedPool, ScopedTx};
