//! The connection seam between the guard protocol and a concrete driver.

use async_trait::async_trait;
use tenancy_models::SqlParam;
use thiserror::Error;

use crate::error::PoolError;

/// Error from the underlying driver while a transaction is open.
///
/// Deliberately opaque: the guard decides how a failure maps onto its own
/// taxonomy based on which protocol step it happened in.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct DriverError(pub String);

/// One open transaction on one pooled physical connection.
///
/// Contract: dropping a transaction that was neither committed nor rolled
/// back must roll it back (immediately or lazily) before the physical
/// connection can be reused. This is what makes cancellation safe.
#[async_trait]
pub trait GuardTransaction: Send {
    type Row: Send;

    async fn execute(&mut self, statement: &str, params: &[SqlParam])
        -> std::result::Result<u64, DriverError>;

    async fn fetch_all(
        &mut self,
        statement: &str,
        params: &[SqlParam],
    ) -> std::result::Result<Vec<Self::Row>, DriverError>;

    async fn commit(self) -> std::result::Result<(), DriverError>;

    async fn rollback(self) -> std::result::Result<(), DriverError>;
}

/// Bounded source of transactions.
#[async_trait]
pub trait GuardDriver: Send + Sync {
    type Tx: GuardTransaction;

    /// Check a connection out of the pool and open a transaction on it.
    /// Waits at most the configured acquire timeout before failing with a
    /// retryable pool error.
    async fn begin(&self) -> std::result::Result<Self::Tx, PoolError>;
}
