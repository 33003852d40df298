//! The scoped transaction guard.
//!
//! `ScopedPool::with_tenant` is the single entry point for running caller
//! statements against tenant-partitioned tables. It owns the full protocol:
//! acquire, begin, bind tenant, screen and run caller statements, commit or
//! roll back, release. The tenant binding is transaction-scoped, so release
//! implicitly discards it; the next acquirer of the same physical
//! connection re-binds before anything else runs.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use serde::Serialize;
use tenancy_audit::{AuditHook, AuditOutcome};
use tenancy_guard::{classify, InjectionRisk, StatementVerdict};
use tenancy_models::SqlParam;
use tenancy_tenant::TenantContext;
use tracing::warn;

use crate::connection::{GuardDriver, GuardTransaction};
use crate::error::{GuardError, PoolError, Result};
use crate::rls::TENANT_BIND_STATEMENT;

/// Transactions slower than this get a warning log.
const SLOW_TRANSACTION: Duration = Duration::from_millis(100);

/// Statement surface handed to caller operations.
///
/// This is the only way to reach the underlying transaction. Every
/// statement template passes the statement guard before transmission; a
/// rejection poisons the transaction, so later statements fail closed even
/// if the caller swallowed the rejection error.
pub struct ScopedTx<X: GuardTransaction> {
    tx: X,
    rejection: Option<InjectionRisk>,
}

impl<X: GuardTransaction> ScopedTx<X> {
    fn new(tx: X) -> Self {
        Self {
            tx,
            rejection: None,
        }
    }

    fn screen(&mut self, statement: &str) -> Result<()> {
        if let Some(risk) = &self.rejection {
            return Err(GuardError::IsolationViolation(format!(
                "transaction poisoned by an earlier rejected statement: {risk}"
            )));
        }
        match classify(statement) {
            StatementVerdict::Allow => Ok(()),
            StatementVerdict::Reject(risk) => {
                self.rejection = Some(risk.clone());
                Err(GuardError::StatementRejected(risk))
            }
        }
    }

    /// Screen and run a statement, returning the affected row count.
    pub async fn execute(&mut self, statement: &str, params: &[SqlParam]) -> Result<u64> {
        self.screen(statement)?;
        self.tx
            .execute(statement, params)
            .await
            .map_err(|e| GuardError::Database(e.to_string()))
    }

    /// Screen and run a statement, returning all rows.
    pub async fn fetch_all(
        &mut self,
        statement: &str,
        params: &[SqlParam],
    ) -> Result<Vec<X::Row>> {
        self.screen(statement)?;
        self.tx
            .fetch_all(statement, params)
            .await
            .map_err(|e| GuardError::Database(e.to_string()))
    }

    fn into_parts(self) -> (X, Option<InjectionRisk>) {
        (self.tx, self.rejection)
    }
}

#[derive(Debug, Default)]
struct GuardCounters {
    started: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
    rejected: AtomicU64,
    open: AtomicUsize,
    high_water: AtomicUsize,
}

/// Point-in-time guard counters.
#[derive(Debug, Clone, Serialize)]
pub struct GuardStats {
    pub started: u64,
    pub committed: u64,
    pub rolled_back: u64,
    pub rejected: u64,
    pub open: usize,
    pub high_water: usize,
}

/// Decrements the open-transaction gauge on every exit path, including
/// cancellation.
struct OpenGuard<'a> {
    counters: &'a GuardCounters,
}

impl<'a> OpenGuard<'a> {
    fn enter(counters: &'a GuardCounters) -> Self {
        counters.started.fetch_add(1, Ordering::Relaxed);
        let open = counters.open.fetch_add(1, Ordering::SeqCst) + 1;
        counters.high_water.fetch_max(open, Ordering::SeqCst);
        Self { counters }
    }
}

impl Drop for OpenGuard<'_> {
    fn drop(&mut self) {
        self.counters.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Guarded access to a bounded pool of connections.
///
/// Generic over the driver so the protocol can be exercised against an
/// instrumented fake; production code uses the Postgres driver via
/// [`ScopedDatabase`](crate::ScopedDatabase).
pub struct ScopedPool<D: GuardDriver> {
    driver: D,
    audit: AuditHook,
    counters: Arc<GuardCounters>,
}

impl<D: GuardDriver + Clone> Clone for ScopedPool<D> {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
            audit: self.audit.clone(),
            counters: self.counters.clone(),
        }
    }
}

impl<D: GuardDriver> ScopedPool<D> {
    pub fn new(driver: D, audit: AuditHook) -> Self {
        Self {
            driver,
            audit,
            counters: Arc::new(GuardCounters::default()),
        }
    }

    pub fn stats(&self) -> GuardStats {
        GuardStats {
            started: self.counters.started.load(Ordering::Relaxed),
            committed: self.counters.committed.load(Ordering::Relaxed),
            rolled_back: self.counters.rolled_back.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            open: self.counters.open.load(Ordering::SeqCst),
            high_water: self.counters.high_water.load(Ordering::SeqCst),
        }
    }

    /// Run `op` inside a transaction bound to `ctx`'s tenant.
    ///
    /// The binding statement is issued before anything else; if it fails
    /// the transaction is aborted and a retryable bind failure surfaces.
    /// Caller statements are screened individually by the statement guard.
    /// Commit on success, rollback on error or cancellation; the connection
    /// returns to the pool either way.
    pub async fn with_tenant<T, F>(&self, ctx: &TenantContext, op: F) -> Result<T>
    where
        F: for<'t> FnOnce(&'t mut ScopedTx<D::Tx>) -> BoxFuture<'t, Result<T>> + Send,
        T: Send,
    {
        let started = Instant::now();

        let mut tx = match self.driver.begin().await {
            Ok(tx) => tx,
            Err(err) => {
                self.audit.emit(
                    ctx.redacted(),
                    AuditOutcome::PoolExhausted,
                    Some(err.to_string()),
                    started.elapsed(),
                );
                return Err(GuardError::Pool(err));
            }
        };
        let _open = OpenGuard::enter(&self.counters);

        // Tenant binding is the first statement of every transaction.
        let bind_params = [SqlParam::Text(ctx.tenant().as_str().to_string())];
        if let Err(err) = tx.execute(TENANT_BIND_STATEMENT, &bind_params).await {
            let _ = tx.rollback().await;
            let err = PoolError::BindFailure(err.to_string());
            self.audit.emit(
                ctx.redacted(),
                AuditOutcome::BindFailed,
                Some(err.to_string()),
                started.elapsed(),
            );
            return Err(GuardError::Pool(err));
        }

        let mut scoped = ScopedTx::new(tx);
        let op_result = op(&mut scoped).await;
        let (tx, rejection) = scoped.into_parts();

        // A rejection inside the operation aborts the transaction even if
        // the closure swallowed the error and returned Ok.
        let op_result = match rejection {
            Some(risk) => op_result.and_then(|_| Err(GuardError::StatementRejected(risk))),
            None => op_result,
        };

        let result = match op_result {
            Ok(value) => match tx.commit().await {
                Ok(()) => {
                    self.counters.committed.fetch_add(1, Ordering::Relaxed);
                    self.audit.emit(
                        ctx.redacted(),
                        AuditOutcome::Committed,
                        None,
                        started.elapsed(),
                    );
                    Ok(value)
                }
                Err(err) => {
                    self.counters.rolled_back.fetch_add(1, Ordering::Relaxed);
                    let err = GuardError::Pool(PoolError::Connection(format!(
                        "commit failed: {err}"
                    )));
                    self.audit.emit(
                        ctx.redacted(),
                        AuditOutcome::RolledBack,
                        Some(err.to_string()),
                        started.elapsed(),
                    );
                    Err(err)
                }
            },
            Err(err) => {
                let _ = tx.rollback().await;
                match &err {
                    GuardError::StatementRejected(risk) => {
                        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            tenant = %ctx.redacted(),
                            risk = %risk,
                            "statement rejected before transmission"
                        );
                        self.audit.emit(
                            ctx.redacted(),
                            AuditOutcome::StatementRejected,
                            Some(risk.to_string()),
                            started.elapsed(),
                        );
                    }
                    _ => {
                        self.counters.rolled_back.fetch_add(1, Ordering::Relaxed);
                        self.audit.emit(
                            ctx.redacted(),
                            AuditOutcome::RolledBack,
                            Some(err.to_string()),
                            started.elapsed(),
                        );
                    }
                }
                Err(err)
            }
        };

        let elapsed = started.elapsed();
        if elapsed > SLOW_TRANSACTION {
            warn!(
                tenant = %ctx.redacted(),
                duration_ms = elapsed.as_millis() as u64,
                "slow guarded transaction"
            );
        }

        result
    }
}
