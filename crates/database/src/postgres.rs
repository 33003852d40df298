//! Postgres driver and the production guard facade.

use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use tenancy_audit::AuditHook;
use tenancy_models::SqlParam;
use tenancy_tenant::TenantContext;

use crate::config::DatabaseConfig;
use crate::connection::{DriverError, GuardDriver, GuardTransaction};
use crate::error::{GuardError, PoolError, Result};
use crate::rls;
use crate::scoped::{GuardStats, ScopedPool, ScopedTx};

/// Driver over a bounded sqlx Postgres pool.
///
/// Crate-private so the raw pool can never leak past the guard.
#[derive(Clone)]
pub(crate) struct PgDriver {
    pool: PgPool,
    acquire_timeout: Duration,
}

#[async_trait]
impl GuardDriver for PgDriver {
    type Tx = PgGuardTransaction;

    async fn begin(&self) -> std::result::Result<PgGuardTransaction, PoolError> {
        let tx = self.pool.begin().await.map_err(|e| match e {
            sqlx::Error::PoolTimedOut => PoolError::AcquireTimeout(self.acquire_timeout),
            sqlx::Error::PoolClosed => PoolError::Exhausted("pool is closed".to_string()),
            other => PoolError::Connection(other.to_string()),
        })?;
        Ok(PgGuardTransaction { tx })
    }
}

/// One open Postgres transaction. Dropping it without commit rolls back,
/// which is what makes cancellation safe on this driver.
pub struct PgGuardTransaction {
    tx: Transaction<'static, Postgres>,
}

fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [SqlParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlParam::Text(v) => query.bind(v.as_str()),
            SqlParam::I32(v) => query.bind(*v),
            SqlParam::I64(v) => query.bind(*v),
            SqlParam::F64(v) => query.bind(*v),
            SqlParam::Bool(v) => query.bind(*v),
            SqlParam::Uuid(v) => query.bind(*v),
            SqlParam::Timestamp(v) => query.bind(*v),
            SqlParam::Json(v) => query.bind(v.clone()),
            SqlParam::Null => query.bind(Option::<String>::None),
        };
    }
    query
}

#[async_trait]
impl GuardTransaction for PgGuardTransaction {
    type Row = PgRow;

    async fn execute(
        &mut self,
        statement: &str,
        params: &[SqlParam],
    ) -> std::result::Result<u64, DriverError> {
        let done = bind_params(sqlx::query(statement), params)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DriverError(e.to_string()))?;
        Ok(done.rows_affected())
    }

    async fn fetch_all(
        &mut self,
        statement: &str,
        params: &[SqlParam],
    ) -> std::result::Result<Vec<PgRow>, DriverError> {
        bind_params(sqlx::query(statement), params)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| DriverError(e.to_string()))
    }

    async fn commit(self) -> std::result::Result<(), DriverError> {
        self.tx.commit().await.map_err(|e| DriverError(e.to_string()))
    }

    async fn rollback(self) -> std::result::Result<(), DriverError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DriverError(e.to_string()))
    }
}

/// Production guard over a shared Postgres pool.
///
/// The pool is a private field and no method hands out a connection, so
/// code that skips the tenant binding is not expressible outside this
/// crate.
#[derive(Clone)]
pub struct ScopedDatabase {
    guard: ScopedPool<PgDriver>,
    pool: PgPool,
}

impl ScopedDatabase {
    pub async fn connect(config: DatabaseConfig, audit: AuditHook) -> Result<Self> {
        let options: PgConnectOptions = config.url.parse().map_err(|e| {
            GuardError::Pool(PoolError::Connection(format!("invalid database URL: {e}")))
        })?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .connect_with(options)
            .await
            .map_err(|e| GuardError::Pool(PoolError::Connection(e.to_string())))?;

        tracing::info!(
            max_connections = config.max_connections,
            acquire_timeout_secs = config.acquire_timeout.as_secs(),
            "database pool established"
        );

        let driver = PgDriver {
            pool: pool.clone(),
            acquire_timeout: config.acquire_timeout,
        };

        Ok(Self {
            guard: ScopedPool::new(driver, audit),
            pool,
        })
    }

    /// Run `op` inside a transaction bound to `ctx`'s tenant. See
    /// [`ScopedPool::with_tenant`] for the protocol.
    pub async fn with_tenant<T, F>(&self, ctx: &TenantContext, op: F) -> Result<T>
    where
        F: for<'t> FnOnce(&'t mut ScopedTx<PgGuardTransaction>) -> BoxFuture<'t, Result<T>> + Send,
        T: Send,
    {
        self.guard.with_tenant(ctx, op).await
    }

    /// Startup self-check: fail fast if the live database's row security
    /// policies do not reference [`rls::SESSION_TENANT_KEY`].
    pub async fn verify_rls_wiring(&self) -> Result<()> {
        rls::verify_rls_wiring(&self.pool).await
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| GuardError::Pool(PoolError::Connection(e.to_string())))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn stats(&self) -> GuardStats {
        self.guard.stats()
    }
}
