//! Coordination with the database's row security policies.
//!
//! The policies are administered independently of this code; the contract
//! between the two sides is a single session-variable key. The startup
//! self-check turns silent drift between guard and policies into an
//! immediate, loud failure.

use sqlx::PgPool;
use tracing::info;

use crate::error::{GuardError, PoolError, Result};

/// Session-variable key consulted by the database's row security policies.
pub const SESSION_TENANT_KEY: &str = "app.current_tenant";

/// Transaction-scoped binding statement, issued as the first statement of
/// every guarded transaction. `set_config(..., true)` scopes the value to
/// the current transaction, so the binding dies with it.
pub const TENANT_BIND_STATEMENT: &str = "SELECT set_config('app.current_tenant', $1, true)";

const PROBE_VALUE: &str = "__rls_wiring_probe__";

/// Fail fast if the live database's policies and this guard disagree about
/// the session-variable key.
///
/// Two checks: the key round-trips through `set_config`/`current_setting`
/// inside a throwaway transaction, and at least one row security policy on
/// the database references the key.
pub(crate) async fn verify_rls_wiring(pool: &PgPool) -> Result<()> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| GuardError::Pool(PoolError::Connection(e.to_string())))?;

    sqlx::query(TENANT_BIND_STATEMENT)
        .bind(PROBE_VALUE)
        .execute(&mut *tx)
        .await
        .map_err(|e| GuardError::Pool(PoolError::BindFailure(e.to_string())))?;

    let (echoed,): (Option<String>,) = sqlx::query_as("SELECT current_setting($1, true)")
        .bind(SESSION_TENANT_KEY)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| GuardError::Pool(PoolError::Connection(e.to_string())))?;

    tx.rollback()
        .await
        .map_err(|e| GuardError::Pool(PoolError::Connection(e.to_string())))?;

    if echoed.as_deref() != Some(PROBE_VALUE) {
        return Err(GuardError::IsolationViolation(format!(
            "session variable '{SESSION_TENANT_KEY}' did not round-trip"
        )));
    }

    let (references,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM pg_policies WHERE qual LIKE $1 OR with_check LIKE $1")
            .bind(format!("%{SESSION_TENANT_KEY}%"))
            .fetch_one(pool)
            .await
            .map_err(|e| GuardError::Pool(PoolError::Connection(e.to_string())))?;

    if references == 0 {
        return Err(GuardError::IsolationViolation(format!(
            "no row security policy references '{SESSION_TENANT_KEY}'; guard and policies have drifted"
        )));
    }

    info!(
        policies = references,
        key = SESSION_TENANT_KEY,
        "row security wiring verified"
    );
    Ok(())
}
