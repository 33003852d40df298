use std::time::Duration;
use tenancy_guard::InjectionRisk;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GuardError>;

/// Transient infrastructure failure. Safe for the caller to retry with
/// backoff.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("connection pool exhausted: {0}")]
    Exhausted(String),

    #[error("timed out acquiring a connection after {0:?}")]
    AcquireTimeout(Duration),

    /// The mandated tenant binding statement itself failed. The transaction
    /// is aborted; execution never continues unscoped.
    #[error("tenant binding statement failed: {0}")]
    BindFailure(String),

    #[error("connection failed: {0}")]
    Connection(String),
}

#[derive(Debug, Error)]
pub enum GuardError {
    /// Fail-closed refusal: the operation would have run without a valid
    /// tenant binding. The typed API makes this unreachable for ordinary
    /// callers; it remains for defense-in-depth checks inside the guard.
    #[error("tenant isolation violated: {0}")]
    IsolationViolation(String),

    /// The statement guard refused a caller statement before transmission.
    /// A caller bug or an attack; never retried.
    #[error("statement rejected: {0}")]
    StatementRejected(#[from] InjectionRisk),

    /// Transient pool, binding, or connection failure. Retryable.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// A caller statement failed inside the transaction. The transaction
    /// was rolled back.
    #[error("database error: {0}")]
    Database(String),
}

impl GuardError {
    /// Whether the caller may retry the whole operation with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GuardError::Pool(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pool_errors_are_retryable() {
        assert!(GuardError::Pool(PoolError::AcquireTimeout(Duration::from_secs(5))).is_retryable());
        assert!(GuardError::Pool(PoolError::BindFailure("reset".into())).is_retryable());
        assert!(!GuardError::IsolationViolation("bad".into()).is_retryable());
        assert!(!GuardError::StatementRejected(InjectionRisk::EmptyStatement).is_retryable());
        assert!(!GuardError::Database("syntax error".into()).is_retryable());
    }

    #[test]
    fn test_bind_failure_is_a_pool_error() {
        let err: GuardError = PoolError::BindFailure("connection reset".into()).into();
        assert!(matches!(err, GuardError::Pool(PoolError::BindFailure(_))));
    }
}
