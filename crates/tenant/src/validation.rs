//! Tenant identifier validation.
//!
//! Validation is pure with respect to the database: it never opens a
//! connection. Its only side effect is an audit event with the outcome.

use crate::context::{TenantContext, TenantId};
use lazy_static::lazy_static;
use regex::Regex;
use std::time::Instant;
use tenancy_audit::{AuditHook, AuditOutcome};
use tenancy_models::{RedactedTenant, Strictness};
use thiserror::Error;

/// Identifier values that look like a missing id serialized by a confused
/// caller. All case variants are rejected.
const NULL_LIKE_SENTINELS: &[&str] = &["null", "none", "nil", "undefined"];

lazy_static! {
    static ref STRICT_ID_FORMAT: Regex =
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]{0,63}$").expect("strict id format regex");
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Caller bug: the raw identifier is unusable. Never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("tenant identifier is empty")]
    Empty,

    #[error("tenant identifier '{0}' is a null-like sentinel")]
    NullLike(String),

    #[error("tenant identifier does not match the strict format")]
    Malformed,
}

/// Validates raw tenant identifiers into [`TenantContext`] values.
#[derive(Debug, Clone)]
pub struct TenantValidator {
    strictness: Strictness,
    audit: AuditHook,
}

impl TenantValidator {
    pub fn new(strictness: Strictness) -> Self {
        Self {
            strictness,
            audit: AuditHook::tracing(),
        }
    }

    pub fn with_audit(mut self, audit: AuditHook) -> Self {
        self.audit = audit;
        self
    }

    /// Read the strictness level from `TENANT_ID_STRICTNESS`
    /// (`strict` | `permissive`, defaulting to permissive).
    pub fn from_env() -> Self {
        let strictness = std::env::var("TENANT_ID_STRICTNESS")
            .map(Strictness::from)
            .unwrap_or_default();
        Self::new(strictness)
    }

    pub fn strictness(&self) -> Strictness {
        self.strictness
    }

    /// Validate a raw identifier from an already-authenticated source.
    ///
    /// On success the identifier round-trips unchanged into the returned
    /// context. Rejects empty or whitespace-only values and the null-like
    /// sentinel deny-list regardless of case; under
    /// [`Strictness::Strict`] the identifier must additionally match the
    /// slug format.
    pub fn validate(&self, raw: &str) -> Result<TenantContext> {
        let started = Instant::now();
        let result = self.check(raw);

        match &result {
            Ok(_) => self.audit.emit(
                RedactedTenant::from_raw(raw),
                AuditOutcome::Validated,
                None,
                started.elapsed(),
            ),
            Err(err) => {
                tracing::warn!(
                    tenant = %RedactedTenant::from_raw(raw),
                    error = %err,
                    "tenant identifier rejected"
                );
                self.audit.emit(
                    RedactedTenant::from_raw(raw),
                    AuditOutcome::ValidationRejected,
                    Some(err.to_string()),
                    started.elapsed(),
                );
            }
        }

        result
    }

    fn check(&self, raw: &str) -> Result<TenantContext> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty);
        }

        let lowered = trimmed.to_lowercase();
        if NULL_LIKE_SENTINELS.contains(&lowered.as_str()) {
            return Err(ValidationError::NullLike(trimmed.to_string()));
        }

        if self.strictness == Strictness::Strict && !STRICT_ID_FORMAT.is_match(trimmed) {
            return Err(ValidationError::Malformed);
        }

        Ok(TenantContext::new(TenantId::from_validated(raw.to_string())))
    }
}

impl Default for TenantValidator {
    fn default() -> Self {
        Self::new(Strictness::Permissive)
    }
}
