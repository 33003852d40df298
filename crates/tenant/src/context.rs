use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tenancy_models::RedactedTenant;

/// A validated tenant identifier.
///
/// There is no public constructor: the only way to obtain a `TenantId` is
/// through [`TenantValidator::validate`](crate::TenantValidator::validate),
/// which makes handing an unvalidated string to the transaction guard a
/// compile error rather than a runtime hazard. The type serializes but
/// deliberately does not deserialize.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Crate-private: callable only from the validator.
    pub(crate) fn from_validated(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Masked form for logs and audit events.
    pub fn redacted(&self) -> RedactedTenant {
        RedactedTenant::from_raw(&self.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantId({})", self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Immutable per-operation tenant context.
///
/// Created once per inbound operation from an externally authenticated
/// identity, bound to exactly one transaction by the guard, and discarded
/// with the operation. Never persisted.
#[derive(Debug, Clone)]
pub struct TenantContext {
    tenant: TenantId,
    established_at: DateTime<Utc>,
}

impl TenantContext {
    pub(crate) fn new(tenant: TenantId) -> Self {
        Self {
            tenant,
            established_at: Utc::now(),
        }
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn redacted(&self) -> RedactedTenant {
        self.tenant.redacted()
    }

    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }
}
