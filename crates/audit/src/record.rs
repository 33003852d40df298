use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tenancy_models::RedactedTenant;
use uuid::Uuid;

/// What a guard invocation ended in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Validated,
    ValidationRejected,
    Committed,
    RolledBack,
    StatementRejected,
    BindFailed,
    PoolExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl AuditOutcome {
    /// Rejections are attack or caller-bug signals; bind and pool failures
    /// are infrastructure noise. The two classes must stay distinguishable
    /// downstream.
    pub fn severity(&self) -> Severity {
        match self {
            AuditOutcome::Validated | AuditOutcome::Committed | AuditOutcome::RolledBack => {
                Severity::Info
            }
            AuditOutcome::ValidationRejected | AuditOutcome::StatementRejected => Severity::Warn,
            AuditOutcome::BindFailed | AuditOutcome::PoolExhausted => Severity::Error,
        }
    }
}

/// One guard invocation, as reported to the external sink.
///
/// Owns no reference back into live guard objects; the tenant identifier is
/// carried only in redacted form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub tenant: RedactedTenant,
    pub outcome: AuditOutcome,
    pub reason: Option<String>,
    pub latency_ms: u64,
    pub occurred_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn builder(tenant: RedactedTenant, outcome: AuditOutcome) -> AuditRecordBuilder {
        AuditRecordBuilder {
            tenant,
            outcome,
            reason: None,
            latency: Duration::ZERO,
        }
    }
}

pub struct AuditRecordBuilder {
    tenant: RedactedTenant,
    outcome: AuditOutcome,
    reason: Option<String>,
    latency: Duration,
}

impl AuditRecordBuilder {
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn build(self) -> AuditRecord {
        AuditRecord {
            id: Uuid::new_v4(),
            tenant: self.tenant,
            outcome: self.outcome,
            reason: self.reason,
            latency_ms: self.latency.as_millis() as u64,
            occurred_at: Utc::now(),
        }
    }
}
