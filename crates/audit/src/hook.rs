use crate::record::{AuditOutcome, AuditRecord};
use crate::sink::{AuditSink, TracingSink};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tenancy_models::RedactedTenant;

/// Fire-and-forget emission point shared by the validator and the
/// transaction guard. Cloning is cheap; all clones feed the same sink.
#[derive(Clone)]
pub struct AuditHook {
    sink: Arc<dyn AuditSink>,
}

impl AuditHook {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Hook emitting structured tracing events.
    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingSink))
    }

    pub fn record(&self, record: AuditRecord) {
        self.sink.record(record);
    }

    pub fn emit(
        &self,
        tenant: RedactedTenant,
        outcome: AuditOutcome,
        reason: Option<String>,
        latency: Duration,
    ) {
        let mut builder = AuditRecord::builder(tenant, outcome).latency(latency);
        if let Some(reason) = reason {
            builder = builder.reason(reason);
        }
        self.sink.record(builder.build());
    }

    pub fn dropped_events(&self) -> u64 {
        self.sink.dropped_events()
    }
}

impl Default for AuditHook {
    fn default() -> Self {
        Self::tracing()
    }
}

impl fmt::Debug for AuditHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditHook")
            .field("dropped_events", &self.sink.dropped_events())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    #[test]
    fn test_emit_builds_and_forwards_record() {
        let sink = Arc::new(MemorySink::new());
        let hook = AuditHook::new(sink.clone());

        hook.emit(
            RedactedTenant::from_raw("tenant-b"),
            AuditOutcome::BindFailed,
            Some("connection reset".to_string()),
            Duration::from_millis(12),
        );

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, AuditOutcome::BindFailed);
        assert_eq!(records[0].reason.as_deref(), Some("connection reset"));
    }
}
