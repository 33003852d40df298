use crate::record::{AuditRecord, Severity};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Destination for audit records.
///
/// `record` must never block and must never fail the guarded operation;
/// an implementation that cannot deliver an event swallows it and counts
/// the drop.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);

    /// Number of events this sink has had to drop.
    fn dropped_events(&self) -> u64 {
        0
    }
}

/// Default sink: structured tracing events.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, record: AuditRecord) {
        let reason = record.reason.as_deref().unwrap_or("");
        match record.outcome.severity() {
            Severity::Info => tracing::info!(
                target: "tenancy_audit",
                tenant = %record.tenant,
                outcome = ?record.outcome,
                latency_ms = record.latency_ms,
                "guard event"
            ),
            Severity::Warn => tracing::warn!(
                target: "tenancy_audit",
                tenant = %record.tenant,
                outcome = ?record.outcome,
                latency_ms = record.latency_ms,
                reason,
                "guard rejection"
            ),
            Severity::Error => tracing::error!(
                target: "tenancy_audit",
                tenant = %record.tenant,
                outcome = ?record.outcome,
                latency_ms = record.latency_ms,
                reason,
                "guard infrastructure failure"
            ),
        }
    }
}

/// Sink backed by a bounded channel to an external forwarder.
///
/// When the forwarder falls behind and the channel fills, events are
/// dropped and counted rather than applying backpressure to the guard.
pub struct ChannelSink {
    tx: mpsc::Sender<AuditRecord>,
    dropped: AtomicU64,
}

impl ChannelSink {
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<AuditRecord>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }
}

impl AuditSink for ChannelSink {
    fn record(&self, record: AuditRecord) {
        if self.tx.try_send(record).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// In-memory sink for tests and diagnostics.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => Vec::new(),
        }
    }
}

impl AuditSink for MemorySink {
    fn record(&self, record: AuditRecord) {
        if let Ok(mut guard) = self.records.lock() {
            guard.push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AuditOutcome;
    use std::time::Duration;
    use tenancy_models::RedactedTenant;

    fn sample(outcome: AuditOutcome) -> AuditRecord {
        AuditRecord::builder(RedactedTenant::from_raw("tenant-a"), outcome)
            .latency(Duration::from_millis(1))
            .build()
    }

    #[test]
    fn test_memory_sink_collects_records() {
        let sink = MemorySink::new();
        sink.record(sample(AuditOutcome::Committed));
        sink.record(sample(AuditOutcome::RolledBack));

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].outcome, AuditOutcome::Committed);
    }

    #[tokio::test]
    async fn test_channel_sink_drops_when_full_without_blocking() {
        let (sink, mut rx) = ChannelSink::bounded(1);

        sink.record(sample(AuditOutcome::Committed));
        sink.record(sample(AuditOutcome::Committed));
        sink.record(sample(AuditOutcome::Committed));

        assert_eq!(sink.dropped_events(), 2);
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }
}
