// Audit hook: structured emission of guard outcomes to an external sink

pub mod hook;
pub mod record;
pub mod sink;

pub use hook::AuditHook;
pub use record::{AuditOutcome, AuditRecord, AuditRecordBuilder, Severity};
pub use sink::{AuditSink, ChannelSink, MemorySink, TracingSink};
