// Statement guard: pre-execution screening of SQL templates

pub mod classifier;

pub use classifier::{classify, ensure_allowed, InjectionRisk, StatementVerdict};
