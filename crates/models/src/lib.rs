// Shared types for the tenancy guard crates

pub mod param;
pub mod tenancy;

pub use param::SqlParam;
pub use tenancy::{RedactedTenant, Strictness};
