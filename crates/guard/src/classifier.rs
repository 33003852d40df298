//! Pre-execution classifier for caller-supplied SQL templates.
//!
//! The classifier screens for multi-statement smuggling: a submission that
//! carries a second statement behind a separator would otherwise ride the
//! tenant binding of the first. The check is deliberately quote-blind: a
//! separator inside a string literal is rejected even though it might be
//! harmless, because a heuristic that tries to honor quoting can be tricked
//! by quoting. Bound parameters never pass through here; only the template
//! is classified.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator that delimits statements in a single submission.
const STATEMENT_SEPARATOR: char = ';';

/// Why a statement template was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum InjectionRisk {
    #[error("statement is empty")]
    EmptyStatement,

    #[error("statement separator at byte {position} is not a trailing terminator")]
    MultiStatement { position: usize },
}

/// Outcome of classifying one unit of SQL text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementVerdict {
    Allow,
    Reject(InjectionRisk),
}

impl StatementVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, StatementVerdict::Allow)
    }
}

/// Classify a statement template.
///
/// A template is allowed when it contains no separator at all, or exactly
/// one separator as a trailing terminator (optionally followed by
/// whitespace). Anything else is rejected. The classifier has no dependency
/// on tenant state and must run before the template is ever transmitted.
pub fn classify(statement: &str) -> StatementVerdict {
    if statement.trim().is_empty() {
        return StatementVerdict::Reject(InjectionRisk::EmptyStatement);
    }

    let body = statement.trim_end();
    let body = body
        .strip_suffix(STATEMENT_SEPARATOR)
        .unwrap_or(body);

    // A lone terminator leaves nothing to execute.
    if body.trim().is_empty() {
        return StatementVerdict::Reject(InjectionRisk::EmptyStatement);
    }

    match body.find(STATEMENT_SEPARATOR) {
        Some(position) => StatementVerdict::Reject(InjectionRisk::MultiStatement { position }),
        None => StatementVerdict::Allow,
    }
}

/// Classify a template, surfacing a rejection as an error.
pub fn ensure_allowed(statement: &str) -> Result<(), InjectionRisk> {
    match classify(statement) {
        StatementVerdict::Allow => Ok(()),
        StatementVerdict::Reject(risk) => Err(risk),
    }
}
