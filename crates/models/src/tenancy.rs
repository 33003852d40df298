use serde::{Deserialize, Serialize};
use std::fmt;

/// Validation strictness for tenant identifiers.
///
/// `Permissive` accepts any non-empty, non-sentinel identifier unchanged.
/// `Strict` additionally requires the identifier to match a conservative
/// slug format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    #[default]
    Permissive,
    Strict,
}

impl From<String> for Strictness {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "strict" => Self::Strict,
            _ => Self::Permissive,
        }
    }
}

/// Masked tenant identifier, safe for logs and audit events.
///
/// Keeps at most the first two characters of the raw identifier; everything
/// else is replaced with a mask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RedactedTenant(String);

impl RedactedTenant {
    pub fn from_raw(raw: &str) -> Self {
        if raw.chars().count() > 4 {
            let prefix: String = raw.chars().take(2).collect();
            Self(format!("{}***", prefix))
        } else {
            Self("***".to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RedactedTenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
