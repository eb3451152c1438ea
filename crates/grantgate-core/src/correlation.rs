//! Correlation identifiers propagated to every upstream call.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Header carrying the correlation id on upstream requests.
pub const CORRELATION_HEADER: &str = "Request-ID";

/// Request identifier forwarded unchanged to the upstream authority.
///
/// A missing identifier never blocks a call; the all-zero UUID is substituted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            Self::nil()
        } else {
            Self(value)
        }
    }

    /// Fresh random identifier for calls that did not arrive with one.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// All-zero fallback identifier
    pub fn nil() -> Self {
        Self(Uuid::nil().to_string())
    }

    /// Take the identifier from an inbound header value, falling back to nil.
    pub fn from_header(value: Option<&str>) -> Self {
        value.map(Self::new).unwrap_or_else(Self::nil)
    }

    pub fn is_nil(&self) -> bool {
        self.0 == Uuid::nil().to_string()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_identifier_falls_back_to_zero_uuid() {
        let id = CorrelationId::from_header(None);
        assert_eq!(id.as_str(), "00000000-0000-0000-0000-000000000000");
        assert!(id.is_nil());
        assert!(CorrelationId::from_header(Some("   ")).is_nil());
        assert!(CorrelationId::default().is_nil());
    }

    #[test]
    fn supplied_identifier_is_kept_verbatim() {
        let id = CorrelationId::from_header(Some("req-42"));
        assert_eq!(id.as_str(), "req-42");
        assert!(!CorrelationId::generate().is_nil());
    }
}
