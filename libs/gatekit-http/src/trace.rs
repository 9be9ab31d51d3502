use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest inbound trace id accepted verbatim.
const MAX_TRACE_ID_LEN: usize = 128;

/// Correlation id attached to every outbound call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(String);

impl TraceId {
    /// Fresh random id (32 lowercase hex characters).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Accept an id propagated by a caller, e.g. from an inbound header.
    ///
    /// Returns `None` for empty, oversized or non-printable values so they
    /// never end up in outbound headers or logs.
    #[must_use]
    pub fn from_inbound(value: &str) -> Option<Self> {
        let value = value.trim();
        let acceptable = !value.is_empty()
            && value.len() <= MAX_TRACE_ID_LEN
            && value.bytes().all(|b| b.is_ascii_graphic());
        acceptable.then(|| Self(value.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_hex() {
        let a = TraceId::generate();
        let b = TraceId::generate();

        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn inbound_ids_are_sanitized() {
        assert_eq!(
            TraceId::from_inbound("  req-123  ").map(|t| t.to_string()),
            Some("req-123".to_owned())
        );
        assert!(TraceId::from_inbound("").is_none());
        assert!(TraceId::from_inbound("has space").is_none());
        assert!(TraceId::from_inbound(&"x".repeat(MAX_TRACE_ID_LEN + 1)).is_none());
    }
}
