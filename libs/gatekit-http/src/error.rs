//! Error taxonomy for downstream calls.

use thiserror::Error;

/// Status marker reported for calls aborted by their timeout budget.
pub const TIMEOUT_STATUS: u16 = 504;

/// Status marker reported when no response was received at all.
pub const UNREACHABLE_STATUS: u16 = 0;

/// Errors returned by [`crate::Dispatcher::dispatch`].
///
/// `Clone` so a single failure can be handed to every waiter of a shared
/// in-flight call.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// The call exceeded its timeout budget and was aborted.
    #[error("{method} {path} timed out after {timeout_ms} ms")]
    Timeout {
        method: String,
        path: String,
        timeout_ms: u64,
    },

    /// The call failed before any response arrived (DNS, connect, TLS, reset).
    #[error("{method} {path} failed before a response was received: {message}")]
    Transport {
        method: String,
        path: String,
        message: String,
    },

    /// The downstream answered with a non-2xx status.
    #[error("{message}")]
    Api {
        status: u16,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// A 2xx response whose body does not match the expected shape.
    #[error("{method} {path} returned a body that does not match the expected schema: {message}")]
    Schema {
        method: String,
        path: String,
        status: u16,
        message: String,
    },

    /// The request could not be built (bad base URL, bad header name).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl DispatchError {
    /// HTTP status or status marker for this error.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Timeout { .. } => TIMEOUT_STATUS,
            Self::Transport { .. } | Self::InvalidRequest(_) => UNREACHABLE_STATUS,
            Self::Api { status, .. } | Self::Schema { status, .. } => *status,
        }
    }

    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401, .. })
    }

    #[must_use]
    pub const fn is_forbidden(&self) -> bool {
        matches!(self, Self::Api { status: 403, .. })
    }

    /// Timeout or transport failure.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transport { .. })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn status_markers_distinguish_transport_failures() {
        let timeout = DispatchError::Timeout {
            method: "POST".to_owned(),
            path: "/auth/token".to_owned(),
            timeout_ms: 6_000,
        };
        let unreachable = DispatchError::Transport {
            method: "POST".to_owned(),
            path: "/auth/token".to_owned(),
            message: "connection refused".to_owned(),
        };

        assert_eq!(timeout.status(), TIMEOUT_STATUS);
        assert_eq!(unreachable.status(), UNREACHABLE_STATUS);
        assert!(timeout.is_transport());
        assert!(unreachable.is_transport());
    }

    #[test]
    fn api_error_predicates() {
        let unauthorized = DispatchError::Api {
            status: 401,
            message: "token expired".to_owned(),
            details: None,
        };
        let forbidden = DispatchError::Api {
            status: 403,
            message: "forbidden".to_owned(),
            details: None,
        };

        assert!(unauthorized.is_unauthorized());
        assert!(!unauthorized.is_forbidden());
        assert!(forbidden.is_forbidden());
        assert!(!forbidden.is_transport());
        assert_eq!(unauthorized.to_string(), "token expired");
    }
}
