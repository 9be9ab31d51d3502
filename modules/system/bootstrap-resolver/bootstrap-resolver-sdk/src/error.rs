//! Error types for the bootstrap resolver module.

use gatekit_http::DispatchError;
use thiserror::Error;

/// Errors that can occur when resolving a bootstrap.
///
/// `Clone` because one failure is delivered to every caller that joined the
/// same in-flight lookup.
#[derive(Debug, Clone, Error)]
pub enum BootstrapResolverError {
    /// A downstream call failed (transport, API or schema error).
    #[error(transparent)]
    Downstream(#[from] DispatchError),

    /// The downstream answered with a payload that breaks an invariant.
    #[error("invalid bootstrap response: {0}")]
    InvalidResponse(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BootstrapResolverError {
    /// The downstream rejected the session itself (401) or refused the
    /// requested subject (403).
    #[must_use]
    pub const fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::Downstream(err) if err.is_unauthorized() || err.is_forbidden())
    }

    /// The downstream could not be reached or timed out.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Downstream(err) if err.is_transport())
    }

    /// Downstream status (or status marker) when the failure came from a
    /// downstream call.
    #[must_use]
    pub const fn downstream_status(&self) -> Option<u16> {
        match self {
            Self::Downstream(err) => Some(err.status()),
            Self::InvalidResponse(_) | Self::Internal(_) => None,
        }
    }
}
