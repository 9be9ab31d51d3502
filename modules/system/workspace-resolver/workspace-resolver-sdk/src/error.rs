//! Error types for the workspace resolver module.

use bootstrap_resolver_sdk::BootstrapResolverError;
use thiserror::Error;

/// Failure reported by a [`crate::SessionProvider`].
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The identity provider could not be reached.
    #[error("session provider unavailable: {0}")]
    Unavailable(String),

    /// The session credential carried by the request is malformed.
    #[error("invalid session: {0}")]
    Invalid(String),
}

/// Why a request has no usable authorization context.
#[derive(Debug, Clone, Error)]
pub enum AuthorizationError {
    /// No session: the caller is not signed in.
    #[error("not signed in")]
    Unauthenticated,

    /// The session could not be looked up.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Signed in, but no credential or account could be bootstrapped.
    #[error("no usable credential: {0}")]
    Bootstrap(#[from] BootstrapResolverError),
}
