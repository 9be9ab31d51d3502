//! Public API traits for the workspace resolver.

use async_trait::async_trait;

use crate::error::SessionError;
use crate::models::{AuthorizationContext, RequestMeta, Session};

/// Resolves the unified authorization context of one inbound request.
#[async_trait]
pub trait WorkspaceResolverClient: Send + Sync {
    /// Never fails: a missing session yields
    /// [`AuthorizationContext::Anonymous`], and a session that cannot be
    /// bootstrapped yields [`AuthorizationContext::Unavailable`].
    async fn resolve(&self, request: &RequestMeta) -> AuthorizationContext;
}

/// The external identity provider's view of the current session.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Session carried by `request`, `None` when not signed in.
    ///
    /// # Errors
    ///
    /// [`SessionError`] when the identity provider cannot answer.
    async fn session(&self, request: &RequestMeta) -> Result<Option<Session>, SessionError>;
}

/// Reads the requested "act as" subject account from a request.
pub trait SubjectSelector: Send + Sync {
    fn requested_subject(&self, request: &RequestMeta) -> Option<String>;
}
