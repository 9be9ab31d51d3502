//! Public API trait for the bootstrap resolver.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::BootstrapResolverError;
use crate::models::{Bootstrap, BootstrapRequest};

/// Exchanges an end-user session for a scoped API credential plus the
/// entitlement snapshot of the requested account.
///
/// ```ignore
/// let actor = resolver
///     .get_bootstrap(&session, &BootstrapRequest::actor().with_delegates())
///     .await?;
/// let customer = resolver
///     .get_bootstrap(&session, &BootstrapRequest::for_subject("acc_customer"))
///     .await?;
/// ```
///
/// Implementations read through a shared cache and collapse concurrent
/// lookups of the same `(session, subject)` pair into one downstream call.
#[async_trait]
pub trait BootstrapResolverClient: Send + Sync {
    /// Resolve the bootstrap for `session_token` acting on the requested
    /// subject (the actor itself when no subject is given).
    ///
    /// # Errors
    ///
    /// - `Downstream` when the token exchange or bootstrap call fails with a
    ///   transport, API (other than the handled 403) or schema error
    /// - `InvalidResponse` when the downstream returned an inconsistent
    ///   payload
    async fn get_bootstrap(
        &self,
        session_token: &SecretString,
        request: &BootstrapRequest,
    ) -> Result<Bootstrap, BootstrapResolverError>;

    /// Drop the cached entry for `(session_token, subject_account_id)`.
    ///
    /// Best-effort: store failures are logged, never returned.
    async fn invalidate(&self, session_token: &SecretString, subject_account_id: Option<&str>);
}
