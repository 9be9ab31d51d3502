//! Auth context builder.
//!
//! The actor is always bootstrapped first (with its delegate list); a
//! requested subject is only bootstrapped when it is one of the actor's
//! active delegates. Delegation failures fall back to the actor unless
//! `strict_delegation` is set and the downstream rejected the delegation.

use std::sync::Arc;

use bootstrap_resolver_sdk::{
    Bootstrap, BootstrapRequest, BootstrapResolverClient, BootstrapResolverError,
};
use gatekit_http::TraceId;
use workspace_resolver_sdk::{
    AuthorizationContext, AuthorizationError, RequestMeta, ResolvedWorkspace, Session,
    SessionProvider, SubjectSelector,
};

use crate::config::WorkspaceResolverConfig;


pub struct Service {
    bootstrap: Arc<dyn BootstrapResolverClient>,
    sessions: Arc<dyn SessionProvider>,
    subjects: Arc<dyn SubjectSelector>,
    strict_delegation: bool,
}

impl Service {
    #[must_use]
    pub fn new(
        bootstrap: Arc<dyn BootstrapResolverClient>,
        sessions: Arc<dyn SessionProvider>,
        subjects: Arc<dyn SubjectSelector>,
        config: &WorkspaceResolverConfig,
    ) -> Self {
        Self {
            bootstrap,
            sessions,
            subjects,
            strict_delegation: config.strict_delegation,
        }
    }

    /// Resolve the authorization context of `request`. Never fails; every
    /// failure is folded into the returned context.
    #[tracing::instrument(skip_all, fields(trace_id = %request.trace_id))]
    pub async fn resolve(&self, request: &RequestMeta) -> AuthorizationContext {
        let session = match self.sessions.session(request).await {
            Ok(Some(session)) => session,
            Ok(None) => return AuthorizationContext::Anonymous,
            Err(err) => {
                tracing::warn!(error = %err, "session lookup failed");
                return AuthorizationContext::Unavailable(err.into());
            }
        };

        let actor_request = BootstrapRequest::actor()
            .with_delegates()
            .with_trace_id(request.trace_id.clone());
        let actor = match self
            .bootstrap
            .get_bootstrap(&session.token, &actor_request)
            .await
        {
            Ok(actor) => actor,
            Err(err) => return AuthorizationContext::Unavailable(err.into()),
        };

        let Some(requested) = self.subjects.requested_subject(request) else {
            return AuthorizationContext::resolved(ResolvedWorkspace::for_actor(actor));
        };

        match self
            .delegate(&session, &actor, &requested, &request.trace_id)
            .await
        {
            Ok(Some(subject)) => {
                AuthorizationContext::resolved(ResolvedWorkspace::acting_as(actor, subject))
            }
            Ok(None) => AuthorizationContext::resolved(ResolvedWorkspace::for_actor(actor)),
            Err(err) => AuthorizationContext::Unavailable(AuthorizationError::Bootstrap(err)),
        }
    }

    /// Bootstrap `requested` when the actor may act on it.
    ///
    /// `Ok(None)` means "act as the actor". Errors are only returned in
    /// strict mode for a downstream rejection of the delegation.
    async fn delegate(
        &self,
        session: &Session,
        actor: &Bootstrap,
        requested: &str,
        trace_id: &TraceId,
    ) -> Result<Option<Bootstrap>, BootstrapResolverError> {
        let requested = requested.trim();
        let actor_id = actor.entry.subject_account_id.as_str();
        if requested.is_empty() || requested == actor_id {
            return Ok(None);
        }

        if !actor.entry.active_customer_ids().any(|id| id == requested) {
            tracing::debug!(
                actor = actor_id,
                subject = requested,
                "requested subject is not an active delegate; acting as actor"
            );
            return Ok(None);
        }

        let subject_request =
            BootstrapRequest::for_subject(requested).with_trace_id(trace_id.clone());
        match self
            .bootstrap
            .get_bootstrap(&session.token, &subject_request)
            .await
        {
            Ok(subject) => Ok(Some(subject)),
            Err(err) if self.strict_delegation && err.is_auth_rejection() => {
                tracing::warn!(
                    actor = actor_id,
                    subject = requested,
                    error = %err,
                    "delegation rejected by downstream"
                );
                Err(err)
            }
            Err(err) => {
                tracing::warn!(
                    actor = actor_id,
                    subject = requested,
                    error = %err,
                    "delegated bootstrap failed; acting as actor"
                );
                Ok(None)
            }
        }
    }
}
