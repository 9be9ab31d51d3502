//! Models for the workspace resolver API.

use std::sync::Arc;

use bootstrap_resolver_sdk::Bootstrap;
use gatekit_entitlements::{Account, CheckOutcome, HasCheck, InvalidCheck, PlanStatus};
use gatekit_http::{ApiCredential, TraceId};
use http::HeaderMap;
use secrecy::SecretString;
use serde::Serialize;

use crate::error::AuthorizationError;

/// End-user session as reported by the identity provider.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SecretString,
}

impl Session {
    #[must_use]
    pub fn new(token: impl Into<SecretString>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

/// What the resolver needs to know about an inbound request.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub headers: HeaderMap,
    /// Correlation id reused for every downstream call of the request.
    pub trace_id: TraceId,
}

impl RequestMeta {
    #[must_use]
    pub fn new(headers: HeaderMap, trace_id: TraceId) -> Self {
        Self { headers, trace_id }
    }
}

/// Whose plan status blocks mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingScope {
    Actor,
    Subject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingIssue {
    pub scope: BillingScope,
    pub status: PlanStatus,
}

/// Actor and subject of a signed-in request, with the billing gates
/// derived from both.
#[derive(Debug, Clone)]
pub struct ResolvedWorkspace {
    actor: Bootstrap,
    subject: Bootstrap,
    acting_as_customer: bool,
    actor_plan_active: bool,
    subject_plan_active: bool,
    billing_issue: Option<BillingIssue>,
}

impl ResolvedWorkspace {
    /// The actor governs its own request.
    #[must_use]
    pub fn for_actor(actor: Bootstrap) -> Self {
        Self::build(actor.clone(), actor, false)
    }

    /// The actor acts on behalf of a delegated customer account.
    #[must_use]
    pub fn acting_as(actor: Bootstrap, subject: Bootstrap) -> Self {
        Self::build(actor, subject, true)
    }

    fn build(actor: Bootstrap, subject: Bootstrap, acting_as_customer: bool) -> Self {
        let actor_status = actor.account().plan_status;
        let subject_status = subject.account().plan_status;
        let actor_plan_active = actor_status.is_active();
        let subject_plan_active = subject_status.is_active();

        let billing_issue = if !actor_plan_active {
            Some(BillingIssue {
                scope: BillingScope::Actor,
                status: actor_status,
            })
        } else if !subject_plan_active {
            Some(BillingIssue {
                scope: BillingScope::Subject,
                status: subject_status,
            })
        } else {
            None
        };

        Self {
            actor,
            subject,
            acting_as_customer,
            actor_plan_active,
            subject_plan_active,
            billing_issue,
        }
    }

    #[must_use]
    pub fn actor(&self) -> &Bootstrap {
        &self.actor
    }

    #[must_use]
    pub fn subject(&self) -> &Bootstrap {
        &self.subject
    }

    #[must_use]
    pub fn actor_account(&self) -> &Account {
        self.actor.account()
    }

    #[must_use]
    pub fn subject_account(&self) -> &Account {
        self.subject.account()
    }

    /// Credential for downstream calls on behalf of the subject.
    #[must_use]
    pub fn credential(&self) -> &Arc<ApiCredential> {
        &self.subject.credential
    }

    #[must_use]
    pub const fn acting_as_customer(&self) -> bool {
        self.acting_as_customer
    }

    #[must_use]
    pub const fn actor_plan_active(&self) -> bool {
        self.actor_plan_active
    }

    #[must_use]
    pub const fn subject_plan_active(&self) -> bool {
        self.subject_plan_active
    }

    /// Both actor and subject plans are active.
    #[must_use]
    pub const fn mutations_allowed(&self) -> bool {
        self.actor_plan_active && self.subject_plan_active
    }

    #[must_use]
    pub const fn billing_issue(&self) -> Option<BillingIssue> {
        self.billing_issue
    }

    /// Evaluate `requirement` against the subject account.
    ///
    /// # Errors
    ///
    /// [`InvalidCheck`] when the requirement itself is malformed.
    pub fn check(&self, requirement: &HasCheck) -> Result<CheckOutcome, InvalidCheck> {
        gatekit_entitlements::check(self.subject_account(), requirement)
    }

    /// # Panics
    ///
    /// Panics when `requirement` is malformed (see [`InvalidCheck`]).
    #[must_use]
    pub fn has(&self, requirement: &HasCheck) -> bool {
        gatekit_entitlements::has(self.subject_account(), requirement)
    }
}

/// Authorization state of one inbound request.
#[derive(Debug, Clone)]
pub enum AuthorizationContext {
    /// No session.
    Anonymous,
    /// Signed in (or unknown), but resolution failed.
    Unavailable(AuthorizationError),
    Resolved(Box<ResolvedWorkspace>),
}

impl AuthorizationContext {
    #[must_use]
    pub fn resolved(workspace: ResolvedWorkspace) -> Self {
        Self::Resolved(Box::new(workspace))
    }

    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }

    #[must_use]
    pub fn workspace(&self) -> Option<&ResolvedWorkspace> {
        match self {
            Self::Resolved(workspace) => Some(workspace),
            Self::Anonymous | Self::Unavailable(_) => None,
        }
    }

    /// The resolved workspace, or why there is none.
    ///
    /// # Errors
    ///
    /// [`AuthorizationError::Unauthenticated`] without a session, otherwise
    /// the failure recorded during resolution.
    pub fn require(&self) -> Result<&ResolvedWorkspace, AuthorizationError> {
        match self {
            Self::Resolved(workspace) => Ok(workspace),
            Self::Anonymous => Err(AuthorizationError::Unauthenticated),
            Self::Unavailable(err) => Err(err.clone()),
        }
    }

    /// Capability predicate over the subject; always `false` when the
    /// context is not resolved.
    ///
    /// # Panics
    ///
    /// Panics when `requirement` is malformed (see [`InvalidCheck`]).
    #[must_use]
    pub fn has(&self, requirement: &HasCheck) -> bool {
        self.workspace()
            .is_some_and(|workspace| workspace.has(requirement))
    }
}
