//! Models for the bootstrap resolver API.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gatekit_entitlements::{Account, PlanStatus, PlanType};
use gatekit_http::{ApiCredential, IssuedToken, TraceId};
use serde::{Deserialize, Serialize};

/// Minimal plan claims returned directly by the token exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlements {
    pub plan_type: PlanType,
    pub plan_status: PlanStatus,
}

/// State of a delegation edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelegateStatus {
    Active,
    Suspended,
}

/// A delegation edge from an agency actor to a managed customer account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgencyCustomer {
    pub agency_account_id: String,
    pub customer_account_id: String,
    pub customer_plan: PlanType,
    pub plan_status: PlanStatus,
    pub status: DelegateStatus,
    pub active_site_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
}

impl AgencyCustomer {
    /// Only active edges are eligible delegation targets.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == DelegateStatus::Active
    }
}

/// Response of `POST /auth/token`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenExchangeResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub entitlements: Entitlements,
    pub actor_account_id: String,
    pub subject_account_id: String,
}

impl fmt::Debug for TokenExchangeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenExchangeResponse")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("entitlements", &self.entitlements)
            .field("actor_account_id", &self.actor_account_id)
            .field("subject_account_id", &self.subject_account_id)
            .finish()
    }
}

impl TokenExchangeResponse {
    #[must_use]
    pub fn issued_token(&self) -> IssuedToken {
        IssuedToken::new(self.token.clone(), self.expires_at)
    }
}

/// Bootstrap payload as returned by `POST /dashboard/bootstrap` and as
/// stored in the shared cache.
///
/// `subject_account_id` is always the account whose snapshot is embedded
/// in `account`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapEntry {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub entitlements: Entitlements,
    pub actor_account_id: String,
    pub subject_account_id: String,
    pub account: Account,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency_customers: Option<Vec<AgencyCustomer>>,
}

impl fmt::Debug for BootstrapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapEntry")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("entitlements", &self.entitlements)
            .field("actor_account_id", &self.actor_account_id)
            .field("subject_account_id", &self.subject_account_id)
            .field("account", &self.account)
            .field("agency_customers", &self.agency_customers)
            .finish()
    }
}

impl BootstrapEntry {
    /// Entry built from a bare token exchange when the full bootstrap was
    /// refused: the account carries the plan claims and nothing else.
    #[must_use]
    pub fn minimal(exchange: TokenExchangeResponse) -> Self {
        let account = Account::minimal(
            exchange.subject_account_id.clone(),
            exchange.entitlements.plan_type,
            exchange.entitlements.plan_status,
        );
        Self {
            token: exchange.token,
            expires_at: exchange.expires_at,
            entitlements: exchange.entitlements,
            actor_account_id: exchange.actor_account_id,
            subject_account_id: exchange.subject_account_id,
            account,
            agency_customers: None,
        }
    }

    #[must_use]
    pub fn issued_token(&self) -> IssuedToken {
        IssuedToken::new(self.token.clone(), self.expires_at)
    }

    /// Customer account ids this actor may act on.
    pub fn active_customer_ids(&self) -> impl Iterator<Item = &str> {
        self.agency_customers
            .iter()
            .flatten()
            .filter(|customer| customer.is_active())
            .map(|customer| customer.customer_account_id.as_str())
    }
}

/// Parameters of one bootstrap lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapRequest {
    /// Account to act on; `None` means the signed-in actor.
    pub subject_account_id: Option<String>,
    /// Ask the downstream for the actor's delegate list.
    pub include_delegates: bool,
    /// Correlation id forwarded to every downstream call.
    pub trace_id: Option<TraceId>,
}

impl BootstrapRequest {
    /// Lookup for the signed-in actor itself.
    #[must_use]
    pub fn actor() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_subject(subject_account_id: impl Into<String>) -> Self {
        Self {
            subject_account_id: Some(subject_account_id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delegates(mut self) -> Self {
        self.include_delegates = true;
        self
    }

    #[must_use]
    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }
}

/// A resolved bootstrap: the (possibly cached) entry and a credential for
/// downstream calls on behalf of its subject.
///
/// The credential refreshes itself through a fresh token exchange when the
/// downstream reports it expired.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    pub entry: Arc<BootstrapEntry>,
    pub credential: Arc<ApiCredential>,
}

impl Bootstrap {
    #[must_use]
    pub fn account(&self) -> &Account {
        &self.entry.account
    }
}
