//! HTTP surface of the server.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Extension, Json, Router, middleware};
use bootstrap_resolver_sdk::Bootstrap;
use gatekit_entitlements::{Account, DenyReason, HasCheck};
use http::StatusCode;
use serde::Serialize;
use workspace_resolver::{
    Authorization, AuthorizationState, Problem, RequestAuthorization, RequiredAuthorization,
    authorization_middleware,
};
use workspace_resolver_sdk::{AuthorizationContext, BillingIssue, ResolvedWorkspace};

/// `/health` is public; everything under `/v1/auth` goes through the
/// authorization middleware.
#[must_use]
pub fn router(state: AuthorizationState) -> Router {
    let authorized = Router::new()
        .route("/v1/auth/context", get(context))
        .route("/v1/auth/check", post(check))
        .layer(middleware::from_fn_with_state(
            state,
            authorization_middleware,
        ));

    Router::new().route("/health", get(health)).merge(authorized)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum ContextStatus {
    Anonymous,
    Unavailable,
    Resolved,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextSummary {
    status: ContextStatus,
    signed_in: bool,
    trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    workspace: Option<WorkspaceSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkspaceSummary {
    actor_account_id: String,
    subject_account_id: String,
    acting_as_customer: bool,
    actor_plan_active: bool,
    subject_plan_active: bool,
    mutations_allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    billing_issue: Option<BillingIssue>,
    /// Active delegates the actor may switch to.
    delegates: Vec<String>,
    account: Account,
}

impl WorkspaceSummary {
    fn new(workspace: &ResolvedWorkspace) -> Self {
        Self {
            actor_account_id: workspace.actor_account().account_id.clone(),
            subject_account_id: workspace.subject_account().account_id.clone(),
            acting_as_customer: workspace.acting_as_customer(),
            actor_plan_active: workspace.actor_plan_active(),
            subject_plan_active: workspace.subject_plan_active(),
            mutations_allowed: workspace.mutations_allowed(),
            billing_issue: workspace.billing_issue(),
            delegates: delegates(workspace.actor()),
            account: workspace.subject_account().clone(),
        }
    }
}

fn delegates(actor: &Bootstrap) -> Vec<String> {
    actor
        .entry
        .active_customer_ids()
        .map(str::to_owned)
        .collect()
}

/// Soft summary; anonymous and failed resolutions are reported, not
/// rejected.
async fn context(
    Extension(request): Extension<Arc<RequestAuthorization>>,
    Authorization(context): Authorization,
) -> Json<ContextSummary> {
    let (status, error, workspace) = match context.as_ref() {
        AuthorizationContext::Anonymous => (ContextStatus::Anonymous, None, None),
        AuthorizationContext::Unavailable(err) => {
            (ContextStatus::Unavailable, Some(err.to_string()), None)
        }
        AuthorizationContext::Resolved(workspace) => (
            ContextStatus::Resolved,
            None,
            Some(WorkspaceSummary::new(workspace)),
        ),
    };

    Json(ContextSummary {
        status,
        signed_in: context.is_signed_in(),
        trace_id: request.trace_id().as_str().to_owned(),
        error,
        workspace,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckResponse {
    allowed: bool,
    subject_account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<DenyReason>,
}

fn bad_request(request: &RequestAuthorization, detail: String) -> Problem {
    Problem::new(StatusCode::BAD_REQUEST, "Bad Request", detail)
        .with_trace_id(request.trace_id().as_str())
}

/// Evaluate a requirement against the subject of a signed-in request.
async fn check(
    Extension(request): Extension<Arc<RequestAuthorization>>,
    RequiredAuthorization(workspace): RequiredAuthorization,
    body: Result<Json<HasCheck>, JsonRejection>,
) -> Result<Json<CheckResponse>, Problem> {
    let Json(requirement) = body.map_err(|rejection| bad_request(&request, rejection.body_text()))?;
    let outcome = workspace
        .check(&requirement)
        .map_err(|err| bad_request(&request, err.to_string()))?;

    tracing::debug!(
        trace_id = %request.trace_id(),
        requirement = requirement.kind(),
        allowed = outcome.is_allowed(),
        "requirement evaluated"
    );
    Ok(Json(CheckResponse {
        allowed: outcome.is_allowed(),
        subject_account_id: workspace.subject_account().account_id.clone(),
        reason: outcome.reason().cloned(),
    }))
}
