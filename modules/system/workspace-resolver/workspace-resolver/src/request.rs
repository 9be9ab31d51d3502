//! Axum integration: one authorization resolution per request.
//!
//! [`authorization_middleware`] attaches a [`RequestAuthorization`] to every
//! request. Nothing is resolved until a handler asks for it through
//! [`Authorization`] or [`RequiredAuthorization`]; the first extraction
//! resolves and memoizes the context, later ones reuse it.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use gatekit_http::TraceId;
use http::header::InvalidHeaderName;
use http::request::Parts;
use http::{HeaderName, StatusCode};
use tokio::sync::OnceCell;
use workspace_resolver_sdk::{
    AuthorizationContext, AuthorizationError, RequestMeta, ResolvedWorkspace, SessionError,
    WorkspaceResolverClient,
};

use crate::config::WorkspaceResolverConfig;
use crate::problem::Problem;

/// Request-scoped memo of the authorization context.
pub struct RequestAuthorization {
    resolver: Arc<dyn WorkspaceResolverClient>,
    meta: RequestMeta,
    sign_in_url: Option<Arc<str>>,
    context: OnceCell<Arc<AuthorizationContext>>,
}

impl RequestAuthorization {
    #[must_use]
    pub fn new(
        resolver: Arc<dyn WorkspaceResolverClient>,
        meta: RequestMeta,
        sign_in_url: Option<Arc<str>>,
    ) -> Self {
        Self {
            resolver,
            meta,
            sign_in_url,
            context: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn meta(&self) -> &RequestMeta {
        &self.meta
    }

    #[must_use]
    pub fn trace_id(&self) -> &TraceId {
        &self.meta.trace_id
    }

    /// The context of this request, resolved on first call.
    pub async fn context(&self) -> Arc<AuthorizationContext> {
        self.context
            .get_or_init(|| async { Arc::new(self.resolver.resolve(&self.meta).await) })
            .await
            .clone()
    }

    /// Map an unusable context to the response `RequiredAuthorization`
    /// rejects with.
    #[must_use]
    pub fn rejection(&self, err: &AuthorizationError) -> AuthorizationRejection {
        let trace_id = self.meta.trace_id.as_str();
        let problem = |status, title: &str, detail: &str| {
            AuthorizationRejection::Problem(Problem::new(status, title, detail).with_trace_id(trace_id))
        };
        let sign_in = |detail: &str| match &self.sign_in_url {
            Some(url) => AuthorizationRejection::Redirect(url.to_string()),
            None => problem(StatusCode::UNAUTHORIZED, "Unauthorized", detail),
        };

        match err {
            AuthorizationError::Unauthenticated => sign_in("Sign-in required"),
            AuthorizationError::Session(SessionError::Invalid(_)) => {
                problem(StatusCode::UNAUTHORIZED, "Unauthorized", "Invalid session credential")
            }
            AuthorizationError::Session(SessionError::Unavailable(_)) => problem(
                StatusCode::SERVICE_UNAVAILABLE,
                "Service Unavailable",
                "Session provider unavailable",
            ),
            AuthorizationError::Bootstrap(err) if err.downstream_status() == Some(401) => {
                sign_in("Session rejected by the API")
            }
            AuthorizationError::Bootstrap(err) if err.is_transport() => problem(
                StatusCode::SERVICE_UNAVAILABLE,
                "Service Unavailable",
                "Authorization service unavailable",
            ),
            AuthorizationError::Bootstrap(_) => problem(
                StatusCode::BAD_GATEWAY,
                "Bad Gateway",
                "Could not bootstrap an API credential",
            ),
        }
    }
}

/// Shared state of [`authorization_middleware`].
#[derive(Clone)]
pub struct AuthorizationState {
    resolver: Arc<dyn WorkspaceResolverClient>,
    trace_header: HeaderName,
    sign_in_url: Option<Arc<str>>,
}

impl AuthorizationState {
    /// # Errors
    ///
    /// [`InvalidHeaderName`] when `trace_header` is not a valid header name.
    pub fn new(
        resolver: Arc<dyn WorkspaceResolverClient>,
        trace_header: &str,
        config: &WorkspaceResolverConfig,
    ) -> Result<Self, InvalidHeaderName> {
        Ok(Self {
            resolver,
            trace_header: HeaderName::from_bytes(trace_header.as_bytes())?,
            sign_in_url: config.sign_in_url.as_deref().map(Arc::from),
        })
    }
}

/// Attach a [`RequestAuthorization`] to the request.
///
/// An acceptable inbound trace id is reused for every downstream call of
/// the request; otherwise one is generated.
pub async fn authorization_middleware(
    State(state): State<AuthorizationState>,
    mut req: Request,
    next: Next,
) -> Response {
    let trace_id = req
        .headers()
        .get(&state.trace_header)
        .and_then(|value| value.to_str().ok())
        .and_then(TraceId::from_inbound)
        .unwrap_or_else(TraceId::generate);
    let meta = RequestMeta::new(req.headers().clone(), trace_id);

    req.extensions_mut().insert(Arc::new(RequestAuthorization::new(
        state.resolver,
        meta,
        state.sign_in_url,
    )));
    next.run(req).await
}

fn memo(parts: &Parts) -> Result<Arc<RequestAuthorization>, Problem> {
    parts
        .extensions
        .get::<Arc<RequestAuthorization>>()
        .cloned()
        .ok_or_else(|| {
            tracing::error!("authorization middleware is not installed on this route");
            Problem::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                "Authorization is not configured",
            )
        })
}

/// Soft entry point: the context as-is, anonymous included.
pub struct Authorization(pub Arc<AuthorizationContext>);

impl<S: Send + Sync> FromRequestParts<S> for Authorization {
    type Rejection = Problem;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let memo = memo(parts)?;
        Ok(Self(memo.context().await))
    }
}

/// Enforcing entry point: a signed-in user with a usable credential.
pub struct RequiredAuthorization(pub ResolvedWorkspace);

/// Why [`RequiredAuthorization`] rejected a request.
#[derive(Debug)]
pub enum AuthorizationRejection {
    Problem(Problem),
    /// Send the browser to the sign-in page.
    Redirect(String),
}

impl IntoResponse for AuthorizationRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Problem(problem) => problem.into_response(),
            Self::Redirect(url) => Redirect::to(&url).into_response(),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequiredAuthorization {
    type Rejection = AuthorizationRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let memo = memo(parts).map_err(AuthorizationRejection::Problem)?;
        let context = memo.context().await;
        match context.require() {
            Ok(workspace) => Ok(Self(workspace.clone())),
            Err(err) => {
                tracing::debug!(error = %err, "authorization required");
                Err(memo.rejection(&err))
            }
        }
    }
}
