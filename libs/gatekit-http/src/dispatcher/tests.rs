#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use chrono::{TimeDelta, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing_test::traced_test;

use super::*;
use crate::credential::{CredentialRefresher, IssuedToken};
use crate::error::{TIMEOUT_STATUS, UNREACHABLE_STATUS};

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct Echo {
    authorization: Option<String>,
    trace_id: Option<String>,
}

#[derive(Clone, Default)]
struct Hits(Arc<AtomicUsize>);

impl Hits {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

async fn spawn_downstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn dispatcher(base_url: String) -> Dispatcher {
    Dispatcher::new(DispatcherConfig {
        base_url,
        ..DispatcherConfig::default()
    })
    .unwrap()
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

async fn echo(headers: HeaderMap) -> Json<serde_json::Value> {
    Json(json!({
        "authorization": header(&headers, "authorization"),
        "traceId": header(&headers, "x-trace-id"),
    }))
}

/// Accepts only `Bearer fresh`; anything else is an expired credential.
async fn guarded(State(hits): State<Hits>, headers: HeaderMap) -> impl IntoResponse {
    hits.record();
    if header(&headers, "authorization").as_deref() == Some("Bearer fresh") {
        (StatusCode::OK, Json(json!({ "ok": true })))
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "token expired" })),
        )
    }
}

async fn always_unauthorized(State(hits): State<Hits>) -> impl IntoResponse {
    hits.record();
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "token expired" })),
    )
}

struct StaticRefresher {
    calls: AtomicUsize,
    fail: bool,
}

impl StaticRefresher {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialRefresher for StaticRefresher {
    async fn refresh(&self) -> Result<IssuedToken, DispatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DispatchError::Api {
                status: 500,
                message: "exchange unavailable".to_owned(),
                details: None,
            });
        }
        Ok(IssuedToken::new(
            "fresh".to_owned(),
            Utc::now() + TimeDelta::minutes(10),
        ))
    }
}

fn stale_credential(refresher: Arc<StaticRefresher>) -> ApiCredential {
    ApiCredential::refreshable(
        IssuedToken::new("stale".to_owned(), Utc::now() + TimeDelta::minutes(1)),
        refresher,
    )
}

#[derive(Debug, Deserialize)]
struct Flag {
    ok: bool,
}

#[tokio::test]
async fn sends_bearer_and_trace_headers_and_decodes_body() {
    let base = spawn_downstream(Router::new().route("/echo", get(echo))).await;
    let dispatcher = dispatcher(base);
    let credential = ApiCredential::fixed(IssuedToken::new(
        "session-token".to_owned(),
        Utc::now() + TimeDelta::minutes(5),
    ));
    let trace_id = TraceId::from_inbound("trace-abc").unwrap();

    let echoed: Echo = dispatcher
        .dispatch(
            DispatchRequest::get("/echo", TimeoutProfile::Detail)
                .credential(&credential)
                .trace_id(&trace_id),
        )
        .await
        .unwrap();

    assert_eq!(
        echoed,
        Echo {
            authorization: Some("Bearer session-token".to_owned()),
            trace_id: Some("trace-abc".to_owned()),
        }
    );
}

#[tokio::test]
async fn generates_trace_id_when_absent() {
    let base = spawn_downstream(Router::new().route("/echo", get(echo))).await;

    let echoed: Echo = dispatcher(base)
        .dispatch(DispatchRequest::get("/echo", TimeoutProfile::Metadata))
        .await
        .unwrap();

    assert!(echoed.authorization.is_none());
    assert_eq!(echoed.trace_id.map(|t| t.len()), Some(32));
}

#[tokio::test]
async fn structured_api_error_is_surfaced_typed() {
    let router = Router::new().route(
        "/sites",
        post(|| async {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": "site limit reached", "details": { "limit": 3 } })),
            )
        }),
    );
    let base = spawn_downstream(router).await;

    let err = dispatcher(base)
        .dispatch::<Flag>(DispatchRequest::post("/sites", TimeoutProfile::Mutation).json(json!({})))
        .await
        .unwrap_err();

    match err {
        DispatchError::Api {
            status,
            message,
            details,
        } => {
            assert_eq!(status, 422);
            assert_eq!(message, "site limit reached");
            assert_eq!(details, Some(json!({ "limit": 3 })));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn unstructured_api_error_falls_back_to_generic_message() {
    let router = Router::new().route(
        "/sites",
        get(|| async { (StatusCode::BAD_GATEWAY, "upstream exploded") }),
    );
    let base = spawn_downstream(router).await;

    let err = dispatcher(base)
        .dispatch::<Flag>(DispatchRequest::get("/sites", TimeoutProfile::List))
        .await
        .unwrap_err();

    assert_eq!(err.status(), 502);
    assert_eq!(err.to_string(), "request failed with status 502");
}

#[tokio::test]
async fn empty_body_is_accepted_only_when_allowed() {
    let router = Router::new().route("/noop", post(|| async { StatusCode::NO_CONTENT }));
    let base = spawn_downstream(router).await;
    let dispatcher = dispatcher(base);

    dispatcher
        .dispatch::<()>(DispatchRequest::post("/noop", TimeoutProfile::Mutation).allow_empty())
        .await
        .unwrap();

    let none: Option<Flag> = dispatcher
        .dispatch(DispatchRequest::post("/noop", TimeoutProfile::Mutation).allow_empty())
        .await
        .unwrap();
    assert!(none.is_none());

    let err = dispatcher
        .dispatch::<Flag>(DispatchRequest::post("/noop", TimeoutProfile::Mutation).allow_empty())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Schema { status: 204, .. }));

    let err = dispatcher
        .dispatch::<()>(DispatchRequest::post("/noop", TimeoutProfile::Mutation))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Schema { .. }));
}

#[tokio::test]
async fn schema_mismatch_is_fatal() {
    let router = Router::new().route(
        "/account",
        get(|| async { Json(json!({ "ok": "definitely" })) }),
    );
    let base = spawn_downstream(router).await;

    let err = dispatcher(base)
        .dispatch::<Flag>(DispatchRequest::get("/account", TimeoutProfile::Detail))
        .await
        .unwrap_err();

    match err {
        DispatchError::Schema { path, status, .. } => {
            assert_eq!(path, "/account");
            assert_eq!(status, 200);
        }
        other => panic!("expected Schema error, got {other:?}"),
    }
}

#[tokio::test]
async fn timeout_is_reported_with_gateway_timeout_marker() {
    let router = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Json(json!({ "ok": true }))
        }),
    );
    let base = spawn_downstream(router).await;
    let dispatcher = Dispatcher::new(DispatcherConfig {
        base_url: base,
        timeout_ceiling_ms: 100,
        ..DispatcherConfig::default()
    })
    .unwrap();

    let err = dispatcher
        .dispatch::<Flag>(DispatchRequest::get("/slow", TimeoutProfile::Detail))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Timeout { timeout_ms: 100, .. }));
    assert_eq!(err.status(), TIMEOUT_STATUS);
}

#[tokio::test]
async fn unreachable_downstream_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = dispatcher(format!("http://{addr}"))
        .dispatch::<Flag>(DispatchRequest::get("/anything", TimeoutProfile::Detail))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Transport { .. }));
    assert_eq!(err.status(), UNREACHABLE_STATUS);
}

#[tokio::test]
async fn expired_credential_is_refreshed_and_call_retried_once() {
    let hits = Hits::default();
    let router = Router::new()
        .route("/sites", get(guarded))
        .with_state(hits.clone());
    let base = spawn_downstream(router).await;
    let refresher = StaticRefresher::new(false);
    let credential = stale_credential(refresher.clone());

    let body: Flag = dispatcher(base)
        .dispatch(DispatchRequest::get("/sites", TimeoutProfile::List).credential(&credential))
        .await
        .unwrap();

    assert!(body.ok);
    assert_eq!(hits.count(), 2);
    assert_eq!(refresher.calls(), 1);
    assert_eq!(credential.token().expose_secret(), "fresh");
}

#[tokio::test]
async fn second_unauthorized_after_refresh_is_not_retried_again() {
    let hits = Hits::default();
    let router = Router::new()
        .route("/sites", get(always_unauthorized))
        .with_state(hits.clone());
    let base = spawn_downstream(router).await;
    let refresher = StaticRefresher::new(false);
    let credential = stale_credential(refresher.clone());

    let err = dispatcher(base)
        .dispatch::<Flag>(DispatchRequest::get("/sites", TimeoutProfile::List).credential(&credential))
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(hits.count(), 2);
    assert_eq!(refresher.calls(), 1);
}

#[tokio::test]
async fn failed_refresh_surfaces_original_unauthorized() {
    let hits = Hits::default();
    let router = Router::new()
        .route("/sites", get(guarded))
        .with_state(hits.clone());
    let base = spawn_downstream(router).await;
    let refresher = StaticRefresher::new(true);
    let credential = stale_credential(refresher.clone());

    let err = dispatcher(base)
        .dispatch::<Flag>(DispatchRequest::get("/sites", TimeoutProfile::List).credential(&credential))
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(err.to_string(), "token expired");
    assert_eq!(hits.count(), 1);
    assert_eq!(refresher.calls(), 1);
    assert_eq!(credential.token().expose_secret(), "stale");
}

#[tokio::test]
async fn retry_can_be_disabled_per_call() {
    let hits = Hits::default();
    let router = Router::new()
        .route("/sites", get(guarded))
        .with_state(hits.clone());
    let base = spawn_downstream(router).await;
    let refresher = StaticRefresher::new(false);
    let credential = stale_credential(refresher.clone());

    let err = dispatcher(base)
        .dispatch::<Flag>(
            DispatchRequest::get("/sites", TimeoutProfile::List)
                .credential(&credential)
                .no_retry(),
        )
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(hits.count(), 1);
    assert_eq!(refresher.calls(), 0);
}

#[tokio::test]
#[traced_test]
async fn one_timing_record_per_logical_call_even_across_retry() {
    let hits = Hits::default();
    let router = Router::new()
        .route("/sites", get(guarded))
        .with_state(hits.clone());
    let base = spawn_downstream(router).await;
    let credential = stale_credential(StaticRefresher::new(false));

    let _flag: Flag = dispatcher(base)
        .dispatch(DispatchRequest::get("/sites", TimeoutProfile::List).credential(&credential))
        .await
        .unwrap();

    assert_eq!(hits.count(), 2);
    assert!(logs_contain("retried=true"));
    logs_assert(|lines: &[&str]| {
        let records = lines
            .iter()
            .filter(|line| line.contains("downstream call"))
            .count();
        if records == 1 {
            Ok(())
        } else {
            Err(format!("expected exactly one timing record, found {records}"))
        }
    });
}
