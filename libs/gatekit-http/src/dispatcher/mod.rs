//! Generic authenticated request dispatcher.
//!
//! Every downstream call goes through [`Dispatcher::dispatch`], which:
//! 1. Bounds the call by the budget of its [`TimeoutProfile`]
//! 2. Attaches a trace id header (generated when the caller has none)
//! 3. On a 401 with a refreshable credential, refreshes once and re-issues
//!    the same call; a second 401 is surfaced, never retried again
//! 4. Maps non-2xx answers to [`DispatchError::Api`]
//! 5. Validates 2xx bodies against the caller's response type
//! 6. Emits exactly one timing record per logical call

use std::time::{Duration, Instant};

use http::{HeaderName, Method, StatusCode};
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::{DispatcherConfig, TimeoutProfile};
use crate::credential::ApiCredential;
use crate::error::DispatchError;
use crate::trace::TraceId;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests;

/// Structured error body returned by the downstream API.
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    details: Option<serde_json::Value>,
}

/// One logical downstream call.
///
/// ```ignore
/// let req = DispatchRequest::post("/auth/token", TimeoutProfile::AuthExchange)
///     .credential(&session_credential)
///     .json(serde_json::json!({ "subjectAccountId": "acc_1" }));
/// ```
#[derive(Debug)]
pub struct DispatchRequest<'a> {
    method: Method,
    path: &'a str,
    profile: TimeoutProfile,
    credential: Option<&'a ApiCredential>,
    body: Option<serde_json::Value>,
    trace_id: Option<&'a TraceId>,
    retry_allowed: bool,
    allow_empty: bool,
}

impl<'a> DispatchRequest<'a> {
    #[must_use]
    pub fn new(method: Method, path: &'a str, profile: TimeoutProfile) -> Self {
        Self {
            method,
            path,
            profile,
            credential: None,
            body: None,
            trace_id: None,
            retry_allowed: true,
            allow_empty: false,
        }
    }

    #[must_use]
    pub fn get(path: &'a str, profile: TimeoutProfile) -> Self {
        Self::new(Method::GET, path, profile)
    }

    #[must_use]
    pub fn post(path: &'a str, profile: TimeoutProfile) -> Self {
        Self::new(Method::POST, path, profile)
    }

    #[must_use]
    pub fn credential(mut self, credential: &'a ApiCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// JSON request body.
    #[must_use]
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn trace_id(mut self, trace_id: &'a TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    /// Never refresh-and-retry this call, even on a 401.
    #[must_use]
    pub fn no_retry(mut self) -> Self {
        self.retry_allowed = false;
        self
    }

    /// Accept an empty 2xx body; the response type is then decoded from
    /// JSON `null` (so `()` and `Option<T>` work, structs still fail).
    #[must_use]
    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }
}

/// Outcome of a single HTTP exchange.
struct Attempt<T> {
    status: u16,
    result: Result<T, DispatchError>,
}

impl<T> Attempt<T> {
    fn failed(err: DispatchError) -> Self {
        Self {
            status: err.status(),
            result: Err(err),
        }
    }
}

/// Dispatcher over one downstream base URL.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    http: reqwest::Client,
    config: DispatcherConfig,
    base_url: String,
    trace_header: HeaderName,
}

impl Dispatcher {
    /// Build a dispatcher from configuration.
    ///
    /// # Errors
    ///
    /// [`DispatchError::InvalidRequest`] when the base URL or trace header
    /// name is invalid, or the HTTP client cannot be constructed.
    pub fn new(config: DispatcherConfig) -> Result<Self, DispatchError> {
        Url::parse(&config.base_url).map_err(|e| {
            DispatchError::InvalidRequest(format!("invalid base_url '{}': {e}", config.base_url))
        })?;
        let trace_header = HeaderName::from_bytes(config.trace_header.as_bytes()).map_err(|e| {
            DispatchError::InvalidRequest(format!(
                "invalid trace_header '{}': {e}",
                config.trace_header
            ))
        })?;
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| DispatchError::InvalidRequest(format!("http client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            config,
            trace_header,
        })
    }

    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Perform one logical call and decode the response as `T`.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Timeout`] / [`DispatchError::Transport`] when no
    ///   usable response arrived
    /// - [`DispatchError::Api`] for non-2xx responses (after at most one
    ///   refresh-and-retry on 401)
    /// - [`DispatchError::Schema`] when a 2xx body does not decode as `T`
    pub async fn dispatch<T>(&self, request: DispatchRequest<'_>) -> Result<T, DispatchError>
    where
        T: DeserializeOwned,
    {
        let trace_id = request.trace_id.cloned().unwrap_or_else(TraceId::generate);
        let timeout = self.config.timeout_for(request.profile);
        let started = Instant::now();

        let (attempt, retried) = self.run(&request, &trace_id, timeout).await;

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            target: "gatekit_http::timing",
            path = request.path,
            method = %request.method,
            status = attempt.status,
            success = attempt.result.is_ok(),
            duration_ms,
            retried,
            timeout_profile = request.profile.as_str(),
            trace_id = %trace_id,
            "downstream call"
        );

        attempt.result
    }

    async fn run<T>(
        &self,
        request: &DispatchRequest<'_>,
        trace_id: &TraceId,
        timeout: Duration,
    ) -> (Attempt<T>, bool)
    where
        T: DeserializeOwned,
    {
        let url = match self.url_for(request.path) {
            Ok(url) => url,
            Err(err) => return (Attempt::failed(err), false),
        };

        let token = request.credential.map(ApiCredential::token);
        let first = self
            .send_once(request, &url, token.as_ref(), trace_id, timeout)
            .await;

        let (Some(credential), Some(rejected)) = (request.credential, token.as_ref()) else {
            return (first, false);
        };
        let expired = matches!(&first.result, Err(err) if err.is_unauthorized());
        if !expired || !request.retry_allowed || !credential.can_refresh() {
            return (first, false);
        }

        match credential.refresh_after(rejected).await {
            Ok(fresh) => {
                let second = self
                    .send_once(request, &url, Some(&fresh), trace_id, timeout)
                    .await;
                (second, true)
            }
            Err(err) => {
                tracing::warn!(
                    path = request.path,
                    error = %err,
                    "credential refresh failed; surfacing original 401"
                );
                (first, false)
            }
        }
    }

    fn url_for(&self, path: &str) -> Result<Url, DispatchError> {
        let joined = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&joined)
            .map_err(|e| DispatchError::InvalidRequest(format!("invalid url '{joined}': {e}")))
    }

    async fn send_once<T>(
        &self,
        request: &DispatchRequest<'_>,
        url: &Url,
        token: Option<&SecretString>,
        trace_id: &TraceId,
        timeout: Duration,
    ) -> Attempt<T>
    where
        T: DeserializeOwned,
    {
        let mut builder = self
            .http
            .request(request.method.clone(), url.clone())
            .header(self.trace_header.clone(), trace_id.as_str());
        if let Some(token) = token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let timed_out = || DispatchError::Timeout {
            method: request.method.to_string(),
            path: request.path.to_owned(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        };

        let (status, body) = match tokio::time::timeout(timeout, exchange).await {
            Err(_elapsed) => return Attempt::failed(timed_out()),
            Ok(Err(err)) if err.is_timeout() => return Attempt::failed(timed_out()),
            Ok(Err(err)) => {
                return Attempt::failed(DispatchError::Transport {
                    method: request.method.to_string(),
                    path: request.path.to_owned(),
                    message: err.to_string(),
                });
            }
            Ok(Ok(exchanged)) => exchanged,
        };

        Attempt {
            status: status.as_u16(),
            result: decode(request, status, &body),
        }
    }
}

fn decode<T>(
    request: &DispatchRequest<'_>,
    status: StatusCode,
    body: &[u8],
) -> Result<T, DispatchError>
where
    T: DeserializeOwned,
{
    if !status.is_success() {
        return Err(api_error(status, body));
    }

    let schema_error = |message: String| {
        tracing::error!(
            path = request.path,
            method = %request.method,
            status = status.as_u16(),
            error = %message,
            "downstream response does not match the expected schema"
        );
        DispatchError::Schema {
            method: request.method.to_string(),
            path: request.path.to_owned(),
            status: status.as_u16(),
            message,
        }
    };

    if body.iter().all(u8::is_ascii_whitespace) {
        if !request.allow_empty {
            return Err(schema_error("empty response body".to_owned()));
        }
        return serde_json::from_value(serde_json::Value::Null)
            .map_err(|e| schema_error(e.to_string()));
    }

    serde_json::from_slice(body).map_err(|e| schema_error(e.to_string()))
}

fn api_error(status: StatusCode, body: &[u8]) -> DispatchError {
    let (message, details) = serde_json::from_slice::<ErrorBody>(body).map_or_else(
        |_| (format!("request failed with status {}", status.as_u16()), None),
        |parsed| (parsed.error, parsed.details),
    );
    DispatchError::Api {
        status: status.as_u16(),
        message,
        details,
    }
}
