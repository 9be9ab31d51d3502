//! Typed client for the two token-exchange endpoints.

use std::sync::Arc;

use async_trait::async_trait;
use bootstrap_resolver_sdk::{BootstrapEntry, TokenExchangeResponse};
use gatekit_http::{
    ApiCredential, CredentialRefresher, DispatchError, DispatchRequest, Dispatcher, IssuedToken,
    TimeoutProfile, TraceId,
};
use secrecy::SecretString;
use serde::Serialize;

const TOKEN_PATH: &str = "/auth/token";
const BOOTSTRAP_PATH: &str = "/dashboard/bootstrap";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenExchangeBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    subject_account_id: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BootstrapBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    subject_account_id: Option<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    include_agency_customers: bool,
}

/// Thin wrapper over the [`Dispatcher`] for `POST /auth/token` and
/// `POST /dashboard/bootstrap`, both authenticated with the end-user
/// session token.
#[derive(Debug, Clone)]
pub struct TokenExchangeClient {
    dispatcher: Arc<Dispatcher>,
}

impl TokenExchangeClient {
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Exchange the session for a scoped API token.
    ///
    /// # Errors
    ///
    /// Any [`DispatchError`] from the call.
    pub async fn exchange_token(
        &self,
        session: &ApiCredential,
        subject_account_id: Option<&str>,
        trace_id: Option<&TraceId>,
    ) -> Result<TokenExchangeResponse, DispatchError> {
        let body = to_body(&TokenExchangeBody { subject_account_id })?;
        let mut request = DispatchRequest::post(TOKEN_PATH, TimeoutProfile::AuthExchange)
            .credential(session)
            .json(body);
        if let Some(trace_id) = trace_id {
            request = request.trace_id(trace_id);
        }
        self.dispatcher.dispatch(request).await
    }

    /// Exchange the session and fetch the full entitlement snapshot.
    ///
    /// # Errors
    ///
    /// Any [`DispatchError`] from the call, including the 403 the caller is
    /// expected to handle.
    pub async fn bootstrap(
        &self,
        session: &ApiCredential,
        subject_account_id: Option<&str>,
        include_agency_customers: bool,
        trace_id: Option<&TraceId>,
    ) -> Result<BootstrapEntry, DispatchError> {
        let body = to_body(&BootstrapBody {
            subject_account_id,
            include_agency_customers,
        })?;
        let mut request = DispatchRequest::post(BOOTSTRAP_PATH, TimeoutProfile::Bootstrap)
            .credential(session)
            .json(body);
        if let Some(trace_id) = trace_id {
            request = request.trace_id(trace_id);
        }
        self.dispatcher.dispatch(request).await
    }
}

fn to_body<T: Serialize>(body: &T) -> Result<serde_json::Value, DispatchError> {
    serde_json::to_value(body).map_err(|e| DispatchError::InvalidRequest(e.to_string()))
}

/// Refreshes a bootstrap credential by re-running the token exchange for
/// the same `(session, subject)` pair.
#[derive(Debug)]
pub struct ExchangeRefresher {
    client: TokenExchangeClient,
    session: SecretString,
    subject_account_id: Option<String>,
    trace_id: Option<TraceId>,
}

impl ExchangeRefresher {
    #[must_use]
    pub fn new(
        client: TokenExchangeClient,
        session: SecretString,
        subject_account_id: Option<String>,
        trace_id: Option<TraceId>,
    ) -> Self {
        Self {
            client,
            session,
            subject_account_id,
            trace_id,
        }
    }
}

#[async_trait]
impl CredentialRefresher for ExchangeRefresher {
    async fn refresh(&self) -> Result<IssuedToken, DispatchError> {
        let session = ApiCredential::bearer(self.session.clone());
        let exchanged = self
            .client
            .exchange_token(
                &session,
                self.subject_account_id.as_deref(),
                self.trace_id.as_ref(),
            )
            .await?;
        Ok(exchanged.issued_token())
    }
}
