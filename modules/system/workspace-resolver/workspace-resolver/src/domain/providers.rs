//! Default session and subject sources backed by request headers.

use async_trait::async_trait;
use http::header::{AUTHORIZATION, COOKIE, InvalidHeaderName};
use http::{HeaderMap, HeaderName};
use secrecy::SecretString;
use workspace_resolver_sdk::{RequestMeta, Session, SessionError, SessionProvider, SubjectSelector};

/// Value of cookie `name` across every `Cookie` header of the request.
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_owned())
        .filter(|value| !value.is_empty())
}

fn header_value(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Reads the session token from a cookie, or from an `Authorization:
/// Bearer` header for non-browser callers.
///
/// The token is passed through as-is; validating it is the downstream's
/// job during the token exchange.
#[derive(Debug, Clone)]
pub struct CookieSessionProvider {
    cookie_name: String,
}

impl CookieSessionProvider {
    #[must_use]
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
        }
    }
}

#[async_trait]
impl SessionProvider for CookieSessionProvider {
    async fn session(&self, request: &RequestMeta) -> Result<Option<Session>, SessionError> {
        if let Some(token) = cookie_value(&request.headers, &self.cookie_name) {
            return Ok(Some(Session::new(SecretString::from(token))));
        }

        let Some(authorization) = request.headers.get(AUTHORIZATION) else {
            return Ok(None);
        };
        let authorization = authorization
            .to_str()
            .map_err(|_| SessionError::Invalid("authorization header is not ASCII".to_owned()))?;
        match authorization.strip_prefix("Bearer ") {
            Some(token) if !token.trim().is_empty() => Ok(Some(Session::new(SecretString::from(
                token.trim().to_owned(),
            )))),
            _ => Err(SessionError::Invalid(
                "authorization header is not a bearer token".to_owned(),
            )),
        }
    }
}

/// Reads the requested subject from a header, falling back to a cookie.
#[derive(Debug, Clone)]
pub struct HeaderSubjectSelector {
    header: HeaderName,
    cookie_name: String,
}

impl HeaderSubjectSelector {
    /// # Errors
    ///
    /// [`InvalidHeaderName`] when `header` is not a valid header name.
    pub fn new(header: &str, cookie_name: impl Into<String>) -> Result<Self, InvalidHeaderName> {
        Ok(Self {
            header: HeaderName::from_bytes(header.as_bytes())?,
            cookie_name: cookie_name.into(),
        })
    }
}

impl SubjectSelector for HeaderSubjectSelector {
    fn requested_subject(&self, request: &RequestMeta) -> Option<String> {
        header_value(&request.headers, &self.header)
            .or_else(|| cookie_value(&request.headers, &self.cookie_name))
    }
}
