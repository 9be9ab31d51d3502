//! Bearer credential that can refresh itself in place.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;

use crate::error::DispatchError;

/// A token together with the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: SecretString,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    #[must_use]
    pub fn new(token: impl Into<SecretString>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }
}

/// Obtains a replacement token for a credential the downstream rejected.
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    /// Perform a fresh token exchange.
    ///
    /// # Errors
    ///
    /// Any [`DispatchError`] raised by the exchange call.
    async fn refresh(&self) -> Result<IssuedToken, DispatchError>;
}

/// Credential shared by reference with the dispatcher for the duration of
/// a request.
///
/// Refreshes are serialized per credential: a caller that waited while
/// another refresh finished reuses the freshly issued token instead of
/// exchanging again.
pub struct ApiCredential {
    current: RwLock<IssuedToken>,
    refresher: Option<Arc<dyn CredentialRefresher>>,
    refresh_lock: Mutex<()>,
}

impl ApiCredential {
    /// Credential without refresh support (e.g. a raw session token).
    #[must_use]
    pub fn fixed(issued: IssuedToken) -> Self {
        Self {
            current: RwLock::new(issued),
            refresher: None,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Fixed credential whose expiry is not known to this process, such as
    /// an end-user session token validated by the identity provider.
    #[must_use]
    pub fn bearer(token: SecretString) -> Self {
        Self::fixed(IssuedToken::new(token, DateTime::<Utc>::MAX_UTC))
    }

    #[must_use]
    pub fn refreshable(issued: IssuedToken, refresher: Arc<dyn CredentialRefresher>) -> Self {
        Self {
            current: RwLock::new(issued),
            refresher: Some(refresher),
            refresh_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn token(&self) -> SecretString {
        self.current.read().token.clone()
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.current.read().expires_at
    }

    #[must_use]
    pub fn can_refresh(&self) -> bool {
        self.refresher.is_some()
    }

    /// Replace the current token with a freshly exchanged one.
    ///
    /// # Errors
    ///
    /// [`DispatchError::InvalidRequest`] when the credential has no
    /// refresher, otherwise whatever the refresher returns.
    pub async fn refresh(&self) -> Result<SecretString, DispatchError> {
        let rejected = self.token();
        self.refresh_after(&rejected).await
    }

    /// Refresh unless the token already moved on from `rejected`.
    pub(crate) async fn refresh_after(
        &self,
        rejected: &SecretString,
    ) -> Result<SecretString, DispatchError> {
        let Some(refresher) = &self.refresher else {
            return Err(DispatchError::InvalidRequest(
                "credential cannot be refreshed".to_owned(),
            ));
        };

        let _guard = self.refresh_lock.lock().await;

        {
            let current = self.current.read();
            if current.token.expose_secret() != rejected.expose_secret() {
                return Ok(current.token.clone());
            }
        }

        let issued = refresher.refresh().await?;
        let token = issued.token.clone();
        *self.current.write() = issued;
        tracing::debug!("api credential refreshed");
        Ok(token)
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("current", &*self.current.read())
            .field("refreshable", &self.refresher.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeDelta;

    use super::*;

    struct CountingRefresher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CredentialRefresher for CountingRefresher {
        async fn refresh(&self) -> Result<IssuedToken, DispatchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(IssuedToken::new(
                format!("fresh-{n}"),
                Utc::now() + TimeDelta::minutes(10),
            ))
        }
    }

    fn issued(token: &str) -> IssuedToken {
        IssuedToken::new(token.to_owned(), Utc::now() + TimeDelta::minutes(1))
    }

    #[tokio::test]
    async fn refresh_replaces_token_in_place() {
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
        });
        let credential = ApiCredential::refreshable(issued("stale"), refresher.clone());

        let token = credential.refresh().await.unwrap();

        assert_eq!(token.expose_secret(), "fresh-1");
        assert_eq!(credential.token().expose_secret(), "fresh-1");
        assert!(credential.expires_at() > Utc::now() + TimeDelta::minutes(5));
    }

    #[tokio::test]
    async fn concurrent_refreshes_of_the_same_token_exchange_once() {
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
        });
        let credential = Arc::new(ApiCredential::refreshable(
            issued("stale"),
            refresher.clone(),
        ));
        let rejected = credential.token();

        let mut handles = Vec::new();
        for _ in 0..5 {
            let credential = Arc::clone(&credential);
            let rejected = rejected.clone();
            handles.push(tokio::spawn(async move {
                credential.refresh_after(&rejected).await
            }));
        }
        for handle in handles {
            let token = handle.await.unwrap().unwrap();
            assert_eq!(token.expose_secret(), "fresh-1");
        }

        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fixed_credential_refuses_to_refresh() {
        let credential = ApiCredential::fixed(issued("session"));

        assert!(!credential.can_refresh());
        assert!(matches!(
            credential.refresh().await,
            Err(DispatchError::InvalidRequest(_))
        ));
    }

    #[test]
    fn debug_output_redacts_token() {
        let credential = ApiCredential::fixed(issued("super-secret"));
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("super-secret"));
    }
}
