//! Bootstrap cache service.
//!
//! A lookup goes through these steps:
//! 1. Derive the cache key from the session token and the normalized subject
//! 2. Read through the shared store; a hit never touches the downstream
//! 3. On a miss, join the in-flight lookup for the same key or start one
//! 4. Call the bootstrap endpoint, falling back to a bare token exchange
//!    and a minimal account when it answers 403
//! 5. Write the entry back with a TTL bounded by the credential lifetime
//!
//! Store failures degrade to a miss (read) or a skipped write; they are
//! logged and never returned.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bootstrap_resolver_sdk::{Bootstrap, BootstrapEntry, BootstrapRequest, BootstrapResolverError};
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use gatekit_http::{ApiCredential, CredentialRefresher, DispatchError, IssuedToken, TraceId};
use secrecy::{ExposeSecret, SecretString};
use tracing::Instrument;

use super::cache::{cache_key, cache_ttl, normalize_subject};
use super::exchange::{ExchangeRefresher, TokenExchangeClient};
use crate::config::BootstrapCacheConfig;
use crate::store::BootstrapStore;


type LookupResult = Result<Arc<BootstrapEntry>, BootstrapResolverError>;
type SharedLookup = Shared<BoxFuture<'static, LookupResult>>;

/// An in-flight lookup, tagged so that only the lookup that created a map
/// slot can remove it.
struct Flight {
    id: u64,
    lookup: SharedLookup,
}

/// Removes the slot of flight `id` when the lookup task ends, panics
/// included.
struct FlightSlot<'a> {
    in_flight: &'a DashMap<String, Flight>,
    key: &'a str,
    id: u64,
}

impl Drop for FlightSlot<'_> {
    fn drop(&mut self) {
        self.in_flight
            .remove_if(self.key, |_, flight| flight.id == self.id);
    }
}

pub struct Service {
    exchange: TokenExchangeClient,
    store: Arc<dyn BootstrapStore>,
    config: BootstrapCacheConfig,
    in_flight: DashMap<String, Flight>,
    next_flight_id: AtomicU64,
}

impl Service {
    #[must_use]
    pub fn new(
        exchange: TokenExchangeClient,
        store: Arc<dyn BootstrapStore>,
        config: BootstrapCacheConfig,
    ) -> Self {
        Self {
            exchange,
            store,
            config,
            in_flight: DashMap::new(),
            next_flight_id: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn config(&self) -> &BootstrapCacheConfig {
        &self.config
    }

    /// Resolve the bootstrap for `session` and the requested subject.
    ///
    /// # Errors
    ///
    /// Downstream failures other than the handled 403, and payloads whose
    /// embedded account does not belong to the subject.
    #[tracing::instrument(
        skip_all,
        fields(
            subject = request.subject_account_id.as_deref().unwrap_or("actor"),
            include_delegates = request.include_delegates,
        )
    )]
    pub async fn get_bootstrap(
        self: &Arc<Self>,
        session: &SecretString,
        request: &BootstrapRequest,
    ) -> Result<Bootstrap, BootstrapResolverError> {
        let subject = normalize_subject(request.subject_account_id.as_deref());
        let key = cache_key(&self.config.environment, session, subject);

        let entry = match self.read_cache(&key, request.include_delegates).await {
            Some(entry) => Arc::new(entry),
            None => self.load_shared(key.clone(), session, request).await?,
        };

        Ok(self.bootstrap_for(key, entry, session, subject, request.trace_id.clone()))
    }

    /// Delete the cached entry for `(session, subject)`.
    pub async fn invalidate(&self, session: &SecretString, subject: Option<&str>) {
        let key = cache_key(&self.config.environment, session, normalize_subject(subject));
        match self.store.delete(&key).await {
            Ok(()) => tracing::debug!("bootstrap cache entry invalidated"),
            Err(err) => tracing::warn!(error = %err, "bootstrap cache invalidation failed"),
        }
    }

    /// Join the in-flight lookup for `key` or start a new one.
    ///
    /// The lookup runs on its own task and removes its map slot once
    /// settled, so it completes even when every caller went away and a
    /// failed fetch never wedges later callers.
    async fn load_shared(
        self: &Arc<Self>,
        key: String,
        session: &SecretString,
        request: &BootstrapRequest,
    ) -> LookupResult {
        // Lookups with and without the delegate list return different
        // payloads for the same cache key.
        let flight_key = if request.include_delegates {
            format!("{key}+delegates")
        } else {
            key.clone()
        };

        let lookup = match self.in_flight.entry(flight_key.clone()) {
            Entry::Occupied(flight) => {
                tracing::debug!("joining in-flight bootstrap lookup");
                flight.get().lookup.clone()
            }
            Entry::Vacant(slot) => {
                let id = self.next_flight_id.fetch_add(1, Ordering::Relaxed);
                let this = Arc::clone(self);
                let session = session.clone();
                let request = request.clone();
                let task = tokio::spawn(
                    async move {
                        let _slot = FlightSlot {
                            in_flight: &this.in_flight,
                            key: &flight_key,
                            id,
                        };
                        this.load(&key, &session, &request).await
                    }
                    .in_current_span(),
                );
                let lookup = async move {
                    task.await.unwrap_or_else(|err| {
                        Err(BootstrapResolverError::Internal(format!(
                            "bootstrap lookup task failed: {err}"
                        )))
                    })
                }
                .boxed()
                .shared();
                slot.insert(Flight {
                    id,
                    lookup: lookup.clone(),
                });
                lookup
            }
        };

        lookup.await
    }

    async fn load(
        &self,
        key: &str,
        session: &SecretString,
        request: &BootstrapRequest,
    ) -> LookupResult {
        let credential = ApiCredential::bearer(session.clone());
        let subject = normalize_subject(request.subject_account_id.as_deref());
        let trace_id = request.trace_id.as_ref();

        let mut entry = match self
            .exchange
            .bootstrap(&credential, subject, request.include_delegates, trace_id)
            .await
        {
            Ok(entry) => entry,
            Err(err) if err.is_forbidden() => {
                tracing::info!("bootstrap forbidden; falling back to a minimally entitled account");
                let exchanged = self
                    .exchange
                    .exchange_token(&credential, subject, trace_id)
                    .await?;
                BootstrapEntry::minimal(exchanged)
            }
            Err(err) => return Err(err.into()),
        };

        if entry.account.account_id != entry.subject_account_id {
            return Err(BootstrapResolverError::InvalidResponse(format!(
                "account snapshot '{}' does not belong to subject '{}'",
                entry.account.account_id, entry.subject_account_id
            )));
        }
        if let Some(subject) = subject
            && entry.subject_account_id != subject
        {
            return Err(BootstrapResolverError::InvalidResponse(format!(
                "requested subject '{subject}' but received '{}'",
                entry.subject_account_id
            )));
        }
        if request.include_delegates && entry.agency_customers.is_none() {
            entry.agency_customers = Some(Vec::new());
        }

        self.write_cache(key, &entry).await;
        Ok(Arc::new(entry))
    }

    async fn read_cache(&self, key: &str, include_delegates: bool) -> Option<BootstrapEntry> {
        let bytes = match self.store.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!("bootstrap cache miss");
                return None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "bootstrap cache read failed; treating as miss");
                return None;
            }
        };

        match serde_json::from_slice::<BootstrapEntry>(&bytes) {
            Ok(entry) if include_delegates && entry.agency_customers.is_none() => {
                tracing::debug!("cached bootstrap entry lacks the delegate list");
                None
            }
            Ok(entry) => {
                tracing::debug!("bootstrap cache hit");
                Some(entry)
            }
            Err(err) => {
                tracing::warn!(error = %err, "cached bootstrap entry is unreadable; treating as miss");
                None
            }
        }
    }

    async fn write_cache(&self, key: &str, entry: &BootstrapEntry) {
        let Some(ttl) = cache_ttl(entry.expires_at, Utc::now(), &self.config) else {
            tracing::debug!(
                expires_at = %entry.expires_at,
                "credential too close to expiry; not caching"
            );
            return;
        };

        let bytes = match serde_json::to_vec(entry) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "bootstrap entry could not be serialized; not caching");
                return;
            }
        };

        if let Err(err) = self.store.put(key, bytes, ttl).await {
            tracing::warn!(error = %err, "bootstrap cache write failed");
        }
    }

    fn bootstrap_for(
        self: &Arc<Self>,
        key: String,
        entry: Arc<BootstrapEntry>,
        session: &SecretString,
        subject: Option<&str>,
        trace_id: Option<TraceId>,
    ) -> Bootstrap {
        let exchange = ExchangeRefresher::new(
            self.exchange.clone(),
            session.clone(),
            subject.map(str::to_owned),
            trace_id,
        );
        let refresher = CachingRefresher {
            svc: Arc::clone(self),
            key,
            entry: Arc::clone(&entry),
            exchange,
        };
        let credential = ApiCredential::refreshable(entry.issued_token(), Arc::new(refresher));
        Bootstrap {
            entry,
            credential: Arc::new(credential),
        }
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }
}

/// Re-runs the token exchange and writes the new token back to the cached
/// entry, so later requests do not start from the rejected token.
struct CachingRefresher {
    svc: Arc<Service>,
    key: String,
    entry: Arc<BootstrapEntry>,
    exchange: ExchangeRefresher,
}

#[async_trait]
impl CredentialRefresher for CachingRefresher {
    async fn refresh(&self) -> Result<IssuedToken, DispatchError> {
        let issued = self.exchange.refresh().await?;
        let refreshed = BootstrapEntry {
            token: issued.token.expose_secret().to_owned(),
            expires_at: issued.expires_at,
            ..(*self.entry).clone()
        };
        self.svc.write_cache(&self.key, &refreshed).await;
        Ok(issued)
    }
}
