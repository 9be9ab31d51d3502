//! Cache key derivation and TTL policy.

use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::config::BootstrapCacheConfig;

/// Trimmed subject id; blank ids mean "the actor".
#[must_use]
pub fn normalize_subject(subject: Option<&str>) -> Option<&str> {
    subject.map(str::trim).filter(|s| !s.is_empty())
}

/// `bootstrap:{env}:{sha256(sessionToken + ":" + subject)}`.
///
/// The session token never appears in the key itself.
#[must_use]
pub fn cache_key(environment: &str, session_token: &SecretString, subject: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session_token.expose_secret().as_bytes());
    hasher.update(b":");
    hasher.update(normalize_subject(subject).unwrap_or_default().as_bytes());
    format!("bootstrap:{environment}:{}", hex::encode(hasher.finalize()))
}

/// TTL for an entry whose credential expires at `expires_at`:
/// `min(max_ttl, seconds_until_expiry - expiry_buffer)`.
///
/// `None` when that value is below `min_ttl` (or not positive), in which
/// case the entry must not be cached.
#[must_use]
pub fn cache_ttl(
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    config: &BootstrapCacheConfig,
) -> Option<Duration> {
    let remaining = expires_at.signed_duration_since(now).num_seconds();
    let buffer = i64::try_from(config.expiry_buffer_secs).unwrap_or(i64::MAX);
    let usable = u64::try_from(remaining.saturating_sub(buffer)).ok()?;
    let ttl = Duration::from_secs(usable).min(config.max_ttl());
    (!ttl.is_zero() && ttl >= config.min_ttl()).then_some(ttl)
}
