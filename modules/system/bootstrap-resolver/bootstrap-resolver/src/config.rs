//! Configuration for the bootstrap resolver.

use std::time::Duration;

use serde::Deserialize;

/// Bootstrap cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapCacheConfig {
    /// Deployment environment; namespaces every cache key so caches are
    /// never shared across environments.
    pub environment: String,

    /// Upper bound for the TTL of a cached entry.
    pub max_ttl_secs: u64,

    /// Safety margin subtracted from the remaining credential lifetime.
    pub expiry_buffer_secs: u64,

    /// Entries whose computed TTL falls below this are not cached at all.
    pub min_ttl_secs: u64,
}

impl Default for BootstrapCacheConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_owned(),
            max_ttl_secs: 300,
            expiry_buffer_secs: 60,
            min_ttl_secs: 30,
        }
    }
}

impl BootstrapCacheConfig {
    #[must_use]
    pub const fn max_ttl(&self) -> Duration {
        Duration::from_secs(self.max_ttl_secs)
    }

    #[must_use]
    pub const fn min_ttl(&self) -> Duration {
        Duration::from_secs(self.min_ttl_secs)
    }
}
