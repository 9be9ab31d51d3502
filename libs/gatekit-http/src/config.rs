//! Configuration for the request dispatcher.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

/// Default upper bound for any single downstream call.
const DEFAULT_TIMEOUT_CEILING_MS: u64 = 15_000;

/// Dispatcher configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatcherConfig {
    /// Base URL of the downstream API, e.g. `https://api.example.com/v1`.
    pub base_url: String,

    /// Global ceiling in milliseconds. Every timeout profile is capped by it
    /// and the mutation profile uses it as-is.
    pub timeout_ceiling_ms: u64,

    /// Outbound header carrying the trace id.
    pub trace_header: String,

    /// `User-Agent` sent with every call.
    pub user_agent: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_owned(),
            timeout_ceiling_ms: DEFAULT_TIMEOUT_CEILING_MS,
            trace_header: "x-trace-id".to_owned(),
            user_agent: concat!("gatekit/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl DispatcherConfig {
    /// Effective timeout for `profile`: `min(ceiling, profile default)`.
    #[must_use]
    pub fn timeout_for(&self, profile: TimeoutProfile) -> Duration {
        let ms = profile
            .default_ms()
            .map_or(self.timeout_ceiling_ms, |ms| ms.min(self.timeout_ceiling_ms));
        Duration::from_millis(ms)
    }
}

/// Named timeout budgets, one per kind of downstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutProfile {
    AuthExchange,
    Bootstrap,
    Metadata,
    List,
    Detail,
    /// Always the configured ceiling.
    Mutation,
}

impl TimeoutProfile {
    /// Budget before the ceiling is applied. `None` means "use the ceiling".
    #[must_use]
    pub const fn default_ms(self) -> Option<u64> {
        match self {
            Self::AuthExchange => Some(6_000),
            Self::Bootstrap | Self::Metadata => Some(8_000),
            Self::List => Some(7_500),
            Self::Detail => Some(10_000),
            Self::Mutation => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthExchange => "auth_exchange",
            Self::Bootstrap => "bootstrap",
            Self::Metadata => "metadata",
            Self::List => "list",
            Self::Detail => "detail",
            Self::Mutation => "mutation",
        }
    }
}

impl fmt::Display for TimeoutProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn profiles_use_their_defaults_under_a_generous_ceiling() {
        let cfg = DispatcherConfig::default();

        assert_eq!(
            cfg.timeout_for(TimeoutProfile::AuthExchange),
            Duration::from_millis(6_000)
        );
        assert_eq!(
            cfg.timeout_for(TimeoutProfile::Bootstrap),
            Duration::from_millis(8_000)
        );
        assert_eq!(
            cfg.timeout_for(TimeoutProfile::Metadata),
            Duration::from_millis(8_000)
        );
        assert_eq!(
            cfg.timeout_for(TimeoutProfile::List),
            Duration::from_millis(7_500)
        );
        assert_eq!(
            cfg.timeout_for(TimeoutProfile::Detail),
            Duration::from_millis(10_000)
        );
        assert_eq!(
            cfg.timeout_for(TimeoutProfile::Mutation),
            Duration::from_millis(DEFAULT_TIMEOUT_CEILING_MS)
        );
    }

    #[test]
    fn ceiling_caps_every_profile() {
        let cfg = DispatcherConfig {
            timeout_ceiling_ms: 7_000,
            ..DispatcherConfig::default()
        };

        assert_eq!(
            cfg.timeout_for(TimeoutProfile::AuthExchange),
            Duration::from_millis(6_000)
        );
        assert_eq!(
            cfg.timeout_for(TimeoutProfile::List),
            Duration::from_millis(7_000)
        );
        assert_eq!(
            cfg.timeout_for(TimeoutProfile::Detail),
            Duration::from_millis(7_000)
        );
        assert_eq!(
            cfg.timeout_for(TimeoutProfile::Mutation),
            Duration::from_millis(7_000)
        );
    }

    #[test]
    fn config_rejects_unknown_fields() {
        let parsed = serde_json::from_value::<DispatcherConfig>(serde_json::json!({
            "base_url": "https://api.example.com",
            "retries": 3
        }));
        assert!(parsed.is_err());
    }
}
