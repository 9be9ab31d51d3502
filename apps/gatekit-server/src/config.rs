//! Server configuration.
//!
//! Layered lowest to highest: built-in defaults, an optional YAML file,
//! then `GATEKIT__`-prefixed environment variables with `__` separating
//! nested keys (`GATEKIT__DISPATCHER__BASE_URL`).

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use anyhow::Context;
use bootstrap_resolver::BootstrapCacheConfig;
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use gatekit_http::DispatcherConfig;
use serde::Deserialize;
use workspace_resolver::WorkspaceResolverConfig;

pub const ENV_PREFIX: &str = "GATEKIT__";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub dispatcher: DispatcherConfig,
    pub bootstrap_cache: BootstrapCacheConfig,
    pub workspace_resolver: WorkspaceResolverConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8087)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Text,
        }
    }
}

impl AppConfig {
    /// Load the configuration from `path` (if any) and the environment.
    ///
    /// # Errors
    ///
    /// When the file cannot be parsed or a value has the wrong shape.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            anyhow::ensure!(path.exists(), "config file {} not found", path.display());
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("invalid configuration")
    }
}
