//! Bootstrap Resolver Module
//!
//! Exchanges end-user sessions for scoped API credentials and entitlement
//! snapshots. Lookups read through a shared [`BootstrapStore`], concurrent
//! misses for the same key share a single downstream call, and a 403 from
//! the bootstrap endpoint degrades to a minimally entitled account.
//!
//! Provides [`BootstrapResolverLocalClient`], the in-process implementation
//! of `bootstrap_resolver_sdk::BootstrapResolverClient`.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;
pub mod store;

pub use config::BootstrapCacheConfig;
pub use domain::{BootstrapResolverLocalClient, ExchangeRefresher, Service, TokenExchangeClient};
pub use store::{BootstrapStore, InMemoryBootstrapStore, StoreError};
