#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Bootstrap Resolver SDK
//!
//! This crate provides the public API for the `bootstrap_resolver` module:
//!
//! - [`BootstrapResolverClient`] - Public API trait for consumers
//! - [`BootstrapEntry`] - Cached bootstrap payload (credential + entitlements)
//! - [`Bootstrap`] - Entry paired with a refreshable API credential
//! - [`BootstrapResolverError`] - Error types
//!
//! ## Usage
//!
//! ```ignore
//! use bootstrap_resolver_sdk::{BootstrapRequest, BootstrapResolverClient};
//!
//! let bootstrap = resolver
//!     .get_bootstrap(&session_token, &BootstrapRequest::actor().with_delegates())
//!     .await?;
//!
//! let plan = bootstrap.entry.account.plan_type;
//! let credential = &bootstrap.credential;
//! ```

pub mod api;
pub mod error;
pub mod models;

pub use api::BootstrapResolverClient;
pub use error::BootstrapResolverError;
pub use models::{
    AgencyCustomer, Bootstrap, BootstrapEntry, BootstrapRequest, DelegateStatus, Entitlements,
    TokenExchangeResponse,
};
