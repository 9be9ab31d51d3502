//! Workspace Resolver Module
//!
//! Builds the [`workspace_resolver_sdk::AuthorizationContext`] of an inbound
//! request: the signed-in actor, the optional delegated subject it acts on,
//! and the billing gates derived from both.
//!
//! The axum integration in [`request`] resolves the context at most once per
//! request and exposes it through two extractors:
//!
//! - [`Authorization`] - soft, never rejects
//! - [`RequiredAuthorization`] - requires a signed-in user with a usable
//!   credential, rejecting with a problem response or a sign-in redirect
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;
pub mod problem;
pub mod request;

pub use config::WorkspaceResolverConfig;
pub use domain::{
    CookieSessionProvider, HeaderSubjectSelector, Service, WorkspaceResolverLocalClient,
};
pub use problem::Problem;
pub use request::{
    Authorization, AuthorizationRejection, AuthorizationState, RequestAuthorization,
    RequiredAuthorization, authorization_middleware,
};
