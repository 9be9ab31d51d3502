#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Workspace Resolver SDK
//!
//! This crate provides the public API for the `workspace_resolver` module:
//!
//! - [`WorkspaceResolverClient`] - Resolves the authorization context of a request
//! - [`SessionProvider`] / [`SubjectSelector`] - Seams to the identity provider
//!   and to the "act as" selection carried by the request
//! - [`AuthorizationContext`] / [`ResolvedWorkspace`] - Resolved actor and subject
//! - [`AuthorizationError`] - Why a context could not be required
//!
//! ## Usage
//!
//! ```ignore
//! use gatekit_entitlements::{HasCheck, PlanType};
//!
//! let context = resolver.resolve(&request_meta).await;
//! if context.has(&HasCheck::Plan(vec![PlanType::Pro, PlanType::Agency])) {
//!     // ...
//! }
//!
//! let workspace = context.require()?;
//! let credential = workspace.credential();
//! ```

pub mod api;
pub mod error;
pub mod models;

pub use api::{SessionProvider, SubjectSelector, WorkspaceResolverClient};
pub use error::{AuthorizationError, SessionError};
pub use models::{
    AuthorizationContext, BillingIssue, BillingScope, RequestMeta, ResolvedWorkspace, Session,
};
