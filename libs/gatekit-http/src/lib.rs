#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Authenticated request dispatcher shared by every downstream API call.
//!
//! - [`Dispatcher`] - timeout profiles, trace ids, single retry after a
//!   credential refresh, schema validation of response bodies
//! - [`ApiCredential`] - bearer token that can refresh itself in place
//! - [`DispatchError`] - transport / API / schema error taxonomy
//!
//! ## Usage
//!
//! ```ignore
//! let dispatcher = Dispatcher::new(DispatcherConfig::default())?;
//!
//! let sites: SiteList = dispatcher
//!     .dispatch(
//!         DispatchRequest::get("/sites", TimeoutProfile::List)
//!             .credential(&credential)
//!             .trace_id(&trace_id),
//!     )
//!     .await?;
//! ```

pub mod config;
pub mod credential;
pub mod dispatcher;
pub mod error;
pub mod trace;

pub use config::{DispatcherConfig, TimeoutProfile};
pub use credential::{ApiCredential, CredentialRefresher, IssuedToken};
pub use dispatcher::{DispatchRequest, Dispatcher};
pub use error::{DispatchError, TIMEOUT_STATUS, UNREACHABLE_STATUS};
pub use trace::TraceId;
