//! Domain layer for the workspace resolver.

pub mod local_client;
pub mod providers;
pub mod service;

pub use local_client::WorkspaceResolverLocalClient;
pub use providers::{CookieSessionProvider, HeaderSubjectSelector};
pub use service::Service;
