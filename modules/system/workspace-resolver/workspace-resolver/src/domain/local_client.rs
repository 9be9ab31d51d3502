//! Local (in-process) client for the workspace resolver.

use std::sync::Arc;

use async_trait::async_trait;
use workspace_resolver_sdk::{AuthorizationContext, RequestMeta, WorkspaceResolverClient};

use super::Service;

/// Local client wrapping the service.
pub struct WorkspaceResolverLocalClient {
    svc: Arc<Service>,
}

impl WorkspaceResolverLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Service>) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl WorkspaceResolverClient for WorkspaceResolverLocalClient {
    async fn resolve(&self, request: &RequestMeta) -> AuthorizationContext {
        self.svc.resolve(request).await
    }
}
