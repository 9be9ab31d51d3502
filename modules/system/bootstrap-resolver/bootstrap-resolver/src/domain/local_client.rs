//! Local (in-process) client for the bootstrap resolver.

use std::sync::Arc;

use async_trait::async_trait;
use bootstrap_resolver_sdk::{
    Bootstrap, BootstrapRequest, BootstrapResolverClient, BootstrapResolverError,
};
use secrecy::SecretString;

use super::Service;

/// Local client wrapping the service.
pub struct BootstrapResolverLocalClient {
    svc: Arc<Service>,
}

impl BootstrapResolverLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Service>) -> Self {
        Self { svc }
    }
}

fn log_failure(op: &str, e: &BootstrapResolverError) {
    if e.is_transport() {
        tracing::warn!(operation = op, error = %e, "bootstrap_resolver downstream unreachable");
    } else {
        tracing::error!(operation = op, error = %e, "bootstrap_resolver call failed");
    }
}

#[async_trait]
impl BootstrapResolverClient for BootstrapResolverLocalClient {
    async fn get_bootstrap(
        &self,
        session_token: &SecretString,
        request: &BootstrapRequest,
    ) -> Result<Bootstrap, BootstrapResolverError> {
        self.svc
            .get_bootstrap(session_token, request)
            .await
            .inspect_err(|e| log_failure("get_bootstrap", e))
    }

    async fn invalidate(&self, session_token: &SecretString, subject_account_id: Option<&str>) {
        self.svc.invalidate(session_token, subject_account_id).await;
    }
}
