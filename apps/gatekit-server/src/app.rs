//! Wires the resolvers together from configuration.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use bootstrap_resolver::{BootstrapResolverLocalClient, InMemoryBootstrapStore, TokenExchangeClient};
use gatekit_http::Dispatcher;
use workspace_resolver::{
    AuthorizationState, CookieSessionProvider, HeaderSubjectSelector, WorkspaceResolverLocalClient,
};

use crate::config::AppConfig;
use crate::routes;

/// Build the application router.
///
/// # Errors
///
/// When the dispatcher or a configured header name is invalid.
pub fn build(config: &AppConfig) -> anyhow::Result<Router> {
    let dispatcher =
        Dispatcher::new(config.dispatcher.clone()).context("invalid dispatcher configuration")?;
    let exchange = TokenExchangeClient::new(Arc::new(dispatcher));

    let bootstrap = Arc::new(bootstrap_resolver::Service::new(
        exchange,
        Arc::new(InMemoryBootstrapStore::new()),
        config.bootstrap_cache.clone(),
    ));
    let bootstrap = Arc::new(BootstrapResolverLocalClient::new(bootstrap));

    let resolver_config = &config.workspace_resolver;
    let subjects = HeaderSubjectSelector::new(
        &resolver_config.subject_header,
        resolver_config.subject_cookie.clone(),
    )
    .context("invalid workspace_resolver.subject_header")?;
    let workspace = Arc::new(workspace_resolver::Service::new(
        bootstrap,
        Arc::new(CookieSessionProvider::new(
            resolver_config.session_cookie.clone(),
        )),
        Arc::new(subjects),
        resolver_config,
    ));

    let state = AuthorizationState::new(
        Arc::new(WorkspaceResolverLocalClient::new(workspace)),
        &config.dispatcher.trace_header,
        resolver_config,
    )
    .context("invalid dispatcher.trace_header")?;

    Ok(routes::router(state))
}
