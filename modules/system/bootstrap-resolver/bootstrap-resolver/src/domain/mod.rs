//! Domain layer for the bootstrap resolver.

pub mod cache;
pub mod exchange;
pub mod local_client;
pub mod service;

pub use exchange::{ExchangeRefresher, TokenExchangeClient};
pub use local_client::BootstrapResolverLocalClient;
pub use service::Service;
