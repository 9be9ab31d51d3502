//! Configuration for the workspace resolver.

use serde::Deserialize;

/// Configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceResolverConfig {
    /// Header carrying the requested "act as" account id.
    pub subject_header: String,

    /// Cookie carrying the requested "act as" account id; consulted when
    /// the header is absent.
    pub subject_cookie: String,

    /// Cookie carrying the end-user session token.
    pub session_cookie: String,

    /// Where `RequiredAuthorization` redirects signed-out users. Without it
    /// they receive a 401 problem response.
    pub sign_in_url: Option<String>,

    /// Fail the request when the downstream rejects a requested delegation
    /// (401/403) instead of falling back to the actor.
    pub strict_delegation: bool,
}

impl Default for WorkspaceResolverConfig {
    fn default() -> Self {
        Self {
            subject_header: "x-act-as-account".to_owned(),
            subject_cookie: "gk_act_as".to_owned(),
            session_cookie: "gk_session".to_owned(),
            sign_in_url: None,
            strict_delegation: false,
        }
    }
}
