//! Reaction to an invalid session: teardown, then send the user to login.

use std::sync::Arc;

use url::form_urlencoded;

use crate::error::UnauthorizedSource;
use crate::session::SessionStore;

/// What the pipeline knows when it decides the session is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryContext {
    pub source: UnauthorizedSource,
    /// Location to come back to after logging in again.
    pub return_path: String,
}

/// Invoked once per call that ends in an unauthorized response.
pub trait SessionExpiredHandler: Send + Sync {
    fn on_session_expired(&self, ctx: &ExpiryContext);
}

/// Navigation capability used on expiry.
pub trait Navigator: Send + Sync {
    fn redirect_to_login(&self, return_path: &str);
}

/// Default handler: clear the session store, then redirect.
pub struct TeardownAndRedirect {
    store: Arc<SessionStore>,
    navigator: Arc<dyn Navigator>,
}

impl TeardownAndRedirect {
    pub fn new(store: Arc<SessionStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self { store, navigator }
    }
}

impl SessionExpiredHandler for TeardownAndRedirect {
    fn on_session_expired(&self, ctx: &ExpiryContext) {
        self.store.teardown();
        self.navigator.redirect_to_login(&ctx.return_path);
    }
}

/// Handler that does nothing beyond the pipeline's own logging.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreExpiry;

impl SessionExpiredHandler for IgnoreExpiry {
    fn on_session_expired(&self, _ctx: &ExpiryContext) {}
}

/// Login entry point with the return path remembered as `redirect`.
///
/// ```
/// use console_gateway::session::login_target;
///
/// assert_eq!(login_target("/login", "/orders?page=2"), "/login?redirect=%2Forders%3Fpage%3D2");
/// assert_eq!(login_target("/login", ""), "/login");
/// ```
pub fn login_target(login_path: &str, return_path: &str) -> String {
    if return_path.is_empty() || return_path == "/" || is_login_route(login_path, return_path) {
        return login_path.to_string();
    }

    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("redirect", return_path)
        .finish();
    format!("{}?{}", login_path, query)
}

/// `/login`, `/login?..` and `/login/..` are the login page; `/login-logs` is not.
fn is_login_route(login_path: &str, return_path: &str) -> bool {
    match return_path.strip_prefix(login_path) {
        Some(rest) => rest.is_empty() || rest.starts_with('?') || rest.starts_with('/'),
        None => false,
    }
}

/// Navigator for headless use: logs where the user should go.
#[derive(Debug, Clone)]
pub struct LogNavigator {
    login_path: String,
}

impl LogNavigator {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
        }
    }
}

impl Navigator for LogNavigator {
    fn redirect_to_login(&self, return_path: &str) {
        tracing::warn!(
            target_path = %login_target(&self.login_path, return_path),
            "Session expired, login required"
        );
    }
}
