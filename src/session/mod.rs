//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! login (CLI / embedding app)
//!     → SessionStore::login → ArcSwap<Session> + KeyValueStore (kv.rs)
//!
//! every outgoing request
//!     → AuthLayer reads SessionProvider::current()
//!
//! unauthorized response
//!     → SessionExpiredHandler (expiry.rs)
//!     → SessionStore::teardown + Navigator::redirect_to_login
//! ```
//!
//! # Design Decisions
//! - Reads are lock-free snapshots; writes replace the whole session
//! - The in-memory snapshot is authoritative even if persisting fails

pub mod expiry;
pub mod kv;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub use expiry::{
    login_target, ExpiryContext, IgnoreExpiry, LogNavigator, Navigator, SessionExpiredHandler,
    TeardownAndRedirect,
};
pub use kv::{FileStore, KeyValueStore, MemoryStore, StoreError};

/// Client-held credential plus its expiry time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: Option<String>,
    /// Unix timestamp (seconds).
    #[serde(alias = "expiredAt")]
    pub expired_at: Option<i64>,
}

impl Session {
    pub fn new(token: impl Into<String>, expired_at: Option<i64>) -> Self {
        Self {
            token: Some(token.into()),
            expired_at,
        }
    }

    /// True when a non-empty token is held.
    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// True when an expiry is known and has passed.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expired_at.is_some_and(|at| at <= now)
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Synchronous source of the current session, read on every request.
pub trait SessionProvider: Send + Sync {
    fn current(&self) -> Session;
}

/// Provider for clients that never authenticate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl SessionProvider for Anonymous {
    fn current(&self) -> Session {
        Session::default()
    }
}

/// Session state shared between the pipeline and login/logout actions.
pub struct SessionStore {
    current: ArcSwap<Session>,
    backend: Arc<dyn KeyValueStore>,
    key: String,
}

impl SessionStore {
    /// Empty, non-persistent store.
    pub fn in_memory() -> Self {
        Self {
            current: ArcSwap::from_pointee(Session::default()),
            backend: Arc::new(MemoryStore::new()),
            key: "session".to_string(),
        }
    }

    /// Restore the session persisted under `key`. A value that no longer
    /// parses is discarded and the store starts logged out.
    pub fn load(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Result<Self, StoreError> {
        let key = key.into();
        let session = match backend.get(&key)? {
            Some(raw) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Discarding unreadable persisted session");
                    Session::default()
                }
            },
            None => Session::default(),
        };

        Ok(Self {
            current: ArcSwap::from_pointee(session),
            backend,
            key,
        })
    }

    /// Snapshot of the current session.
    pub fn snapshot(&self) -> Arc<Session> {
        self.current.load_full()
    }

    /// Store a freshly issued credential.
    pub fn login(&self, token: impl Into<String>, expired_at: Option<i64>) -> Result<(), StoreError> {
        let session = Session::new(token, expired_at);
        let raw = serde_json::to_string(&session)?;
        self.current.store(Arc::new(session));
        self.backend.set(&self.key, &raw)?;
        tracing::info!(expired_at = ?expired_at, "Session stored");
        Ok(())
    }

    /// Explicit logout.
    pub fn logout(&self) -> Result<(), StoreError> {
        self.current.store(Arc::new(Session::default()));
        self.backend.remove(&self.key)?;
        tracing::info!("Session cleared");
        Ok(())
    }

    /// Clear after the server rejected the session. Persistence failures are
    /// logged, not returned: the in-memory session is already gone.
    pub fn teardown(&self) {
        self.current.store(Arc::new(Session::default()));
        if let Err(e) = self.backend.remove(&self.key) {
            tracing::error!(error = %e, "Failed to remove persisted session during teardown");
        }
    }
}

impl SessionProvider for SessionStore {
    fn current(&self) -> Session {
        self.current.load().as_ref().clone()
    }
}
