// Session access for outgoing requests.
// The client only reads the current bearer token; it never refreshes or persists it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::Result;

pub const ACCESS_TOKEN_ENV: &str = "NATIVIWEB_ACCESS_TOKEN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: Option<String>,
}

/// An authenticated session issued by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user: Option<SessionUser>,
}

impl Session {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            user: None,
        }
    }
}

/// Source of the current session, consulted before every request.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn get_session(&self) -> Result<Option<Session>>;
}

/// Provider for unauthenticated use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSession;

#[async_trait]
impl SessionProvider for NoSession {
    async fn get_session(&self) -> Result<Option<Session>> {
        Ok(None)
    }
}

/// A fixed session, e.g. a token handed to the CLI.
#[derive(Debug, Clone)]
pub struct StaticSession {
    session: Session,
}

impl StaticSession {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Read the token from `NATIVIWEB_ACCESS_TOKEN`, if set.
    pub fn from_env() -> Option<Self> {
        std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .map(|token| Self::new(Session::new(token)))
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn get_session(&self) -> Result<Option<Session>> {
        Ok(Some(self.session.clone()))
    }
}

/// Session shared with the application, with change notifications.
///
/// The application owns sign-in and sign-out; the client reads whatever is
/// current at call time.
#[derive(Debug, Clone)]
pub struct SharedSession {
    tx: Arc<watch::Sender<Option<Session>>>,
}

impl SharedSession {
    pub fn new(initial: Option<Session>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn set_session(&self, session: Session) {
        self.tx.send_replace(Some(session));
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    /// Subscribe to auth state changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}

impl Default for SharedSession {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl SessionProvider for SharedSession {
    async fn get_session(&self) -> Result<Option<Session>> {
        Ok(self.current())
    }
}
