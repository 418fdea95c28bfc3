//! Server-side sessions keyed by a signed cookie.

mod cookie;
mod middleware;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

pub use cookie::{InvalidSecret, PresentedCookie, SessionCookie};
pub use middleware::{session_middleware, SessionHandle};

use crate::config::SessionConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_ref: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Who a request is, as far as its session cookie says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurrentUser {
    /// No session cookie was sent.
    Anonymous,
    /// A cookie was sent but is forged, unknown or expired.
    Stale,
    Authenticated(Session),
}

impl CurrentUser {
    pub fn user_ref(&self) -> Option<&str> {
        match self {
            CurrentUser::Authenticated(session) => Some(&session.user_ref),
            CurrentUser::Anonymous | CurrentUser::Stale => None,
        }
    }
}

/// Process-wide session table.
///
/// Expiry is sliding: every successful `touch` pushes `expires_at` one TTL
/// into the future. Expired sessions are evicted when next looked up and,
/// if a sweeper is running, periodically.
pub struct SessionGate {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: chrono::Duration,
    cookie: SessionCookie,
}

impl SessionGate {
    pub fn new(config: &SessionConfig) -> Result<Self, InvalidSecret> {
        Ok(Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: to_chrono(config.ttl()),
            cookie: SessionCookie::new(config)?,
        })
    }

    /// Override the inactivity window; the cookie's `Max-Age` follows.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = to_chrono(ttl);
        self.cookie.set_max_age(ttl.as_secs());
        self
    }

    pub fn cookie(&self) -> &SessionCookie {
        &self.cookie
    }

    pub async fn create(&self, user_ref: impl Into<String>) -> Session {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().simple().to_string(),
            user_ref: user_ref.into(),
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        debug!(user = %session.user_ref, "session created");
        session
    }

    /// Look up a live session and extend it. Expired sessions are removed
    /// and reported as missing.
    pub async fn touch(&self, id: &str) -> Option<Session> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(id)?;
        if session.is_expired_at(now) {
            let expired = sessions.remove(id);
            debug!(user = ?expired.map(|s| s.user_ref), "session expired");
            return None;
        }
        session.expires_at = now + self.ttl;
        Some(session.clone())
    }

    pub async fn destroy(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    /// Resolve the request's session cookie. A live session is extended.
    pub async fn current_user(&self, headers: &HeaderMap) -> CurrentUser {
        match self.cookie.read(headers) {
            PresentedCookie::Absent => CurrentUser::Anonymous,
            PresentedCookie::Invalid => CurrentUser::Stale,
            PresentedCookie::Valid(id) => match self.touch(&id).await {
                Some(session) => CurrentUser::Authenticated(session),
                None => CurrentUser::Stale,
            },
        }
    }

    /// Drop every expired session; returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.sessions.write().await.clear();
    }

    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let gate = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = gate.sweep().await;
                if removed > 0 {
                    info!(removed, "swept expired sessions");
                }
            }
        })
    }
}

fn to_chrono(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365))
}
