use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;
use tracing::warn;

use super::{CurrentUser, Session, SessionGate};

/// Request-scoped view of the caller's session.
///
/// Inserted into request extensions by [`session_middleware`]; handlers take
/// it with `Extension<SessionHandle>`. Login and logout go through here so the
/// middleware can emit the matching `Set-Cookie` on the way out.
#[derive(Clone)]
pub struct SessionHandle {
    gate: Arc<SessionGate>,
    slot: Arc<Mutex<Slot>>,
}

struct Slot {
    session: Option<Session>,
    cookie: CookieChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CookieChange {
    Keep,
    Refresh,
    Clear,
}

impl SessionHandle {
    fn new(gate: Arc<SessionGate>, session: Option<Session>, cookie: CookieChange) -> Self {
        Self {
            gate,
            slot: Arc::new(Mutex::new(Slot { session, cookie })),
        }
    }

    /// User reference of the current session, `None` when anonymous.
    pub async fn user(&self) -> Option<String> {
        self.slot.lock().await.session.as_ref().map(|s| s.user_ref.clone())
    }

    /// Start a session for `user_ref`. Any session the request already had is
    /// destroyed so the id changes on every login.
    pub async fn login(&self, user_ref: impl Into<String>) -> Session {
        let mut slot = self.slot.lock().await;
        if let Some(previous) = slot.session.take() {
            self.gate.destroy(&previous.id).await;
        }
        let session = self.gate.create(user_ref).await;
        slot.session = Some(session.clone());
        slot.cookie = CookieChange::Refresh;
        session
    }

    /// End the current session. Returns false when there was none.
    pub async fn logout(&self) -> bool {
        let mut slot = self.slot.lock().await;
        slot.cookie = CookieChange::Clear;
        match slot.session.take() {
            Some(session) => self.gate.destroy(&session.id).await,
            None => false,
        }
    }
}

/// Resolve the session cookie before the request runs and write the cookie
/// back afterwards.
pub async fn session_middleware(
    State(gate): State<Arc<SessionGate>>,
    mut request: Request,
    next: Next,
) -> Response {
    let (session, cookie) = match gate.current_user(request.headers()).await {
        CurrentUser::Anonymous => (None, CookieChange::Keep),
        CurrentUser::Stale => (None, CookieChange::Clear),
        CurrentUser::Authenticated(session) => (Some(session), CookieChange::Refresh),
    };

    let handle = SessionHandle::new(Arc::clone(&gate), session, cookie);
    request.extensions_mut().insert(handle.clone());

    let mut response = next.run(request).await;

    let slot = handle.slot.lock().await;
    let header = match (slot.cookie, &slot.session) {
        (CookieChange::Refresh, Some(session)) => Some(gate.cookie().issue(&session.id)),
        (CookieChange::Clear, _) => Some(gate.cookie().clear()),
        _ => None,
    };
    match header {
        Some(Ok(value)) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Some(Err(e)) => warn!(error = %e, "could not encode session cookie"),
        None => {}
    }

    response
}
