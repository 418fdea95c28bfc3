use std::sync::Arc;

use crate::session::SessionGate;
use crate::store::DocumentStore;
use crate::views::Views;

/// Process-scoped components, created at startup and handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: DocumentStore,
    pub sessions: Arc<SessionGate>,
    pub views: Arc<Views>,
}
