use axum::{
    extract::State,
    response::Html,
    Extension,
};
use minijinja::context;
use serde::Serialize;
use tracing::warn;

use super::HandlerSet;
use crate::error::ApiError;
use crate::session::SessionHandle;
use crate::state::AppState;

pub const MODULE: &str = "home";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeStats {
    pub user_count: usize,
}

pub fn handler_set() -> HandlerSet {
    HandlerSet::new(MODULE).get("/", home)
}

/// GET / - landing page. Stats come from a fresh read of the store and are
/// left out when the store cannot be read.
pub async fn home(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
) -> Result<Html<String>, ApiError> {
    let stats = match state.store.read().await {
        Ok(()) => Some(HomeStats {
            user_count: state.store.snapshot().await.users.len(),
        }),
        Err(e) => {
            warn!(error = %e, "Store read failed; rendering home without stats");
            None
        }
    };
    let user = session.user().await;

    Ok(state.views.render("index.html", context! { user, stats })?)
}
