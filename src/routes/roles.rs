//! One landing page per portal role.

use axum::{extract::State, Extension};
use minijinja::context;

use super::{HandlerSet, RouteError};
use crate::error::ApiError;
use crate::session::SessionHandle;
use crate::state::AppState;

pub const ADMIN: &str = "./src/routes/admin";
pub const TEACHER: &str = "./src/routes/teacher";
pub const STUDENT: &str = "./src/routes/student";
pub const PARENT: &str = "./src/routes/parent";
pub const JOBS: &str = "./src/routes/jobs";

pub fn admin() -> Result<HandlerSet, RouteError> {
    role_module(ADMIN, "Admin Home", "Admin")
}

pub fn teacher() -> Result<HandlerSet, RouteError> {
    role_module(TEACHER, "Teacher Home", "Teacher")
}

pub fn student() -> Result<HandlerSet, RouteError> {
    role_module(STUDENT, "Student Home", "Student")
}

pub fn parent() -> Result<HandlerSet, RouteError> {
    role_module(PARENT, "Parent Home", "Parent")
}

pub fn jobs() -> Result<HandlerSet, RouteError> {
    role_module(JOBS, "Jobs", "Jobs Board")
}

fn role_module(module: &'static str, title: &'static str, who: &'static str) -> Result<HandlerSet, RouteError> {
    HandlerSet::new(module)
        .get(
            "/",
            move |State(state): State<AppState>, Extension(session): Extension<SessionHandle>| async move {
                let user = session.user().await;
                state
                    .views
                    .render("page.html", context! { title, who, user })
                    .map_err(ApiError::from)
            },
        )
        .validate()
}
