//! Prefix dispatch over mounted handler sets.
//!
//! Mounts are kept in the order they were added. A request goes to the first
//! mount whose prefix covers its path and that has a route for it; when no
//! mount answers, the 404 page is rendered. Mounting a prefix a second time
//! stacks the new set on top of the existing mount: for any sub-path both
//! sets define, the later one answers, while sub-paths only the earlier set
//! defines keep working.
//!
//! Every mount answers `GET <prefix>/health` itself, before any handler set
//! is consulted, so liveness never depends on a module or on the store.

mod guard;

use std::sync::Arc;

use axum::{
    extract::Request,
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    Router,
};
use minijinja::context;
use serde_json::json;
use tracing::{info, warn};

use crate::routes::{home, normalize, HandlerSet, RouteRegistry};
use crate::state::AppState;
use crate::views::Views;

pub struct Dispatcher {
    mounts: Vec<Mount>,
}

struct Mount {
    prefix: String,
    /// Newest last.
    sets: Vec<HandlerSet>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self { mounts: Vec::new() }
    }

    /// Home page at the root, then every `(prefix, module)` of `plan` in order.
    pub fn from_plan(registry: &RouteRegistry, plan: &[(&str, &str)]) -> Self {
        let mut dispatcher = Self::new().mount("/", home::handler_set());
        for &(prefix, module) in plan {
            let resolved = registry.resolve(module);
            info!(
                prefix,
                module,
                placeholder = resolved.is_placeholder(),
                "Mounting route module"
            );
            dispatcher = dispatcher.mount(prefix, resolved.into_handler_set());
        }
        dispatcher
    }

    pub fn mount(mut self, prefix: &str, set: HandlerSet) -> Self {
        let prefix = normalize_prefix(prefix);
        match self.mounts.iter_mut().find(|mount| mount.prefix == prefix) {
            Some(mount) => mount.sets.push(set),
            None => self.mounts.push(Mount {
                prefix,
                sets: vec![set],
            }),
        }
        self
    }

    /// Mounted prefixes in precedence order.
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.mounts.iter().map(|mount| mount.prefix.as_str())
    }

    pub async fn dispatch(&self, state: AppState, request: Request) -> Response {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        for mount in &self.mounts {
            let Some(sub_path) = mount.sub_path(&path) else {
                continue;
            };
            let sub_path = normalize(sub_path);

            if sub_path == "/health" && (method == Method::GET || method == Method::HEAD) {
                return health(mount.service());
            }

            let route = mount
                .sets
                .iter()
                .rev()
                .find_map(|set| set.find(&method, sub_path));
            if let Some(route) = route {
                return guard::seal(route.call(state, request).await);
            }
        }

        let url = request
            .uri()
            .path_and_query()
            .map_or(path.as_str(), |pq| pq.as_str());
        not_found(&state.views, url)
    }

    /// A router that sends every request through `dispatch`.
    pub fn into_router(self, state: AppState) -> Router {
        let dispatcher = Arc::new(self);
        Router::new().fallback(move |request: Request| {
            let dispatcher = Arc::clone(&dispatcher);
            let state = state.clone();
            async move { dispatcher.dispatch(state, request).await }
        })
    }
}

impl Mount {
    fn sub_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.prefix == "/" {
            return Some(path);
        }
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }

    /// Name reported by the health check; the root mount has none.
    fn service(&self) -> Option<&str> {
        self.prefix.strip_prefix('/').filter(|name| !name.is_empty())
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    format!("/{}", trimmed)
}

fn health(service: Option<&str>) -> Response {
    let body = match service {
        Some(service) => json!({ "ok": true, "service": service }),
        None => json!({ "ok": true }),
    };
    (StatusCode::OK, Json(body)).into_response()
}

fn not_found(views: &Views, url: &str) -> Response {
    match views.render("404.html", context! { url }) {
        Ok(page) => (StatusCode::NOT_FOUND, page).into_response(),
        Err(e) => {
            warn!(error = %e, "404 view failed; falling back to plain text");
            (StatusCode::NOT_FOUND, "404 Not Found").into_response()
        }
    }
}
