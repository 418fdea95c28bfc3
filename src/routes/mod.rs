//! Route modules and the handler-set abstraction the dispatcher mounts.

pub mod auth;
pub mod home;
pub mod registry;
pub mod roles;

use std::collections::HashSet;
use std::convert::Infallible;

use axum::{
    extract::Request,
    handler::Handler,
    http::{Method, StatusCode},
    response::Response,
    routing::{self, MethodRouter},
};
use tower::ServiceExt;

pub use registry::{ModuleLoader, ResolvedRoutes, RouteError, RouteRegistry};

use crate::state::AppState;

/// Prefix and module for every role group, in mount order.
///
/// `/jobs` is mounted twice: the employment module was never written, so its
/// placeholder goes in first and the jobs module mounted after it answers its
/// own paths.
pub const MOUNT_PLAN: &[(&str, &str)] = &[
    ("/", auth::MODULE),
    ("/admin", roles::ADMIN),
    ("/teacher", roles::TEACHER),
    ("/student", roles::STUDENT),
    ("/parent", roles::PARENT),
    ("/jobs", "./src/routes/employment"),
    ("/jobs", roles::JOBS),
];

/// A named group of routes, relative to wherever it gets mounted.
pub struct HandlerSet {
    module: String,
    routes: Vec<Route>,
}

pub(crate) struct Route {
    method: Option<Method>,
    path: RoutePath,
    service: MethodRouter<AppState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RoutePath {
    Exact(String),
    Any,
}

impl HandlerSet {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            routes: Vec::new(),
        }
    }

    /// Stand-in for a module that could not be loaded: every request under
    /// the mount prefix gets `501` naming the module.
    pub fn placeholder(module: impl Into<String>) -> Self {
        let module = module.into();
        let message = format!("Route \"{}\" is not implemented yet.", module);
        Self::new(module).fallback(move || {
            let message = message.clone();
            async move { (StatusCode::NOT_IMPLEMENTED, message) }
        })
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn get<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        self.push(Some(Method::GET), RoutePath::Exact(path.to_string()), routing::get(handler))
    }

    pub fn post<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        self.push(Some(Method::POST), RoutePath::Exact(path.to_string()), routing::post(handler))
    }

    /// Answer any method on any path not matched by a more specific route.
    pub fn fallback<H, T>(self, handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        self.push(None, RoutePath::Any, routing::any(handler))
    }

    fn push(mut self, method: Option<Method>, path: RoutePath, service: MethodRouter<AppState>) -> Self {
        self.routes.push(Route { method, path, service });
        self
    }

    /// Reject sets with relative paths or two handlers for the same route.
    pub fn validate(self) -> Result<Self, RouteError> {
        let mut seen = HashSet::new();
        for route in &self.routes {
            if let RoutePath::Exact(path) = &route.path {
                if !path.starts_with('/') {
                    return Err(RouteError::Malformed {
                        module: self.module.clone(),
                        reason: format!("path '{}' must start with '/'", path),
                    });
                }
            }
            let key = (route.method.clone(), route.path.normalized());
            if !seen.insert(key) {
                return Err(RouteError::Malformed {
                    module: self.module.clone(),
                    reason: format!("duplicate route {:?}", route.path),
                });
            }
        }
        Ok(self)
    }

    /// Route for `method` on `sub_path`, exact paths first.
    pub(crate) fn find(&self, method: &Method, sub_path: &str) -> Option<&Route> {
        let sub_path = normalize(sub_path);
        let accepts = |route: &&Route| route.accepts(method);
        self.routes
            .iter()
            .filter(accepts)
            .find(|route| matches!(&route.path, RoutePath::Exact(path) if normalize(path) == sub_path))
            .or_else(|| {
                self.routes
                    .iter()
                    .filter(accepts)
                    .find(|route| route.path == RoutePath::Any)
            })
    }
}

impl Route {
    fn accepts(&self, method: &Method) -> bool {
        match &self.method {
            None => true,
            Some(m) if *m == Method::GET => *method == Method::GET || *method == Method::HEAD,
            Some(m) => m == method,
        }
    }

    pub(crate) async fn call(&self, state: AppState, request: Request) -> Response {
        let service: MethodRouter<(), Infallible> = self.service.clone().with_state(state);
        match service.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

impl RoutePath {
    fn normalized(&self) -> Option<String> {
        match self {
            RoutePath::Exact(path) => Some(normalize(path).to_string()),
            RoutePath::Any => None,
        }
    }
}

/// Ignore trailing slashes; the empty path is the root.
pub(crate) fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}
