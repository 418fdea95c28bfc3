use std::collections::HashMap;
use std::panic;

use thiserror::Error;
use tracing::warn;

use super::{auth, roles, HandlerSet};

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route module '{0}' is not registered")]
    Unresolved(String),

    #[error("route module '{module}' is malformed: {reason}")]
    Malformed { module: String, reason: String },

    #[error("route module '{0}' panicked while loading")]
    Panicked(String),
}

/// Builds a module's handler set.
pub type ModuleLoader = fn() -> Result<HandlerSet, RouteError>;

/// Outcome of resolving a module identifier.
pub enum ResolvedRoutes {
    Real(HandlerSet),
    Placeholder(String),
}

impl ResolvedRoutes {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, ResolvedRoutes::Placeholder(_))
    }

    pub fn module(&self) -> &str {
        match self {
            ResolvedRoutes::Real(set) => set.module(),
            ResolvedRoutes::Placeholder(module) => module,
        }
    }

    pub fn into_handler_set(self) -> HandlerSet {
        match self {
            ResolvedRoutes::Real(set) => set,
            ResolvedRoutes::Placeholder(module) => HandlerSet::placeholder(module),
        }
    }
}

/// Maps module identifiers to their loaders.
///
/// Resolution happens once at startup. A module that is unknown, fails to
/// build or fails validation is replaced by a placeholder so the rest of the
/// portal still comes up.
#[derive(Default, Clone)]
pub struct RouteRegistry {
    loaders: HashMap<String, ModuleLoader>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every route module shipped with the portal.
    pub fn builtin() -> Self {
        Self::new()
            .register(auth::MODULE, auth::module)
            .register(roles::ADMIN, roles::admin)
            .register(roles::TEACHER, roles::teacher)
            .register(roles::STUDENT, roles::student)
            .register(roles::PARENT, roles::parent)
            .register(roles::JOBS, roles::jobs)
    }

    pub fn register(mut self, module: impl Into<String>, loader: ModuleLoader) -> Self {
        self.loaders.insert(module.into(), loader);
        self
    }

    pub fn without(mut self, module: &str) -> Self {
        self.loaders.remove(module);
        self
    }

    pub fn contains(&self, module: &str) -> bool {
        self.loaders.contains_key(module)
    }

    /// Resolve `module` to its handler set, or to a placeholder. Never fails.
    pub fn resolve(&self, module: &str) -> ResolvedRoutes {
        match self.load(module) {
            Ok(set) => ResolvedRoutes::Real(set),
            Err(e) => {
                warn!(module, error = %e, "Route not available; mounting a placeholder");
                ResolvedRoutes::Placeholder(module.to_string())
            }
        }
    }

    fn load(&self, module: &str) -> Result<HandlerSet, RouteError> {
        let loader = self
            .loaders
            .get(module)
            .ok_or_else(|| RouteError::Unresolved(module.to_string()))?;
        let set = panic::catch_unwind(*loader).map_err(|_| RouteError::Panicked(module.to_string()))??;
        set.validate()
    }
}
