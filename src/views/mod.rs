use axum::response::Html;
use minijinja::Environment;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to render view '{view}': {source}")]
pub struct RenderError {
    pub view: String,
    #[source]
    pub source: minijinja::Error,
}

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("layout.html", include_str!("../../templates/layout.html")),
    ("index.html", include_str!("../../templates/index.html")),
    ("page.html", include_str!("../../templates/page.html")),
    ("404.html", include_str!("../../templates/404.html")),
];

/// Page templates shared by every handler set.
pub struct Views {
    env: Environment<'static>,
}

impl Views {
    /// The templates shipped with the portal.
    pub fn builtin(site_name: &str) -> Result<Self, RenderError> {
        let mut views = Self::empty(site_name);
        for &(name, source) in BUILTIN_TEMPLATES {
            views.env.add_template(name, source).map_err(|source| RenderError {
                view: name.to_string(),
                source,
            })?;
        }
        Ok(views)
    }

    /// No templates at all; every render fails.
    pub fn empty(site_name: &str) -> Self {
        let mut env = Environment::new();
        env.add_global("site_name", site_name.to_string());
        Self { env }
    }

    pub fn render<S: Serialize>(&self, view: &str, context: S) -> Result<Html<String>, RenderError> {
        let failed = |source| RenderError {
            view: view.to_string(),
            source,
        };
        let template = self.env.get_template(view).map_err(failed)?;
        template.render(context).map(Html).map_err(failed)
    }
}
