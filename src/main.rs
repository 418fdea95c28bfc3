use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use school_portal::config::{AppConfig, Environment};
use school_portal::dispatch::Dispatcher;
use school_portal::routes::{RouteRegistry, MOUNT_PLAN};
use school_portal::server;
use school_portal::session::SessionGate;
use school_portal::state::AppState;
use school_portal::store::DocumentStore;
use school_portal::views::Views;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up PORT, SESSION_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();
    tracing::info!("Starting school portal in {:?} mode", config.environment);
    if config.uses_default_secret() && config.environment != Environment::Development {
        tracing::warn!("SESSION_SECRET is not set; session cookies are signed with the development secret");
    }

    // The store must be usable before anything is served.
    let store = DocumentStore::from_config(&config.store);
    let outcome = store
        .initialize()
        .await
        .with_context(|| format!("failed to initialize store at {}", store.path().display()))?;
    store.read().await.context("failed to load store")?;
    tracing::info!(path = %store.path().display(), ?outcome, "Document store ready");

    let sessions = Arc::new(SessionGate::new(&config.session).context("failed to set up sessions")?);
    let sweeper = config
        .session
        .sweep_interval()
        .map(|every| sessions.spawn_sweeper(every));

    let views = Views::builtin(&config.server.site_name).context("failed to load views")?;

    let state = AppState {
        store: store.clone(),
        sessions: Arc::clone(&sessions),
        views: Arc::new(views),
    };
    let dispatcher = Dispatcher::from_plan(&RouteRegistry::builtin(), MOUNT_PLAN);
    let app = server::router(state, dispatcher, &config);

    let addr = config.bind_addr().context("invalid HOST/PORT")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("School portal listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(server::shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Shutting down");
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    sessions.clear().await;
    store.commit().await.context("failed to flush store on shutdown")?;
    Ok(())
}
