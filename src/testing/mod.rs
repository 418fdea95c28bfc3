//! In-process harness: a full router over a throwaway data directory.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::config::AppConfig;
use crate::dispatch::Dispatcher;
use crate::routes::{RouteRegistry, MOUNT_PLAN};
use crate::server;
use crate::session::SessionGate;
use crate::state::AppState;
use crate::store::DocumentStore;
use crate::views::Views;

pub struct TestApp {
    pub state: AppState,
    pub config: AppConfig,
    router: Router,
    _dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }

    /// `name=value` of the first `Set-Cookie`, ready to send back.
    pub fn cookie(&self) -> Option<String> {
        let value = self.headers.get(header::SET_COOKIE)?.to_str().ok()?;
        value.split(';').next().map(str::to_string)
    }
}

impl TestApp {
    /// The portal as it runs in production, mounted from the builtin registry.
    pub async fn new() -> Self {
        Self::with_dispatcher(|_| Dispatcher::from_plan(&RouteRegistry::builtin(), MOUNT_PLAN)).await
    }

    pub async fn with_dispatcher(build: impl FnOnce(&AppState) -> Dispatcher) -> Self {
        Self::build(Views::builtin("Test Portal").unwrap(), |_| {}, build).await
    }

    pub async fn build(
        views: Views,
        configure: impl FnOnce(&mut AppConfig),
        build: impl FnOnce(&AppState) -> Dispatcher,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::development();
        config.store.data_dir = dir.path().join("data");
        config.api.enable_request_logging = false;
        configure(&mut config);

        let store = DocumentStore::from_config(&config.store);
        store.initialize().await.unwrap();
        store.read().await.unwrap();

        let state = AppState {
            store,
            sessions: Arc::new(SessionGate::new(&config.session).unwrap()),
            views: Arc::new(views),
        };
        let dispatcher = build(&state);
        let router = server::router(state.clone(), dispatcher, &config);

        Self {
            state,
            config,
            router,
            _dir: dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.send(request(Method::GET, uri, cookie, Body::empty())).await
    }

    pub async fn post_json(&self, uri: &str, cookie: Option<&str>, body: Value) -> TestResponse {
        let mut req = request(Method::POST, uri, cookie, Body::from(body.to_string()));
        req.headers_mut()
            .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        self.send(req).await
    }

    /// Register `username` and log in; returns the session cookie.
    pub async fn sign_in(&self, username: &str, password: &str) -> String {
        let credentials = serde_json::json!({ "username": username, "password": password });
        let registered = self.post_json("/register", None, credentials.clone()).await;
        assert_eq!(registered.status, StatusCode::CREATED, "{}", registered.body);
        let login = self.post_json("/login", None, credentials).await;
        assert_eq!(login.status, StatusCode::OK, "{}", login.body);
        login.cookie().unwrap()
    }
}

fn request(method: Method, uri: &str, cookie: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(body).unwrap()
}
