use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SESSION_SECRET: &str = "dev-session-secret";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub session: SessionConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub site_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub file_name: String,
    /// Move a corrupt document aside and start from defaults instead of aborting.
    pub reset_corrupt: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_secs: u64,
    pub cookie_name: String,
    pub secure_cookie: bool,
    /// 0 disables the background sweep; expired sessions are still evicted on access.
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("SITE_NAME") {
            self.server.site_name = v;
        }

        // Store overrides
        if let Ok(v) = env::var("DATA_DIR") {
            self.store.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("DB_FILE") {
            self.store.file_name = v;
        }
        if let Ok(v) = env::var("STORE_RESET_CORRUPT") {
            self.store.reset_corrupt = v.parse().unwrap_or(self.store.reset_corrupt);
        }

        // Session overrides
        if let Ok(v) = env::var("SESSION_SECRET") {
            if !v.is_empty() {
                self.session.secret = v;
            }
        }
        if let Ok(v) = env::var("SESSION_TTL_SECS") {
            self.session.ttl_secs = v.parse().unwrap_or(self.session.ttl_secs);
        }
        if let Ok(v) = env::var("SESSION_COOKIE_NAME") {
            self.session.cookie_name = v;
        }
        if let Ok(v) = env::var("SESSION_SECURE_COOKIE") {
            self.session.secure_cookie = v.parse().unwrap_or(self.session.secure_cookie);
        }
        if let Ok(v) = env::var("SESSION_SWEEP_SECS") {
            self.session.sweep_interval_secs = v.parse().unwrap_or(self.session.sweep_interval_secs);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            session: SessionConfig {
                secret: DEFAULT_SESSION_SECRET.to_string(),
                ttl_secs: 60 * 60, // 1 hour
                cookie_name: "portal.sid".to_string(),
                secure_cookie: false,
                sweep_interval_secs: 0,
            },
            api: ApiConfig {
                enable_request_logging: true,
            },
            security: SecurityConfig { enable_cors: true },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            session: SessionConfig {
                secure_cookie: true,
                sweep_interval_secs: 5 * 60,
                ..Self::development().session
            },
            ..Self::development()
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            session: SessionConfig {
                secure_cookie: true,
                sweep_interval_secs: 5 * 60,
                ..Self::development().session
            },
            api: ApiConfig {
                enable_request_logging: false,
            },
            ..Self::development()
        }
    }

    /// Socket address the server binds to.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }

    pub fn uses_default_secret(&self) -> bool {
        self.session.secret == DEFAULT_SESSION_SECRET
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            site_name: "School Portal".to_string(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            file_name: "db.json".to_string(),
            reset_corrupt: false,
        }
    }
}

impl StoreConfig {
    pub fn file_path(&self) -> PathBuf {
        self.data_dir.join(&self.file_name)
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}
