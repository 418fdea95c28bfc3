#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use tempfile::TempDir;

/// A portal binary running on its own port over its own data directory.
/// The process is killed when the value is dropped.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub data_dir: PathBuf,
    child: Child,
    _dir: TempDir,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        let server = Self::spawn()?;
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let dir = tempfile::tempdir().context("failed to create data dir")?;
        let data_dir = dir.path().join("data");

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_school-portal"));
        cmd.env("HOST", "127.0.0.1")
            .env("PORT", port.to_string())
            .env("DATA_DIR", &data_dir)
            .env("RUST_LOG", "warn")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self {
            port,
            base_url,
            data_dir,
            child,
            _dir: dir,
        })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        let url = self.url("/health");
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn db_file(&self) -> PathBuf {
        self.data_dir.join("db.json")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
