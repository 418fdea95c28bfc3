use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

use super::Document;
use crate::config::StoreConfig;

/// Errors from DocumentStore
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("store write interrupted: {0}")]
    Interrupted(String),
}

/// What `initialize` found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Created,
    Existing,
    /// A corrupt file was moved aside and replaced with the default document.
    Reset,
}

/// Handle to the JSON document backing the portal.
///
/// Cloning is cheap; every clone shares the same in-memory document and the
/// same write queue. Reads from disk happen only on `read`, writes only on
/// `commit` and `update`.
#[derive(Clone)]
pub struct DocumentStore {
    inner: Arc<Inner>,
    reset_corrupt: bool,
}

struct Inner {
    path: PathBuf,
    data: RwLock<Document>,
    write_queue: Arc<Mutex<()>>,
}

impl DocumentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                path: path.into(),
                data: RwLock::new(Document::default()),
                write_queue: Arc::new(Mutex::new(())),
            }),
            reset_corrupt: false,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.file_path()).reset_corrupt(config.reset_corrupt)
    }

    /// Replace a corrupt file with defaults during `initialize` instead of failing.
    pub fn reset_corrupt(mut self, enabled: bool) -> Self {
        self.reset_corrupt = enabled;
        self
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Make sure a valid document exists on disk, creating the data directory
    /// and the default document when missing. An existing valid file is never
    /// rewritten.
    pub async fn initialize(&self) -> Result<InitOutcome, StoreError> {
        let path = self.path();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await.map_err(|source| unavailable(path, source))?;
        }

        let exists = fs::try_exists(path).await.map_err(|source| unavailable(path, source))?;
        if !exists {
            write_atomic(path, &serde_json::to_vec_pretty(&Document::default())?).await?;
            info!(path = %path.display(), "created document store");
            return Ok(InitOutcome::Created);
        }

        match load(path).await {
            Ok(_) => Ok(InitOutcome::Existing),
            Err(StoreError::Corrupt { reason, .. }) if self.reset_corrupt => {
                let aside = sibling(path, &format!(".corrupt-{}", Utc::now().format("%Y%m%d-%H%M%S")));
                fs::rename(path, &aside).await.map_err(|source| unavailable(path, source))?;
                write_atomic(path, &serde_json::to_vec_pretty(&Document::default())?).await?;
                warn!(
                    path = %path.display(),
                    moved_to = %aside.display(),
                    %reason,
                    "document store was corrupt; reset to defaults"
                );
                Ok(InitOutcome::Reset)
            }
            Err(e) => Err(e),
        }
    }

    /// Load the full document from disk into memory, replacing what was there.
    ///
    /// Queued behind `commit` and `update` like a write, so a load can never
    /// publish a file older than the last persisted update.
    pub async fn read(&self) -> Result<(), StoreError> {
        let _queued = self.inner.write_queue.lock().await;
        let document = load(self.path()).await?;
        *self.inner.data.write().await = document;
        Ok(())
    }

    /// Borrow the live in-memory document.
    pub async fn snapshot(&self) -> RwLockReadGuard<'_, Document> {
        self.inner.data.read().await
    }

    /// Mutate the live document in place. Changes reach disk only on `commit`.
    pub async fn snapshot_mut(&self) -> RwLockWriteGuard<'_, Document> {
        self.inner.data.write().await
    }

    /// Persist the in-memory document, replacing the file atomically.
    pub async fn commit(&self) -> Result<(), StoreError> {
        let inner = Arc::clone(&self.inner);
        let queued = Arc::clone(&inner.write_queue).lock_owned().await;

        detach(async move {
            let _queued = queued;
            let bytes = serde_json::to_vec_pretty(&*inner.data.read().await)?;
            write_atomic(&inner.path, &bytes).await
        })
        .await
    }

    /// Apply `mutate` to a draft of the document, persist the draft and then
    /// publish it in memory.
    ///
    /// Calls are queued behind each other and behind `commit`. Once the draft
    /// is built the write runs to completion even if the caller goes away, so
    /// memory never holds a change that failed to reach disk. Edits made
    /// through `snapshot_mut` while an update is in flight are overwritten.
    pub async fn update<T, E, F>(&self, mutate: F) -> Result<T, E>
    where
        F: FnOnce(&mut Document) -> Result<T, E>,
        E: From<StoreError>,
    {
        let inner = Arc::clone(&self.inner);
        let queued = Arc::clone(&inner.write_queue).lock_owned().await;

        let mut draft = inner.data.read().await.clone();
        let output = mutate(&mut draft)?;

        detach(async move {
            let _queued = queued;
            let bytes = serde_json::to_vec_pretty(&draft)?;
            write_atomic(&inner.path, &bytes).await?;
            *inner.data.write().await = draft;
            Ok(())
        })
        .await?;

        Ok(output)
    }
}

async fn detach<T, F>(task: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, StoreError>> + Send + 'static,
{
    tokio::spawn(task)
        .await
        .map_err(|e| StoreError::Interrupted(e.to_string()))?
}

async fn load(path: &Path) -> Result<Document, StoreError> {
    let bytes = fs::read(path).await.map_err(|source| unavailable(path, source))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: "file is empty".to_string(),
        });
    }
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = sibling(path, ".tmp");
    let mut file = fs::File::create(&tmp).await.map_err(|source| unavailable(&tmp, source))?;
    file.write_all(bytes).await.map_err(|source| unavailable(&tmp, source))?;
    file.sync_all().await.map_err(|source| unavailable(&tmp, source))?;
    drop(file);
    fs::rename(&tmp, path).await.map_err(|source| unavailable(path, source))
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

fn unavailable(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Unavailable {
        path: path.to_path_buf(),
        source,
    }
}
