//! Durable queue of assessment submissions that failed to reach the server.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An assessment payload waiting to be replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSubmission {
    pub id: String,
    pub created: DateTime<Utc>,
    /// Stored as JSON text: TOML has no null, assessment payloads may.
    #[serde(with = "json_text")]
    pub data: serde_json::Value,
}

impl PendingSubmission {
    /// Creates a submission with a fresh id.
    #[must_use]
    pub fn new(data: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created: Utc::now(),
            data,
        }
    }
}

mod json_text {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &serde_json::Value, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<serde_json::Value, D::Error> {
        let text = String::deserialize(d)?;
        serde_json::from_str(&text).map_err(serde::de::Error::custom)
    }
}

/// Queue of pending submissions, kept in submission order.
#[async_trait]
pub trait SubmissionQueue: Send + Sync {
    /// Appends a new submission and returns it.
    async fn enqueue(&self, data: serde_json::Value) -> Result<PendingSubmission>;

    /// Returns all pending submissions, oldest first.
    async fn pending(&self) -> Result<Vec<PendingSubmission>>;

    /// Removes a submission. Returns false if it was not queued.
    async fn remove(&self, id: &str) -> Result<bool>;
}

/// In-process queue, lost on restart.
#[derive(Debug, Default)]
pub struct MemorySubmissionQueue {
    items: Mutex<Vec<PendingSubmission>>,
}

impl MemorySubmissionQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PendingSubmission>> {
        self.items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl SubmissionQueue for MemorySubmissionQueue {
    async fn enqueue(&self, data: serde_json::Value) -> Result<PendingSubmission> {
        let submission = PendingSubmission::new(data);
        self.lock().push(submission.clone());
        Ok(submission)
    }

    async fn pending(&self) -> Result<Vec<PendingSubmission>> {
        Ok(self.lock().clone())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let mut items = self.lock();
        let before = items.len();
        items.retain(|s| s.id != id);
        Ok(items.len() != before)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueFile {
    #[serde(default)]
    submissions: Vec<PendingSubmission>,
}

/// Queue persisted to a TOML file.
///
/// Every mutation rewrites the file atomically (write tmp + rename) while
/// holding an async lock, so concurrent enqueue and remove calls in one
/// process never lose entries.
#[derive(Debug)]
pub struct FileSubmissionQueue {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl FileSubmissionQueue {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<QueueFile> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => toml::from_str(&contents)
                .map_err(|e| Error::Queue(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(QueueFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, file: &QueueFile) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let toml_str = toml::to_string(file).map_err(|e| Error::Queue(e.to_string()))?;
        let tmp_path = self.path.with_extension("toml.tmp");
        tokio::fs::write(&tmp_path, toml_str).await?;

        // Submissions carry health data
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SubmissionQueue for FileSubmissionQueue {
    async fn enqueue(&self, data: serde_json::Value) -> Result<PendingSubmission> {
        let _guard = self.lock.lock().await;
        let mut file = self.read().await?;
        let submission = PendingSubmission::new(data);
        file.submissions.push(submission.clone());
        self.write(&file).await?;
        Ok(submission)
    }

    async fn pending(&self) -> Result<Vec<PendingSubmission>> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.submissions)
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut file = self.read().await?;
        let before = file.submissions.len();
        file.submissions.retain(|s| s.id != id);
        if file.submissions.len() == before {
            return Ok(false);
        }
        self.write(&file).await?;
        Ok(true)
    }
}
