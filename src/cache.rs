//! Named cache partitions mapping request identities to response snapshots.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::http::{RequestKey, Response};

/// Storage for version-stamped cache partitions.
///
/// A single `put` or `match_in` is atomic with respect to its partition;
/// nothing coordinates writes across calls.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Creates the partition if it does not exist yet.
    async fn open(&self, name: &str) -> Result<()>;

    /// Stores `response` under `key`, creating the partition if needed.
    async fn put(&self, name: &str, key: RequestKey, response: Response) -> Result<()>;

    /// Looks up `key` in one partition.
    async fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<Response>>;

    /// Lists partition names.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Deletes a partition. Returns false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Looks up `key` across every partition, first match wins.
    async fn match_any(&self, key: &RequestKey) -> Result<Option<Response>> {
        for name in self.keys().await? {
            if let Some(found) = self.match_in(&name, key).await? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Returns true if the partition exists.
    async fn has(&self, name: &str) -> Result<bool> {
        Ok(self.keys().await?.iter().any(|n| n == name))
    }
}

type Partition = HashMap<RequestKey, Response>;

/// In-process cache storage. Partitions are listed in name order.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    partitions: Mutex<BTreeMap<String, Partition>>,
}

impl MemoryCacheStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries in a partition, or `None` if it is absent.
    #[must_use]
    pub fn len_of(&self, name: &str) -> Option<usize> {
        self.lock().get(name).map(HashMap::len)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Partition>> {
        self.partitions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<()> {
        self.lock().entry(name.to_string()).or_default();
        Ok(())
    }

    async fn put(&self, name: &str, key: RequestKey, response: Response) -> Result<()> {
        self.lock()
            .entry(name.to_string())
            .or_default()
            .insert(key, response);
        Ok(())
    }

    async fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<Response>> {
        Ok(self.lock().get(name).and_then(|p| p.get(key)).cloned())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock().keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.lock().remove(name).is_some())
    }
}

/// On-disk entry format. Bodies are base64 so binary assets survive JSON.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: RequestKey,
    status: u16,
    status_text: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl StoredEntry {
    fn new(key: RequestKey, response: &Response) -> Self {
        Self {
            key,
            status: response.status,
            status_text: response.status_text.clone(),
            headers: response.headers.clone(),
            body: BASE64.encode(&response.body),
        }
    }

    fn into_response(self) -> Result<Response> {
        let body = BASE64
            .decode(self.body)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        Ok(Response {
            status: self.status,
            status_text: self.status_text,
            headers: self.headers,
            body: body.into(),
        })
    }
}

/// Cache storage persisted under a directory, one subdirectory per partition.
///
/// Entry files are named by the SHA-256 of the request key and written
/// atomically (write tmp + rename).
#[derive(Debug, Clone)]
pub struct DiskCacheStorage {
    root: PathBuf,
}

impl DiskCacheStorage {
    /// Creates a storage rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn partition_dir(&self, name: &str) -> Result<PathBuf> {
        if !is_valid_partition_name(name) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid cache name: {name:?}"),
            )));
        }
        Ok(self.root.join(name))
    }

    fn entry_path(&self, name: &str, key: &RequestKey) -> Result<PathBuf> {
        Ok(self.partition_dir(name)?.join(format!("{}.json", key_digest(key))))
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, name: &str) -> Result<()> {
        tokio::fs::create_dir_all(self.partition_dir(name)?).await?;
        Ok(())
    }

    async fn put(&self, name: &str, key: RequestKey, response: Response) -> Result<()> {
        self.open(name).await?;
        let path = self.entry_path(name, &key)?;
        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_vec(&StoredEntry::new(key, &response))?;
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    async fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<Response>> {
        let path = self.entry_path(name, key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: StoredEntry = serde_json::from_slice(&bytes)?;
        // Digest collisions are not trusted
        if entry.key != *key {
            return Ok(None);
        }
        entry.into_response().map(Some)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut read_dir = match tokio::fs::read_dir(&self.root).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let file_name = entry.file_name();
            if entry.file_type().await?.is_dir()
                && let Some(name) = file_name.to_str()
                && is_valid_partition_name(name)
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        match tokio::fs::remove_dir_all(self.partition_dir(name)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Partition names double as directory names.
fn is_valid_partition_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn key_digest(key: &RequestKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.method.as_bytes());
    hasher.update(b" ");
    hasher.update(key.url.as_bytes());
    hasher.finalize().iter().fold(String::with_capacity(64), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(url: &str) -> RequestKey {
        RequestKey {
            method: "GET".to_string(),
            url: url.to_string(),
        }
    }

    fn sample_response() -> Response {
        Response::new(200, vec![0u8, 159, 146, 150, 255])
            .with_header("Content-Type", "image/png")
            .with_header("ETag", "\"abc\"")
    }

    #[tokio::test]
    async fn memory_put_and_match() {
        let storage = MemoryCacheStorage::new();
        let k = key("http://localhost/static/icon-192.png");
        storage.put("static", k.clone(), sample_response()).await.unwrap();

        assert_eq!(storage.match_in("static", &k).await.unwrap(), Some(sample_response()));
        assert_eq!(storage.match_in("api", &k).await.unwrap(), None);
        assert_eq!(storage.len_of("static"), Some(1));
    }

    #[tokio::test]
    async fn memory_open_creates_empty_partition() {
        let storage = MemoryCacheStorage::new();
        storage.open("api").await.unwrap();
        assert!(storage.has("api").await.unwrap());
        assert_eq!(storage.len_of("api"), Some(0));
        assert_eq!(storage.len_of("missing"), None);
    }

    #[tokio::test]
    async fn memory_delete_and_keys() {
        let storage = MemoryCacheStorage::new();
        storage.open("b").await.unwrap();
        storage.open("a").await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["a", "b"]);

        assert!(storage.delete("a").await.unwrap());
        assert!(!storage.delete("a").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn match_any_searches_all_partitions() {
        let storage = MemoryCacheStorage::new();
        let k = key("http://localhost/offline.html");
        storage.open("api").await.unwrap();
        storage.put("static", k.clone(), Response::html("offline")).await.unwrap();

        let found = storage.match_any(&k).await.unwrap().unwrap();
        assert_eq!(&found.body[..], b"offline");
        assert!(storage.match_any(&key("http://localhost/x")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn disk_put_and_match_preserves_bytes_and_headers() {
        let dir = TempDir::new().unwrap();
        let storage = DiskCacheStorage::new(dir.path());
        let k = key("http://localhost/static/icon-192.png");

        storage.put("soulfriend-v2.0", k.clone(), sample_response()).await.unwrap();
        let found = storage.match_in("soulfriend-v2.0", &k).await.unwrap();
        assert_eq!(found, Some(sample_response()));

        // A second handle on the same directory sees the entry
        let reopened = DiskCacheStorage::new(dir.path());
        assert!(reopened.match_in("soulfriend-v2.0", &k).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn disk_missing_entries_and_partitions() {
        let dir = TempDir::new().unwrap();
        let storage = DiskCacheStorage::new(dir.path().join("caches"));
        assert!(storage.keys().await.unwrap().is_empty());
        assert!(storage.match_in("absent", &key("http://x/")).await.unwrap().is_none());
        assert!(!storage.delete("absent").await.unwrap());
    }

    #[tokio::test]
    async fn disk_keys_and_delete() {
        let dir = TempDir::new().unwrap();
        let storage = DiskCacheStorage::new(dir.path());
        for name in ["v-old-static", "v-new-api", "v-new-static"] {
            storage.open(name).await.unwrap();
        }
        assert_eq!(
            storage.keys().await.unwrap(),
            vec!["v-new-api", "v-new-static", "v-old-static"]
        );
        assert!(storage.delete("v-old-static").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["v-new-api", "v-new-static"]);
    }

    #[tokio::test]
    async fn disk_rejects_path_like_names() {
        let dir = TempDir::new().unwrap();
        let storage = DiskCacheStorage::new(dir.path());
        assert!(storage.open("../escape").await.is_err());
        assert!(storage.open(".hidden").await.is_err());
        assert!(storage.open("").await.is_err());
    }

    #[test]
    fn key_digest_is_stable_and_distinct() {
        let a = key_digest(&key("http://localhost/a"));
        assert_eq!(a.len(), 64);
        assert_eq!(a, key_digest(&key("http://localhost/a")));
        assert_ne!(a, key_digest(&key("http://localhost/b")));
    }
}
