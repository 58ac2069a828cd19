//! Shared key-value store with a change feed.
//!
//! Every agent talks to the same store. `MemoryKvStore` shares state between
//! clones inside one process; `FileKvStore` shares a JSON file between
//! processes on the same machine.

use async_trait::async_trait;
use fs2::FileExt;
use lawlens_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub key: String,
    /// `None` when the key was removed or set to null.
    pub new_value: Option<Value>,
}

impl StoreChange {
    fn new(key: &str, value: Option<&Value>) -> Self {
        Self {
            key: key.to_string(),
            new_value: non_null(value),
        }
    }
}

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Missing keys and JSON `null` both read as `None`.
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

pub async fn get_json<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub async fn set_json<T: Serialize + ?Sized>(store: &dyn KvStore, key: &str, value: &T) -> Result<()> {
    store.set(key, serde_json::to_value(value)?).await
}

fn non_null(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

// ---------------------------------------------------------------------------
// In-process store
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct MemoryKvStore {
    entries: Arc<RwLock<HashMap<String, Value>>>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            changes,
        }
    }

    /// Raw stored value, including an explicit `null`.
    pub async fn raw(&self, key: &str) -> Option<Value> {
        self.entries.read().await.get(key).cloned()
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(non_null(self.entries.read().await.get(key)))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let change = StoreChange::new(key, Some(&value));
        self.entries.write().await.insert(key.to_string(), value);
        // No receivers is fine.
        let _ = self.changes.send(change);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        if self.entries.write().await.remove(key).is_some() {
            let _ = self.changes.send(StoreChange::new(key, None));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// A single JSON object on disk.
///
/// Each write takes an exclusive lock on a sidecar `.lock` file, re-reads the
/// whole file, applies one key and renames a temp file over the store file, so
/// writers in different processes never undo each other's keys. Writes from
/// other processes are picked up by `poll_external_changes`.
pub struct FileKvStore {
    path: PathBuf,
    lock_path: PathBuf,
    write_lock: Mutex<()>,
    /// Last content seen by this handle, used to diff external writes.
    snapshot: Mutex<HashMap<String, Value>>,
    changes: broadcast::Sender<StoreChange>,
}

impl FileKvStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let snapshot = match read_map(&path).await {
            Ok(map) => map,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Store file unreadable, starting from empty snapshot");
                HashMap::new()
            }
        };
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        debug!(path = %path.display(), keys = snapshot.len(), "Opened file store");
        Ok(Self {
            lock_path: path.with_extension("lock"),
            path,
            write_lock: Mutex::new(()),
            snapshot: Mutex::new(snapshot),
            changes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_map(&self, map: &HashMap<String, Value>) -> Result<()> {
        let tmp_path = self
            .path
            .with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        let content = serde_json::to_string_pretty(map)?;
        tokio::fs::write(&tmp_path, content).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(Error::Storage(format!("Atomic rename failed: {}", e)));
        }
        Ok(())
    }

    async fn update(&self, key: &str, value: Option<Value>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let _file_lock = StoreFileLock::acquire(self.lock_path.clone()).await?;
        let mut map = read_map(&self.path).await?;
        let mut snapshot = self.snapshot.lock().await;
        // Report anything other processes wrote since the last poll before it
        // is folded into our snapshot.
        let mut changes: Vec<StoreChange> = diff_maps(&snapshot, &map)
            .into_iter()
            .filter(|c| c.key != key)
            .collect();

        match &value {
            Some(v) => {
                map.insert(key.to_string(), v.clone());
            }
            None => {
                map.remove(key);
            }
        }
        self.write_map(&map).await?;

        // Our own write must not come back through the external-change diff.
        *snapshot = map;
        drop(snapshot);
        changes.push(StoreChange::new(key, value.as_ref()));
        for change in changes {
            let _ = self.changes.send(change);
        }
        Ok(())
    }

    /// Re-reads the file and publishes every key that differs from the last
    /// snapshot. Returns the number of changes published.
    pub async fn poll_external_changes(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let current = read_map(&self.path).await?;
        let mut snapshot = self.snapshot.lock().await;
        let changes = diff_maps(&snapshot, &current);
        *snapshot = current;
        drop(snapshot);

        for change in &changes {
            let _ = self.changes.send(change.clone());
        }
        if !changes.is_empty() {
            debug!(count = changes.len(), "External store changes detected");
        }
        Ok(changes.len())
    }

    pub async fn run_watch_loop(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!(path = %self.path.display(), interval_ms = interval.as_millis() as u64, "Store watcher started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_external_changes().await {
                        warn!(error = %e, "Store watcher poll failed");
                    }
                }
                _ = shutdown.recv() => {
                    info!("Store watcher shutting down");
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let map = read_map(&self.path).await?;
        Ok(non_null(map.get(key)))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.update(key, Some(value)).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.update(key, None).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

/// Exclusive advisory lock held for one read-modify-write; released on drop.
struct StoreFileLock {
    file: File,
}

impl StoreFileLock {
    async fn acquire(path: PathBuf) -> Result<Self> {
        tokio::task::spawn_blocking(move || -> Result<Self> {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(&path)?;
            FileExt::lock_exclusive(&file)?;
            Ok(Self { file })
        })
        .await
        .map_err(|e| Error::Storage(format!("Store lock task failed: {}", e)))?
    }
}

impl Drop for StoreFileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

async fn read_map(path: &Path) -> Result<HashMap<String, Value>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) if content.trim().is_empty() => Ok(HashMap::new()),
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(e.into()),
    }
}

fn diff_maps(old: &HashMap<String, Value>, new: &HashMap<String, Value>) -> Vec<StoreChange> {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    keys.into_iter()
        .filter(|k| old.get(*k) != new.get(*k))
        .map(|k| StoreChange::new(k, new.get(k)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_store_null_reads_as_absent() {
        let store = MemoryKvStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", json!({"a": 1})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"a": 1})));

        store.set("k", Value::Null).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.raw("k").await, Some(Value::Null));
    }

    #[tokio::test]
    async fn test_memory_store_clones_share_state_and_feed() {
        let a = MemoryKvStore::new();
        let b = a.clone();
        let mut rx = b.subscribe();

        a.set("shared", json!(5)).await.unwrap();
        assert_eq!(b.get("shared").await.unwrap(), Some(json!(5)));

        let change = rx.recv().await.unwrap();
        assert_eq!(change.key, "shared");
        assert_eq!(change.new_value, Some(json!(5)));

        a.remove("shared").await.unwrap();
        assert_eq!(rx.recv().await.unwrap().new_value, None);
    }

    #[tokio::test]
    async fn test_typed_helpers() {
        let store = MemoryKvStore::new();
        set_json(&store, "n", &42u32).await.unwrap();
        let n: Option<u32> = get_json(&store, "n").await.unwrap();
        assert_eq!(n, Some(42));

        store.set("bad", json!("text")).await.unwrap();
        let bad: Result<Option<u32>> = get_json(&store, "bad").await;
        assert!(bad.is_err());
    }

    #[tokio::test]
    async fn test_file_store_persists_across_handles() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("store.json");

        let store = FileKvStore::open(&path).await.unwrap();
        store.set("fontSize_example.com", json!(20)).await.unwrap();
        store.set("gone", json!(true)).await.unwrap();
        store.remove("gone").await.unwrap();
        drop(store);

        let reopened = FileKvStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("fontSize_example.com").await.unwrap(), Some(json!(20)));
        assert_eq!(reopened.get("gone").await.unwrap(), None);

        // No temp files left behind.
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_file_store_reports_external_writes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");

        let writer = FileKvStore::open(&path).await.unwrap();
        let watcher = FileKvStore::open(&path).await.unwrap();
        let mut rx = watcher.subscribe();

        writer.set("notes", json!([{"quotation": "q"}])).await.unwrap();
        assert_eq!(watcher.poll_external_changes().await.unwrap(), 1);
        let change = rx.recv().await.unwrap();
        assert_eq!(change.key, "notes");

        // Nothing new since the last poll.
        assert_eq!(watcher.poll_external_changes().await.unwrap(), 0);

        writer.set("notes", Value::Null).await.unwrap();
        assert_eq!(watcher.poll_external_changes().await.unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap().new_value, None);
    }

    #[tokio::test]
    async fn test_file_store_own_writes_not_reported_twice() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileKvStore::open(temp_dir.path().join("store.json")).await.unwrap();
        let mut rx = store.subscribe();

        store.set("k", json!(1)).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().key, "k");
        assert_eq!(store.poll_external_changes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_file_store_write_surfaces_unpolled_external_change() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        let other = FileKvStore::open(&path).await.unwrap();
        let store = FileKvStore::open(&path).await.unwrap();
        let mut rx = store.subscribe();

        other.set("keepAliveMaster", json!({"ownerId": "a", "lastHeartbeat": 1})).await.unwrap();
        store.set("k", json!(1)).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().key, "keepAliveMaster");
        assert_eq!(rx.recv().await.unwrap().key, "k");
        assert_eq!(store.poll_external_changes().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_file_store_concurrent_handles_keep_every_key() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        let a = Arc::new(FileKvStore::open(&path).await.unwrap());
        let b = Arc::new(FileKvStore::open(&path).await.unwrap());

        let mut tasks = Vec::new();
        for i in 0..50 {
            let a = a.clone();
            tasks.push(tokio::spawn(async move { a.set(&format!("a{}", i), json!(i)).await }));
            let b = b.clone();
            tasks.push(tokio::spawn(async move { b.set(&format!("b{}", i), json!(i)).await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let reopened = FileKvStore::open(&path).await.unwrap();
        for i in 0..50 {
            assert_eq!(reopened.get(&format!("a{}", i)).await.unwrap(), Some(json!(i)));
            assert_eq!(reopened.get(&format!("b{}", i)).await.unwrap(), Some(json!(i)));
        }
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileKvStore::open(&path).await.unwrap();
        assert!(store.get("anything").await.is_err());
        assert!(store.set("anything", json!(1)).await.is_err());
    }
}
