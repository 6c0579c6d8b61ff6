use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

const STATE_FILE_NAME: &str = "state.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Asynchronous key-value persistence shared by the context services.
///
/// Each service owns exactly one key. `update(key, None)` removes the key, and
/// a removed key reads back as `None`.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn update(&self, key: &str, value: Option<Value>) -> Result<(), StoreError>;
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn update(&self, key: &str, value: Option<Value>) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        match value {
            Some(value) => {
                entries.insert(key.to_string(), value);
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(())
    }
}

/// Store backed by a single JSON document in a data directory.
///
/// The whole document is rewritten on every update through a temporary file
/// and a rename, so a crash mid-write leaves the previous document intact.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, Value>>,
}

impl JsonFileStore {
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        tokio::fs::create_dir_all(data_dir).await?;

        let path = data_dir.join(STATE_FILE_NAME);
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => HashMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        log::debug!("Opened context store at {} ({} keys)", path.display(), entries.len());

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_document(&self, entries: &HashMap<String, Value>) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl DurableStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn update(&self, key: &str, value: Option<Value>) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        let previous = match value {
            Some(value) => entries.insert(key.to_string(), value),
            None => entries.remove(key),
        };

        if let Err(e) = self.write_document(&entries).await {
            // Keep memory consistent with what is on disk.
            match previous {
                Some(previous) => {
                    entries.insert(key.to_string(), previous);
                }
                None => {
                    entries.remove(key);
                }
            }
            return Err(e);
        }

        log::debug!("Wrote key '{}' to {}", key, self.path.display());
        Ok(())
    }
}

/// Binds a [`DurableStore`] to the single key a service owns.
///
/// Writes are tagged with a generation taken at snapshot time. A write whose
/// generation is not newer than the last one written is dropped, so detached
/// writes that finish out of order never roll the stored value back.
pub struct KeyPersister {
    store: Arc<dyn DurableStore>,
    key: &'static str,
    next_generation: AtomicU64,
    written_generation: Arc<Mutex<u64>>,
    pending: StdMutex<Vec<JoinHandle<()>>>,
}

impl KeyPersister {
    pub fn new(store: Arc<dyn DurableStore>, key: &'static str) -> Self {
        Self {
            store,
            key,
            next_generation: AtomicU64::new(1),
            written_generation: Arc::new(Mutex::new(0)),
            pending: StdMutex::new(Vec::new()),
        }
    }

    /// Reads and decodes the stored value. A missing key or JSON `null` is `None`.
    pub async fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, StoreError> {
        match self.store.get(self.key).await? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    /// Writes `value` on a detached task. Failures are logged and never
    /// reported to the caller; use [`KeyPersister::flush`] to wait for completion.
    ///
    /// Call this while still holding the lock that guards `value` so that
    /// generations follow the order of the in-memory mutations.
    pub fn persist_best_effort<T: Serialize>(&self, value: &T) {
        let snapshot = match serde_json::to_value(value) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("Failed to serialize '{}' for persistence: {}", self.key, e);
                return;
            }
        };

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let store = Arc::clone(&self.store);
        let written_generation = Arc::clone(&self.written_generation);
        let key = self.key;

        let handle = tokio::spawn(async move {
            let mut written = written_generation.lock().await;
            if generation <= *written {
                log::debug!("Skipping stale write of '{}' (generation {})", key, generation);
                return;
            }
            match store.update(key, Some(snapshot)).await {
                Ok(()) => *written = generation,
                Err(e) => log::warn!("Failed to persist '{}': {}", key, e),
            }
        });

        let mut pending = self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
    }

    /// Writes `value` and waits for the store to confirm it.
    pub async fn persist_now<T: Serialize>(&self, value: &T) -> Result<(), StoreError> {
        let snapshot = serde_json::to_value(value)?;
        self.write_now(Some(snapshot)).await
    }

    /// Removes the key and waits for the store to confirm it.
    pub async fn remove_now(&self) -> Result<(), StoreError> {
        self.write_now(None).await
    }

    async fn write_now(&self, value: Option<Value>) -> Result<(), StoreError> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let mut written = self.written_generation.lock().await;
        self.store.update(self.key, value).await?;
        *written = generation.max(*written);
        Ok(())
    }

    /// Waits for every outstanding best-effort write issued so far.
    pub async fn flush(&self) {
        let handles = {
            let mut pending = self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::take(&mut *pending)
        };
        for handle in handles {
            if let Err(e) = handle.await {
                log::warn!("Persistence task for '{}' did not complete: {}", self.key, e);
            }
        }
    }
}
