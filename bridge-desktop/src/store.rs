//! Key-Value Store Implementation backed by a JSON file
//!
//! Holds the full keyspace as a single JSON object on disk, guarded by an
//! async mutex. Every mutation rewrites the file through a temp-file + rename
//! sequence so a crash mid-write leaves the previous generation intact.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::KeyValueStore,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// File-backed key-value store for desktop hosts
///
/// The in-memory map is the source of truth; the backing file is rewritten
/// after each mutation. A corrupt or missing file loads as an empty map so a
/// damaged store never blocks startup.
pub struct FileKeyValueStore {
    state: Mutex<State>,
}

struct State {
    entries: BTreeMap<String, String>,
    /// `None` for in-memory stores used in tests.
    path: Option<PathBuf>,
}

impl FileKeyValueStore {
    /// Open (or create) a store backed by the given file
    pub async fn new(path: PathBuf) -> Result<Self> {
        let entries = match fs::read(&path).await {
            Ok(raw) => match serde_json::from_slice::<BTreeMap<String, String>>(&raw) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = ?path, error = %e, "Store file corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(BridgeError::Io(e)),
        };

        debug!(path = ?path, entries = entries.len(), "Opened key-value store");

        Ok(Self {
            state: Mutex::new(State {
                entries,
                path: Some(path),
            }),
        })
    }

    /// Create a store with no backing file
    ///
    /// Contents live only in memory. Intended for tests.
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(State {
                entries: BTreeMap::new(),
                path: None,
            }),
        }
    }

    async fn persist(state: &State) -> Result<()> {
        let Some(path) = state.path.as_ref() else {
            return Ok(());
        };

        let payload = serde_json::to_vec_pretty(&state.entries)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &payload).await?;

        if let Err(e) = fs::rename(&tmp, path).await {
            // Some filesystems refuse cross-file renames; fall back to an
            // in-place rewrite rather than losing the mutation.
            warn!(path = ?path, error = %e, "Rename failed, writing store in place");
            fs::write(path, &payload).await?;
            let _ = fs::remove_file(&tmp).await;
        }

        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let state = self.state.lock().await;
        Ok(state.entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.entries.insert(key.to_string(), value.to_string());
        Self::persist(&state).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.entries.remove(key).is_some() {
            Self::persist(&state).await?;
        }
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn entries_with_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn clear_all(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.entries.clear();
        Self::persist(&state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_store_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("bridge-desktop-test-{}", Uuid::new_v4()))
            .join("store.json")
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let store = FileKeyValueStore::in_memory();

        store.set("theme", "dark").await.unwrap();
        assert_eq!(store.get("theme").await.unwrap().as_deref(), Some("dark"));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = FileKeyValueStore::in_memory();

        store.set("a", "1").await.unwrap();
        store.delete("a").await.unwrap();
        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_prefix_enumeration() {
        let store = FileKeyValueStore::in_memory();

        store.set("@watch_progress:movie:tt1", "{}").await.unwrap();
        store.set("@watch_progress:movie:tt2", "{}").await.unwrap();
        store.set("@content_duration:movie:tt1", "1").await.unwrap();

        let keys = store.keys_with_prefix("@watch_progress:").await.unwrap();
        assert_eq!(keys.len(), 2);

        let entries = store.entries_with_prefix("@watch_progress:").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|(k, _)| k.starts_with("@watch_progress:")));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let path = temp_store_path();

        {
            let store = FileKeyValueStore::new(path.clone()).await.unwrap();
            store.set("k", "v").await.unwrap();
        }

        let reopened = FileKeyValueStore::new(path.clone()).await.unwrap();
        assert_eq!(reopened.get("k").await.unwrap().as_deref(), Some("v"));

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }

    #[tokio::test]
    async fn test_corrupt_file_loads_empty() {
        let path = temp_store_path();
        tokio::fs::create_dir_all(path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store = FileKeyValueStore::new(path.clone()).await.unwrap();
        assert_eq!(store.get("anything").await.unwrap(), None);

        // The store must remain writable after recovering from corruption.
        store.set("fresh", "1").await.unwrap();
        assert_eq!(store.get("fresh").await.unwrap().as_deref(), Some("1"));

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }

    #[tokio::test]
    async fn test_clear_all() {
        let store = FileKeyValueStore::in_memory();
        store.set("a", "1").await.unwrap();
        store.set("b", "2").await.unwrap();

        store.clear_all().await.unwrap();
        assert!(store.keys_with_prefix("").await.unwrap().is_empty());
    }
}
