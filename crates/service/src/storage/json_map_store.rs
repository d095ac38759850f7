use serde::{Deserialize, Serialize};
use std::{collections::HashMap, hash::Hash, path::PathBuf, sync::Arc};
use tokio::{fs, sync::RwLock};
use tracing::debug;

use crate::errors::ServiceError;

/// Generic JSON file-backed key-value map store.
///
/// Persists a `HashMap<K, V>` to a JSON file. Every mutation rewrites the
/// whole file through a sibling temp file and a rename.
pub struct JsonMapStore<K: Eq + Hash, V> {
    inner: RwLock<StoreFile<K, V>>,
    file_path: PathBuf,
}

/// On-disk layout. `last_id` is the highest integer key ever handed out,
/// kept so deleted ids are not issued again.
#[derive(Clone, Serialize, Deserialize)]
struct StoreFile<K: Eq + Hash, V> {
    #[serde(default)]
    last_id: i64,
    entries: HashMap<K, V>,
}

impl<K: Eq + Hash, V> StoreFile<K, V> {
    fn empty() -> Self {
        Self { last_id: 0, entries: HashMap::new() }
    }
}

fn storage_err(e: impl std::fmt::Display) -> ServiceError {
    ServiceError::Storage(e.to_string())
}

impl<K, V> JsonMapStore<K, V>
where
    K: Eq + Hash + serde::Serialize + serde::de::DeserializeOwned + Clone,
    V: serde::Serialize + serde::de::DeserializeOwned + Clone,
{
    /// Open the store at `path`, creating an empty file if it is missing.
    ///
    /// A file that exists but does not decode is an error; it is never
    /// silently replaced.
    pub async fn open<P: Into<PathBuf>>(path: P) -> Result<Arc<Self>, ServiceError> {
        let file_path = path.into();
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(storage_err)?;
        }

        let data: StoreFile<K, V> = match fs::read(&file_path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => StoreFile::empty(),
            Ok(bytes) => decode(&bytes)
                .map_err(|e| ServiceError::Storage(format!("{} is corrupted: {e}", file_path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let empty = StoreFile::empty();
                fs::write(&file_path, serde_json::to_vec(&empty).map_err(storage_err)?)
                    .await
                    .map_err(storage_err)?;
                empty
            }
            Err(e) => return Err(storage_err(e)),
        };
        debug!(path = %file_path.display(), entries = data.entries.len(), last_id = data.last_id, "json store opened");

        Ok(Arc::new(Self { inner: RwLock::new(data), file_path }))
    }

    async fn save(&self, data: &StoreFile<K, V>) -> Result<(), ServiceError> {
        let data = serde_json::to_vec_pretty(data).map_err(storage_err)?;
        let tmp = self.file_path.with_extension("json.tmp");
        fs::write(&tmp, data).await.map_err(storage_err)?;
        fs::rename(&tmp, &self.file_path).await.map_err(storage_err)?;
        Ok(())
    }

    /// List all entries as `(key, value)` pairs.
    pub async fn list(&self) -> Vec<(K, V)> {
        let data = self.inner.read().await;
        data.entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Get value by key.
    pub async fn get(&self, key: &K) -> Option<V> {
        let data = self.inner.read().await;
        data.entries.get(key).cloned()
    }

    /// Remove a key and persist; returns whether it existed.
    pub async fn remove(&self, key: &K) -> Result<bool, ServiceError> {
        self.update_map(|m| Ok(m.remove(key).is_some())).await
    }

    /// Apply a mutation under the write lock and persist it.
    ///
    /// The in-memory map only changes if both `f` and the file write succeed.
    pub async fn update_map<F, R>(&self, f: F) -> Result<R, ServiceError>
    where
        F: FnOnce(&mut HashMap<K, V>) -> Result<R, ServiceError>,
    {
        let mut data = self.inner.write().await;
        let mut next = data.clone();
        let out = f(&mut next.entries)?;
        self.save(&next).await?;
        *data = next;
        Ok(out)
    }
}

impl<V> JsonMapStore<i64, V>
where
    V: serde::Serialize + serde::de::DeserializeOwned + Clone,
{
    /// Store `build(id)` under a fresh id and persist it.
    ///
    /// Ids only grow: an id stays used after its entry is removed.
    pub async fn insert_next<F>(&self, build: F) -> Result<V, ServiceError>
    where
        F: FnOnce(i64) -> V,
    {
        let mut data = self.inner.write().await;
        let mut next = data.clone();
        let id = next.entries.keys().copied().fold(next.last_id, i64::max) + 1;
        let value = build(id);
        next.entries.insert(id, value.clone());
        next.last_id = id;
        self.save(&next).await?;
        *data = next;
        Ok(value)
    }

    /// Highest id handed out so far, `0` for a fresh store.
    pub async fn last_id(&self) -> i64 {
        let data = self.inner.read().await;
        data.entries.keys().copied().fold(data.last_id, i64::max)
    }
}

/// Accepts the current layout and the older bare `{key: value}` map.
fn decode<K, V>(bytes: &[u8]) -> Result<StoreFile<K, V>, serde_json::Error>
where
    K: Eq + Hash + serde::de::DeserializeOwned,
    V: serde::de::DeserializeOwned,
{
    let shape: serde_json::Value = serde_json::from_slice(bytes)?;
    let is_current = shape.as_object().is_some_and(|object| {
        object.contains_key("entries") && object.keys().all(|key| key == "entries" || key == "last_id")
    });
    if is_current {
        serde_json::from_slice(bytes)
    } else {
        let entries: HashMap<K, V> = serde_json::from_slice(bytes)?;
        Ok(StoreFile { last_id: 0, entries })
    }
}
