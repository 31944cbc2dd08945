// Cache store for reading and writing cached entries.
// Handles JSON serialization, entry ages, and best-effort filesystem writes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::Result;
use crate::subscription::Fetch;

use super::paths;

/// Maximum age accepted by [`CacheStore::receive`]: 5 minutes.
pub const RECEIVE_MAX_AGE: Duration = Duration::from_secs(5 * 60);

static TEMP_NONCE: AtomicU64 = AtomicU64::new(0);

/// On-disk shape of an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// When the entry was stored, in epoch seconds.
    pub timestamp: i64,
    /// The cached payload.
    pub payload: T,
}

impl<T> CacheEntry<T> {
    /// Elapsed time since the entry was stored. Saturates at zero.
    pub fn age(&self) -> Duration {
        let delta = Utc::now().timestamp().saturating_sub(self.timestamp);
        Duration::from_secs(delta.max(0) as u64)
    }
}

/// A cache hit: payload plus its age.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub payload: T,
    pub age: Duration,
}

/// Disk-backed key/entry store. One JSON file per key, no in-memory mirror.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(&config.dir)
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the entry file for `key`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        paths::entry_path(&self.dir, key)
    }

    /// Read the entry for `key`.
    ///
    /// Any failure (missing file, unreadable file, malformed JSON, payload of
    /// the wrong shape) is a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<Cached<T>> {
        match self.read_entry::<T>(key).await {
            Ok(entry) => {
                let age = entry.age();
                debug!(key = %key, age_secs = age.as_secs(), "cache hit");
                Some(Cached {
                    payload: entry.payload,
                    age,
                })
            }
            Err(e) => {
                debug!(key = %key, error = %e, "cache miss");
                None
            }
        }
    }

    /// Read the payload for `key` if it is no older than `max_age`.
    pub async fn get_if_younger<T: DeserializeOwned>(
        &self,
        key: &str,
        max_age: Duration,
    ) -> Option<T> {
        match self.get::<T>(key).await {
            Some(cached) if cached.age <= max_age => Some(cached.payload),
            _ => None,
        }
    }

    /// Store `payload` under `key`, replacing any previous entry.
    ///
    /// Failures are logged and swallowed.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, payload: &T) {
        match self.write_entry(key, payload, Utc::now().timestamp()).await {
            Ok(()) => debug!(key = %key, "cache entry written"),
            Err(e) => warn!(key = %key, error = %e, "could not write cache entry"),
        }
    }

    /// Return the cached payload if younger than [`RECEIVE_MAX_AGE`],
    /// otherwise fetch, store and return it.
    pub async fn receive<T, F>(&self, key: &str, fetcher: &F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send,
        F: Fetch<T> + ?Sized,
    {
        if let Some(payload) = self.get_if_younger(key, RECEIVE_MAX_AGE).await {
            debug!(key = %key, "using cached data");
            return Ok(payload);
        }

        let payload = fetcher.fetch().await?;
        self.set(key, &payload).await;
        Ok(payload)
    }

    /// Remove the whole cache directory. A missing directory is not an error.
    pub async fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                info!(dir = %self.dir.display(), "cache cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_entry<T: DeserializeOwned>(&self, key: &str) -> Result<CacheEntry<T>> {
        let contents = fs::read_to_string(self.entry_path(key)).await?;
        let entry: CacheEntry<T> = serde_json::from_str(&contents)?;
        Ok(entry)
    }

    async fn write_entry<T: Serialize + ?Sized>(
        &self,
        key: &str,
        payload: &T,
        timestamp: i64,
    ) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let json = serde_json::to_string(&CacheEntry { timestamp, payload })?;

        // Write via temp file so readers never see a partial entry
        let nonce =
            ((std::process::id() as u64) << 32) | TEMP_NONCE.fetch_add(1, Ordering::Relaxed);
        let temp_path = paths::temp_path(&self.dir, key, nonce);
        let written = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(json.as_bytes()).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, self.entry_path(key)).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Store an entry as if it had been written `age` ago.
    #[cfg(test)]
    pub(crate) async fn set_aged<T: Serialize + ?Sized>(
        &self,
        key: &str,
        payload: &T,
        age: Duration,
    ) {
        let timestamp = Utc::now().timestamp() - age.as_secs() as i64;
        self.write_entry(key, payload, timestamp).await.unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestData {
        name: String,
        value: i32,
    }

    fn store() -> (TempDir, CacheStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path().join("cache"));
        (temp_dir, store)
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (_temp, store) = store();
        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        store.set("k1", &data).await;

        let cached = store.get::<TestData>("k1").await.unwrap();
        assert_eq!(cached.payload, data);
        assert!(cached.age <= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_file_layout() {
        let (_temp, store) = store();
        store.set("k1", &json!({ "v": 1 })).await;

        let path = store.entry_path("k1");
        assert!(path.ends_with("cache/k1.json"));

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["payload"], json!({ "v": 1 }));
        assert!(raw["timestamp"].as_i64().unwrap() <= Utc::now().timestamp());

        // No temp files left behind
        let files = std::fs::read_dir(store.dir()).unwrap().count();
        assert_eq!(files, 1);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_entry() {
        let (_temp, store) = store();
        store.set("k1", &json!({ "v": 1, "extra": true })).await;
        store.set("k1", &json!({ "v": 2 })).await;

        let cached = store.get::<Value>("k1").await.unwrap();
        assert_eq!(cached.payload, json!({ "v": 2 }));
    }

    #[tokio::test]
    async fn test_missing_is_miss() {
        let (_temp, store) = store();
        assert!(store.get::<Value>("nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_is_miss() {
        let (_temp, store) = store();
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.entry_path("bad"), "{ not json").unwrap();
        std::fs::write(store.entry_path("null"), "null").unwrap();

        assert!(store.get::<Value>("bad").await.is_none());
        assert!(store.get::<Value>("null").await.is_none());
    }

    #[tokio::test]
    async fn test_wrong_payload_shape_is_miss() {
        let (_temp, store) = store();
        store.set("k1", &json!(["not", "a", "struct"])).await;
        assert!(store.get::<TestData>("k1").await.is_none());
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let store = CacheStore::new(blocker.join("cache"));
        store.set("k1", &json!({ "v": 1 })).await;
        assert!(store.get::<Value>("k1").await.is_none());
    }

    #[tokio::test]
    async fn test_clear_then_miss_then_recreate() {
        let (_temp, store) = store();
        store.set("k1", &json!(1)).await;
        store.set("k2", &json!(2)).await;

        store.clear().await.unwrap();
        assert!(!store.dir().exists());
        assert!(store.get::<Value>("k1").await.is_none());
        assert!(store.get::<Value>("k2").await.is_none());

        store.set("k1", &json!(3)).await;
        assert_eq!(store.get::<Value>("k1").await.unwrap().payload, json!(3));
    }

    #[tokio::test]
    async fn test_clear_missing_dir_is_ok() {
        let (_temp, store) = store();
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_external_removal_is_observed() {
        let (_temp, store) = store();
        store.set("k1", &json!(1)).await;
        std::fs::remove_dir_all(store.dir()).unwrap();
        assert!(store.get::<Value>("k1").await.is_none());
    }

    #[tokio::test]
    async fn test_separator_and_underscore_keys_stay_apart() {
        let (_temp, store) = store();
        store.set("issues/open", &json!({ "which": "slash" })).await;
        store.set("issues_open", &json!({ "which": "underscore" })).await;

        assert_eq!(
            store.get::<Value>("issues/open").await.unwrap().payload,
            json!({ "which": "slash" })
        );
        assert_eq!(
            store.get::<Value>("issues_open").await.unwrap().payload,
            json!({ "which": "underscore" })
        );
    }

    #[tokio::test]
    async fn test_get_if_younger() {
        let (_temp, store) = store();
        store
            .set_aged("old", &json!(1), Duration::from_secs(600))
            .await;
        store.set("new", &json!(2)).await;

        let max_age = Duration::from_secs(300);
        assert_eq!(store.get_if_younger::<Value>("old", max_age).await, None);
        assert_eq!(
            store.get_if_younger::<Value>("new", max_age).await,
            Some(json!(2))
        );
    }

    #[tokio::test]
    async fn test_future_timestamp_has_zero_age() {
        let (_temp, store) = store();
        std::fs::create_dir_all(store.dir()).unwrap();
        let future = Utc::now().timestamp() + 3600;
        std::fs::write(
            store.entry_path("k1"),
            format!(r#"{{"timestamp":{future},"payload":1}}"#),
        )
        .unwrap();

        assert_eq!(store.get::<Value>("k1").await.unwrap().age, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_receive_fetches_once() {
        let (_temp, store) = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = {
            let calls = calls.clone();
            move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(json!({ "v": 1 }))
                }
            }
        };

        let first: Value = store.receive("k1", &fetcher).await.unwrap();
        let second: Value = store.receive("k1", &fetcher).await.unwrap();

        assert_eq!(first, json!({ "v": 1 }));
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_receive_refetches_old_entry() {
        let (_temp, store) = store();
        store
            .set_aged("k1", &json!({ "v": 1 }), Duration::from_secs(400))
            .await;

        let fetched: Value = store
            .receive("k1", &|| async { Ok::<_, String>(json!({ "v": 2 })) })
            .await
            .unwrap();
        assert_eq!(fetched, json!({ "v": 2 }));
        assert_eq!(
            store.get::<Value>("k1").await.unwrap().payload,
            json!({ "v": 2 })
        );
    }

    #[tokio::test]
    async fn test_receive_propagates_fetch_error() {
        let (_temp, store) = store();
        let result: Result<Value> = store
            .receive("k1", &|| async { Err::<Value, _>("offline") })
            .await;
        assert!(matches!(result, Err(crate::error::SwrError::Fetch(msg)) if msg == "offline"));
        assert!(store.get::<Value>("k1").await.is_none());
    }
}
