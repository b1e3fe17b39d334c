use crate::config::APP_NAME;
use crate::error::Result;
use crate::traits::SessionStore;
use crate::types::Endpoint;
use async_trait::async_trait;
use directories::ProjectDirs;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::fs;

/// Key under which the last working endpoint is stored.
pub const LAST_WORKING_KEY: &str = "lastWorkingDomain";

/// Key-value store persisted as a flat JSON object.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new() -> Self {
        let path = ProjectDirs::from("", "", APP_NAME)
            .map(|dirs| dirs.data_dir().join("session.json"))
            .unwrap_or_else(|| PathBuf::from(".").join("session.json"));
        Self { path }
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.path).await?;
        match serde_json::from_str(&content) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "Session file is corrupted, ignoring it");
                Ok(BTreeMap::new())
            }
        }
    }

    async fn write_all(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(map)?).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.read_all().await?;
        map.insert(key.to_string(), value.to_string());
        self.write_all(&map).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.read_all().await?;
        if map.remove(key).is_some() {
            self.write_all(&map).await?;
        }
        Ok(())
    }
}

/// In-process store; nothing survives the run.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).remove(key);
        Ok(())
    }
}

/// Read the last-known-good endpoint. Absence is normal on a first run.
pub async fn last_known_good(store: &dyn SessionStore) -> Result<Option<Endpoint>> {
    Ok(store
        .get(LAST_WORKING_KEY)
        .await?
        .filter(|v| !v.trim().is_empty())
        .map(|v| Endpoint::new(&v)))
}

pub async fn remember(store: &dyn SessionStore, endpoint: &Endpoint) -> Result<()> {
    store.set(LAST_WORKING_KEY, endpoint.as_str()).await
}

pub async fn forget(store: &dyn SessionStore) -> Result<()> {
    store.remove(LAST_WORKING_KEY).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_flow() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("session.json");
        let store = FileStore::with_path(path.clone());

        // 1. First run: nothing stored
        assert!(last_known_good(&store).await?.is_none());

        // 2. Remember a winner
        let endpoint = Endpoint::new("https://b.test");
        remember(&store, &endpoint).await?;
        assert_eq!(last_known_good(&store).await?, Some(endpoint.clone()));

        let content = fs::read_to_string(&path).await?;
        assert!(content.contains("\"lastWorkingDomain\": \"https://b.test\""));

        // 3. A fresh handle sees the same value
        let reopened = FileStore::with_path(path.clone());
        assert_eq!(last_known_good(&reopened).await?, Some(endpoint));

        // 4. Overwrite, then forget
        remember(&reopened, &Endpoint::new("https://c.test")).await?;
        assert_eq!(
            last_known_good(&store).await?,
            Some(Endpoint::new("https://c.test"))
        );
        forget(&store).await?;
        assert!(last_known_good(&store).await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn corrupted_file_reads_as_empty() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").await?;

        let store = FileStore::with_path(path);
        assert!(last_known_good(&store).await?.is_none());

        // Writing replaces the broken file.
        remember(&store, &Endpoint::new("https://a.test")).await?;
        assert!(last_known_good(&store).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn other_keys_survive() -> Result<()> {
        let dir = tempdir()?;
        let store = FileStore::with_path(dir.path().join("session.json"));
        store.set("theme", "dark").await?;
        remember(&store, &Endpoint::new("https://a.test")).await?;
        forget(&store).await?;
        assert_eq!(store.get("theme").await?, Some("dark".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn stored_value_with_trailing_slash_reads_normalized() -> Result<()> {
        let store = MemoryStore::default();
        store.set(LAST_WORKING_KEY, "https://a.test/").await?;
        assert_eq!(
            last_known_good(&store).await?,
            Some(Endpoint::new("https://a.test"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn memory_store_round_trip() -> Result<()> {
        let store = MemoryStore::default();
        assert!(last_known_good(&store).await?.is_none());
        remember(&store, &Endpoint::new("https://a.test")).await?;
        assert_eq!(
            last_known_good(&store).await?,
            Some(Endpoint::new("https://a.test"))
        );
        Ok(())
    }
}
