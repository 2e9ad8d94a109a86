//! Durable key/value storage for the signed-in session.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use crate::config::SessionStoreConfig;
use crate::errors::{AppError, Result};

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// All keys live in one JSON object on disk. The lock serialises
/// read-modify-write cycles within the process.
pub struct FileSessionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSessionStore {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<HashMap<String, String>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(AppError::session_store(format!("{}: {}", self.path.display(), e))),
        };
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| AppError::CorruptSessionData(format!("{}: {}", self.path.display(), e)))
    }

    /// Like `load`, but a corrupt file is discarded so the next write heals it.
    async fn load_for_update(&self) -> Result<HashMap<String, String>> {
        match self.load().await {
            Err(AppError::CorruptSessionData(detail)) => {
                tracing::warn!("⚠️ Discarding unreadable session file {}", detail);
                Ok(HashMap::new())
            }
            other => other,
        }
    }

    async fn save(&self, entries: &HashMap<String, String>) -> Result<()> {
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|e| AppError::session_store(format!("encode session file: {}", e)))?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| AppError::session_store(format!("{}: {}", self.path.display(), e)))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load_for_update().await?;
        entries.insert(key.to_string(), value);
        self.save(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load_for_update().await?;
        entries.remove(key);
        self.save(&entries).await
    }
}

pub struct RedisSessionStore {
    connection: MultiplexedConnection,
    prefix: String,
}

impl RedisSessionStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| AppError::configuration(format!("redis url: {}", e)))?;
        let connection = client.get_multiplexed_async_connection().await?;
        tracing::info!("✅ Connected to Redis session store");

        Ok(RedisSessionStore {
            connection,
            prefix: "cityride:".to_string(),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut connection = self.connection.clone();
        Ok(connection.get(self.key(key)).await?)
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut connection = self.connection.clone();
        connection.set::<_, _, ()>(self.key(key), value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        connection.del::<_, ()>(self.key(key)).await?;
        Ok(())
    }
}

pub async fn open_session_store(config: &SessionStoreConfig) -> Result<Arc<dyn SessionStore>> {
    let store: Arc<dyn SessionStore> = match config {
        SessionStoreConfig::File(path) => {
            tracing::info!("🗄️ Session file: {}", path.display());
            Arc::new(FileSessionStore::new(path.clone()))
        }
        SessionStoreConfig::Redis(url) => Arc::new(RedisSessionStore::connect(url).await?),
        SessionStoreConfig::Memory => {
            tracing::warn!("Session kept in memory only; a restart signs the admin out");
            Arc::new(MemorySessionStore::new())
        }
    };
    Ok(store)
}
