//! Persistence for the event-cache record.
//!
//! A store only loads and saves the whole record. Serializing access to it
//! is the job of [`EventCache`](super::EventCache); stores never see
//! concurrent writes when used through the cache.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use super::event::{EventType, TelemetryEvent};
use super::CacheResult;

/// Last recorded occurrence of an event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub body: TelemetryEvent,
}

/// The full cache record, keyed by event type.
pub type CacheRecord = BTreeMap<EventType, CacheEntry>;

/// Loads and saves the whole cache record.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self) -> CacheResult<CacheRecord>;
    async fn save(&self, record: &CacheRecord) -> CacheResult<()>;
}

/// JSON file store with atomic replacement on save.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    path: PathBuf,
}

impl FileCacheStore {
    /// Create a store backed by `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn load(&self) -> CacheResult<CacheRecord> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(CacheRecord::new()),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_str(&content) {
            Ok(record) => Ok(record),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "event cache is corrupt, starting empty");
                Ok(CacheRecord::new())
            }
        }
    }

    async fn save(&self, record: &CacheRecord) -> CacheResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(record)?;
        let temp_path = self.temp_path();

        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        Ok(())
    }
}

/// In-process store, for tests and for runs with persistence disabled.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    record: Mutex<CacheRecord>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an existing record.
    pub fn with_record(record: CacheRecord) -> Self {
        Self {
            record: Mutex::new(record),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn load(&self) -> CacheResult<CacheRecord> {
        Ok(self
            .record
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    async fn save(&self, record: &CacheRecord) -> CacheResult<()> {
        *self.record.lock().unwrap_or_else(|e| e.into_inner()) = record.clone();
        Ok(())
    }
}
