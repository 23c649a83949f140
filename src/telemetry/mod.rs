//! Telemetry events, transports and the event cache.
//!
//! Events are anonymised (the project is identified only by a hash of its
//! root) and, once sent, recorded in the [`EventCache`] so later runs can see
//! when each lifecycle event last happened.

pub mod cache;
pub mod event;
pub mod sink;
pub mod store;

use std::io;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub use cache::{preceding_upgrade, EventCache, UpgradeInfo};
pub use event::{project_id, EventType, TelemetryEvent};
pub use sink::{HttpTelemetrySink, JsonlTelemetrySink, NoopTelemetrySink, TelemetrySink};
pub use store::{CacheEntry, CacheRecord, CacheStore, FileCacheStore, MemoryCacheStore};

/// Errors from event-cache persistence.
#[derive(Error, Debug)]
pub enum CacheError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The queue worker stopped before answering.
    #[error("event cache queue closed")]
    QueueClosed,
}

/// Result type for event-cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors from sending telemetry.
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("event cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Sends events for one project and records them in the event cache.
#[derive(Clone)]
pub struct Telemetry {
    sink: Arc<dyn TelemetrySink>,
    cache: EventCache,
    project_id: String,
    session_id: Option<String>,
}

impl Telemetry {
    pub fn new(root: &Path, sink: Arc<dyn TelemetrySink>, cache: EventCache) -> Self {
        Self {
            sink,
            cache,
            project_id: project_id(root),
            session_id: None,
        }
    }

    /// Sets the session id stamped on every event.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Get the event cache.
    pub fn cache(&self) -> &EventCache {
        &self.cache
    }

    /// Get the anonymised project id.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Build an event for this project.
    pub fn event(&self, event_type: EventType, payload: Value) -> TelemetryEvent {
        let event = TelemetryEvent::new(event_type, payload).with_project_id(&self.project_id);
        match &self.session_id {
            Some(session_id) => event.with_session_id(session_id),
            None => event,
        }
    }

    /// Send an event, then record it in the cache.
    pub async fn emit(&self, event_type: EventType, payload: Value) -> TelemetryResult<TelemetryEvent> {
        let event = self.event(event_type, payload);
        self.sink.send(&event).await?;
        self.cache.set(event_type, event.clone()).await?;
        debug!(event = %event_type, id = %event.event_id, "telemetry event emitted");
        Ok(event)
    }
}
