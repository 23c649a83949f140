//! Telemetry transports.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::event::TelemetryEvent;
use super::TelemetryResult;

/// Accepts finished telemetry events.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn send(&self, event: &TelemetryEvent) -> TelemetryResult<()>;
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetrySink;

#[async_trait]
impl TelemetrySink for NoopTelemetrySink {
    async fn send(&self, event: &TelemetryEvent) -> TelemetryResult<()> {
        debug!(event = %event.event_type, "telemetry disabled, event dropped");
        Ok(())
    }
}

/// Appends one JSON object per line to a local file.
#[derive(Debug, Clone)]
pub struct JsonlTelemetrySink {
    path: PathBuf,
}

impl JsonlTelemetrySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the output file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TelemetrySink for JsonlTelemetrySink {
    async fn send(&self, event: &TelemetryEvent) -> TelemetryResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.sync_all().await?;
        Ok(())
    }
}

/// POSTs each event as JSON to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpTelemetrySink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTelemetrySink {
    /// Request timeout for a single event.
    pub const TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(endpoint: impl Into<String>) -> TelemetryResult<Self> {
        let client = reqwest::Client::builder().timeout(Self::TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TelemetrySink for HttpTelemetrySink {
    async fn send(&self, event: &TelemetryEvent) -> TelemetryResult<()> {
        self.client
            .post(&self.endpoint)
            .json(event)
            .send()
            .await?
            .error_for_status()?;
        debug!(event = %event.event_type, endpoint = %self.endpoint, "telemetry event sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::event::EventType;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_jsonl_sink_appends_lines() {
        let temp_dir = TempDir::new().expect("temp dir");
        let sink = JsonlTelemetrySink::new(temp_dir.path().join("out/events.jsonl"));

        sink.send(&TelemetryEvent::new(EventType::Boot, json!({})))
            .await
            .expect("send boot");
        sink.send(&TelemetryEvent::new(EventType::GhostStories, json!({"success": true})))
            .await
            .expect("send ghost-stories");

        let content = std::fs::read_to_string(sink.path()).expect("read");
        let events: Vec<TelemetryEvent> = content
            .lines()
            .map(|line| serde_json::from_str(line).expect("line json"))
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::Boot);
        assert_eq!(events[1].payload, json!({"success": true}));
    }

    #[tokio::test]
    async fn test_noop_sink_accepts_everything() {
        let sink = NoopTelemetrySink;
        assert!(sink
            .send(&TelemetryEvent::new(EventType::Error, json!(null)))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_http_sink_reports_connection_errors() {
        let sink = HttpTelemetrySink::new("http://127.0.0.1:9/event").expect("client");
        assert_eq!(sink.endpoint(), "http://127.0.0.1:9/event");
        let result = sink
            .send(&TelemetryEvent::new(EventType::Boot, json!({})))
            .await;
        assert!(result.is_err());
    }
}
