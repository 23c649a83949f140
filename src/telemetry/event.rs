use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Known lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    Boot,
    Dev,
    Build,
    Index,
    Upgrade,
    Init,
    Error,
    Canceled,
    Doctor,
    Automigrate,
    TestRun,
    GhostStories,
}

impl EventType {
    /// All event types in declaration order.
    pub const ALL: [EventType; 12] = [
        EventType::Boot,
        EventType::Dev,
        EventType::Build,
        EventType::Index,
        EventType::Upgrade,
        EventType::Init,
        EventType::Error,
        EventType::Canceled,
        EventType::Doctor,
        EventType::Automigrate,
        EventType::TestRun,
        EventType::GhostStories,
    ];

    /// Wire name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Boot => "boot",
            EventType::Dev => "dev",
            EventType::Build => "build",
            EventType::Index => "index",
            EventType::Upgrade => "upgrade",
            EventType::Init => "init",
            EventType::Error => "error",
            EventType::Canceled => "canceled",
            EventType::Doctor => "doctor",
            EventType::Automigrate => "automigrate",
            EventType::TestRun => "test-run",
            EventType::GhostStories => "ghost-stories",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .copied()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| format!("unknown event type: {s}"))
    }
}

/// A telemetry event as sent to a sink and recorded in the event cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    pub event_type: EventType,
    pub event_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

impl TelemetryEvent {
    /// Create an event with a fresh id.
    pub fn new(event_type: EventType, payload: Value) -> Self {
        Self {
            event_type,
            event_id: Uuid::new_v4().to_string(),
            session_id: None,
            project_id: None,
            payload,
        }
    }

    /// Sets the session id.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Sets the anonymised project id.
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }
}

/// Anonymised project identifier: SHA-256 of the project root, hex encoded.
pub fn project_id(root: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(root.to_string_lossy().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_wire_names() {
        for event in EventType::ALL {
            let json = serde_json::to_string(&event).expect("serialize");
            assert_eq!(json, format!("\"{}\"", event.as_str()));
            assert_eq!(event.as_str().parse::<EventType>(), Ok(event));
        }
        assert!("launch".parse::<EventType>().is_err());
    }

    #[test]
    fn test_event_serializes_camel_case() {
        let event = TelemetryEvent::new(EventType::GhostStories, json!({"success": true}))
            .with_session_id("s-1");
        let value = serde_json::to_value(&event).expect("serialize");

        assert_eq!(value["eventType"], json!("ghost-stories"));
        assert_eq!(value["sessionId"], json!("s-1"));
        assert!(value.get("projectId").is_none());
        assert!(!event.event_id.is_empty());
    }

    #[test]
    fn test_fresh_event_ids() {
        let a = TelemetryEvent::new(EventType::Boot, Value::Null);
        let b = TelemetryEvent::new(EventType::Boot, Value::Null);
        assert_ne!(a.event_id, b.event_id);
    }

    #[test]
    fn test_project_id_is_stable_and_opaque() {
        let id = project_id(Path::new("/home/dev/app"));
        assert_eq!(id.len(), 64);
        assert_eq!(id, project_id(Path::new("/home/dev/app")));
        assert_ne!(id, project_id(Path::new("/home/dev/other")));
        assert!(!id.contains("app"));
    }
}
