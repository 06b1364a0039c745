use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use std::time::{SystemTime, UNIX_EPOCH};

/// Envelope carried between runners and analyzers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: String,
    pub timestamp: u64,
    pub source: String,
    pub data: serde_json::Value,
}

impl Event {
    /// Create a new event with auto-generated ID and current timestamp
    pub fn new(source: String, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: now_millis(),
            source,
            data,
        }
    }

    /// Get the event timestamp as a DateTime<Utc>
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp as i64)
            .unwrap_or_else(Utc::now)
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} ({}): {}",
            self.datetime().format("%Y-%m-%d %H:%M:%S%.3f"),
            self.source,
            self.id,
            self.data
        )
    }
}

/// Wall-clock milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_creation() {
        let data = json!({"key": "value", "number": 42});
        let event = Event::new("observer".to_string(), data.clone());

        assert!(!event.id.is_empty());
        assert!(event.timestamp > 0);
        assert_eq!(event.source, "observer");
        assert_eq!(event.data, data);
    }

    #[test]
    fn test_event_json_serialization() {
        let event = Event {
            id: "test-id".to_string(),
            timestamp: 1000,
            source: "correlator".to_string(),
            data: json!({"identifier": "7"}),
        };

        let json_str = event.to_json().unwrap();
        let deserialized: Event = serde_json::from_str(&json_str).unwrap();

        assert_eq!(event, deserialized);
    }

    #[test]
    fn test_event_display() {
        let event = Event {
            id: "test-id".to_string(),
            timestamp: 1609459200000, // 2021-01-01 00:00:00 UTC
            source: "observer".to_string(),
            data: json!({"msg": "test"}),
        };

        let display_str = format!("{}", event);
        assert!(display_str.contains("observer"));
        assert!(display_str.contains("test-id"));
        assert!(display_str.contains("2021"));
    }
}
