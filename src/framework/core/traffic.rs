//! Tab-scoped traffic events as reported by a traffic observer.
//!
//! Payloads follow the DevTools `Network.requestWillBeSent` and
//! `Network.responseReceived` parameter shapes. Only the fields the
//! correlator needs are decoded; everything else is ignored.

use super::events::Event;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Source tag of events produced by traffic observers
pub const OBSERVER_SOURCE: &str = "observer";

/// Browser tab identifier
pub type TabId = u64;

/// Opaque per-request correlation key. Numeric identifiers are kept as their
/// decimal text so `7` and `"7"` address the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => RequestId(text),
            Raw::Number(number) => RequestId(number.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventKind {
    RequestSent,
    ResponseReceived,
}

/// One observer callback: `(kind, tabId, identifier, payload)`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrafficEvent {
    pub kind: EventKind,
    pub tab_id: TabId,
    pub identifier: RequestId,
    #[serde(default)]
    pub payload: Value,
}

impl TrafficEvent {
    pub fn new(
        kind: EventKind,
        tab_id: TabId,
        identifier: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            kind,
            tab_id,
            identifier: RequestId::new(identifier),
            payload,
        }
    }

    /// Wrap into a framework event for the analyzer chain
    pub fn into_event(self) -> Event {
        let data = json!({
            "kind": self.kind,
            "tabId": self.tab_id,
            "identifier": self.identifier,
            "payload": self.payload,
        });
        Event::new(OBSERVER_SOURCE.to_string(), data)
    }

    /// Recover a traffic event from a framework event, if it is one
    pub fn from_event(event: &Event) -> Option<Self> {
        if event.source != OBSERVER_SOURCE {
            return None;
        }
        serde_json::from_value(event.data.clone()).ok()
    }

    pub fn request_sent(&self) -> Result<RequestSentParams, serde_json::Error> {
        RequestSentParams::deserialize(&self.payload)
    }

    pub fn response_received(&self) -> Result<ResponseReceivedParams, serde_json::Error> {
        ResponseReceivedParams::deserialize(&self.payload)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestSentParams {
    /// Seconds, as reported by the observer
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(rename = "type", default)]
    pub resource_type: Option<String>,
    pub request: RequestInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfo {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub has_post_data: bool,
    #[serde(default)]
    pub post_data: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseReceivedParams {
    #[serde(rename = "type", default)]
    pub resource_type: Option<String>,
    pub response: ResponseInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseInfo {
    pub status: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_and_text_identifiers_match() {
        let numeric: RequestId = serde_json::from_value(json!(7)).unwrap();
        let text: RequestId = serde_json::from_value(json!("7")).unwrap();
        assert_eq!(numeric, text);
        assert_eq!(numeric.as_str(), "7");
    }

    #[test]
    fn test_event_wrapping() {
        let traffic = TrafficEvent::new(
            EventKind::RequestSent,
            3,
            "1000.1",
            json!({"type": "Fetch", "request": {"url": "https://x/api", "method": "GET"}}),
        );

        let event = traffic.clone().into_event();
        assert_eq!(event.source, OBSERVER_SOURCE);
        assert_eq!(event.data["kind"], "RequestSent");
        assert_eq!(event.data["tabId"], 3);

        let recovered = TrafficEvent::from_event(&event).unwrap();
        assert_eq!(recovered, traffic);
    }

    #[test]
    fn test_foreign_events_are_not_traffic() {
        let event = Event::new("correlator".to_string(), json!({"identifier": "7"}));
        assert!(TrafficEvent::from_event(&event).is_none());
    }

    #[test]
    fn test_request_sent_params() {
        let traffic = TrafficEvent::new(
            EventKind::RequestSent,
            1,
            "9",
            json!({
                "requestId": "9",
                "timestamp": 12.5,
                "type": "XHR",
                "request": {"url": "https://x/upload", "method": "POST", "hasPostData": true}
            }),
        );

        let params = traffic.request_sent().unwrap();
        assert_eq!(params.resource_type.as_deref(), Some("XHR"));
        assert_eq!(params.timestamp, Some(12.5));
        assert!(params.request.has_post_data);
        assert!(params.request.post_data.is_none());
    }

    #[test]
    fn test_response_without_status_is_malformed() {
        let traffic =
            TrafficEvent::new(EventKind::ResponseReceived, 1, "9", json!({"response": {}}));
        assert!(traffic.response_received().is_err());
    }
}
