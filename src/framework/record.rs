use crate::framework::core::RequestId;
use crate::framework::pending::PendingRequest;
use crate::framework::resolver::FetchedBody;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response-phase data, consumed immediately by the correlator
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub identifier: RequestId,
    pub status: u16,
    pub body: Option<Value>,
    pub body_is_binary: bool,
}

impl ResponseEnvelope {
    pub fn new(identifier: RequestId, status: u16, fetched: FetchedBody) -> Self {
        Self {
            identifier,
            status,
            body: fetched.body,
            body_is_binary: fetched.is_binary,
        }
    }
}

/// Canonical request/response pair, the unit sent to the collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEventRecord {
    pub identifier: RequestId,
    pub timestamp: f64,
    pub resource_type: String,
    pub url: String,
    pub method: String,
    pub status: u16,
    pub request_body: String,
    pub response_body: String,
    pub response_body_is_binary: bool,
}

impl NetworkEventRecord {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Render a body as text: absent is empty, strings pass through, anything
/// structured becomes compact JSON with sorted keys.
pub fn normalize_body(body: Option<&Value>) -> String {
    match body {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        // Map is BTreeMap-backed, so key order is deterministic
        Some(other) => other.to_string(),
    }
}

pub fn to_canonical(request: &PendingRequest, response: &ResponseEnvelope) -> NetworkEventRecord {
    NetworkEventRecord {
        identifier: request.identifier.clone(),
        timestamp: request.timestamp,
        resource_type: request.resource_type.clone(),
        url: request.url.clone(),
        method: request.method.clone(),
        status: response.status,
        request_body: normalize_body(request.post_data.as_ref()),
        response_body: normalize_body(response.body.as_ref()),
        response_body_is_binary: response.body_is_binary,
    }
}
