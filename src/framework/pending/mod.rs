//! Pending-request store: request-phase data waiting for its response.
//!
//! Entries are addressed only by [`RequestId`]. Implementations must give
//! atomic per-key insert and remove; nothing assumes ordering across keys.

use crate::framework::core::{now_millis, RequestId, RequestSentParams, StoreError};
use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    pub identifier: RequestId,
    /// Observer timestamp, seconds
    pub timestamp: f64,
    pub resource_type: String,
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub has_post_data: bool,
    #[serde(default)]
    pub post_data: Option<Value>,
    /// Wall-clock time the entry was written, used for eviction
    #[serde(default)]
    pub stored_at_ms: u64,
}

impl PendingRequest {
    pub fn from_request_sent(identifier: RequestId, params: RequestSentParams) -> Self {
        let stored_at_ms = now_millis();
        Self {
            identifier,
            timestamp: params.timestamp.unwrap_or(stored_at_ms as f64 / 1000.0),
            resource_type: params.resource_type.unwrap_or_default(),
            url: params.request.url,
            method: params.request.method,
            has_post_data: params.request.has_post_data,
            post_data: params.request.post_data.filter(|body| !body.is_null()),
            stored_at_ms,
        }
    }

    /// The observer flagged a body but left it out of the event
    pub fn needs_post_data(&self) -> bool {
        self.has_post_data && self.post_data.is_none()
    }
}

#[async_trait]
pub trait PendingStore: Send + Sync {
    /// Insert or overwrite; last writer wins
    async fn put(&self, request: &PendingRequest) -> Result<(), StoreError>;

    async fn get(&self, identifier: &RequestId) -> Result<Option<PendingRequest>, StoreError>;

    /// Delete the entry; a missing entry is not an error
    async fn remove(&self, identifier: &RequestId) -> Result<(), StoreError>;

    async fn identifiers(&self) -> Result<Vec<RequestId>, StoreError>;

    /// Remove entries written before `cutoff_ms` and return their identifiers.
    /// An entry that cannot be read or removed is logged and skipped.
    async fn evict_older_than(&self, cutoff_ms: u64) -> Result<Vec<RequestId>, StoreError> {
        let mut evicted = Vec::new();
        for identifier in self.identifiers().await? {
            let request = match self.get(&identifier).await {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(e) => {
                    warn!(
                        "{} store: skipping entry {} during eviction: {}",
                        self.name(),
                        identifier,
                        e
                    );
                    continue;
                }
            };
            if request.stored_at_ms >= cutoff_ms {
                continue;
            }
            match self.remove(&identifier).await {
                Ok(()) => evicted.push(identifier),
                Err(e) => warn!(
                    "{} store: cannot evict entry {}: {}",
                    self.name(),
                    identifier,
                    e
                ),
            }
        }
        Ok(evicted)
    }

    fn name(&self) -> &str;
}

#[cfg(test)]
pub(crate) fn sample_request(identifier: &str, stored_at_ms: u64) -> PendingRequest {
    PendingRequest {
        identifier: RequestId::from(identifier),
        timestamp: 100.25,
        resource_type: "Fetch".to_string(),
        url: format!("https://x/api/{}", identifier),
        method: "GET".to_string(),
        has_post_data: false,
        post_data: None,
        stored_at_ms,
    }
}
