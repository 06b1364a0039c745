//! Body resolution. Observers leave bodies out of their events (oversized
//! request payloads, every response body), so they are fetched in a
//! follow-up call. A failed fetch never drops the record: the resolver logs
//! it and falls back to an empty body.

use crate::framework::core::{FetchError, RequestId, TabId};
use crate::framework::pending::PendingRequest;
use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Response payload as returned by the body fetch service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedBody {
    pub body: Option<Value>,
    pub is_binary: bool,
}

#[async_trait]
pub trait BodyFetcher: Send + Sync {
    async fn fetch_request_body(
        &self,
        tab_id: TabId,
        identifier: &RequestId,
    ) -> Result<Value, FetchError>;

    async fn fetch_response_body(
        &self,
        tab_id: TabId,
        identifier: &RequestId,
    ) -> Result<FetchedBody, FetchError>;
}

/// Fill in post data the observer flagged but omitted
pub async fn resolve_request_body(
    fetcher: &dyn BodyFetcher,
    tab_id: TabId,
    mut request: PendingRequest,
) -> PendingRequest {
    if !request.needs_post_data() {
        return request;
    }

    match fetcher.fetch_request_body(tab_id, &request.identifier).await {
        Ok(body) => {
            debug!(
                "Resolver: fetched post data for request {} (tab {})",
                request.identifier, tab_id
            );
            request.post_data = Some(body);
        }
        Err(e) => {
            warn!(
                "Resolver: post data fetch failed for request {} (tab {}): {}",
                request.identifier, tab_id, e
            );
        }
    }
    request
}

/// Fetch the response body; defaults to an empty, non-binary body on failure
pub async fn resolve_response_body(
    fetcher: &dyn BodyFetcher,
    tab_id: TabId,
    identifier: &RequestId,
) -> FetchedBody {
    match fetcher.fetch_response_body(tab_id, identifier).await {
        Ok(body) => body,
        Err(e) => {
            warn!(
                "Resolver: response body fetch failed for request {} (tab {}): {}",
                identifier, tab_id, e
            );
            FetchedBody::default()
        }
    }
}

type BodyKey = (TabId, RequestId);

#[derive(Default)]
struct CapturedBodies {
    attached: HashSet<TabId>,
    requests: HashMap<BodyKey, Value>,
    responses: HashMap<BodyKey, FetchedBody>,
}

/// Body fetch service backed by bodies captured alongside the traffic
#[derive(Clone, Default)]
pub struct MemoryBodyFetcher {
    inner: Arc<RwLock<CapturedBodies>>,
}

impl MemoryBodyFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, tab_id: TabId) {
        if let Ok(mut inner) = self.inner.write() {
            inner.attached.insert(tab_id);
        }
    }

    /// Forget a tab; later fetches for it fail with `TabDetached`
    #[allow(dead_code)]
    pub fn detach(&self, tab_id: TabId) {
        if let Ok(mut inner) = self.inner.write() {
            inner.attached.remove(&tab_id);
            inner.requests.retain(|(tab, _), _| *tab != tab_id);
            inner.responses.retain(|(tab, _), _| *tab != tab_id);
        }
    }

    pub fn insert_request_body(&self, tab_id: TabId, identifier: RequestId, body: Value) {
        if let Ok(mut inner) = self.inner.write() {
            inner.attached.insert(tab_id);
            inner.requests.insert((tab_id, identifier), body);
        }
    }

    pub fn insert_response_body(&self, tab_id: TabId, identifier: RequestId, body: FetchedBody) {
        if let Ok(mut inner) = self.inner.write() {
            inner.attached.insert(tab_id);
            inner.responses.insert((tab_id, identifier), body);
        }
    }
}

#[async_trait]
impl BodyFetcher for MemoryBodyFetcher {
    async fn fetch_request_body(
        &self,
        tab_id: TabId,
        identifier: &RequestId,
    ) -> Result<Value, FetchError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| FetchError::Protocol("body cache lock poisoned".to_string()))?;
        if !inner.attached.contains(&tab_id) {
            return Err(FetchError::TabDetached(tab_id));
        }
        inner
            .requests
            .get(&(tab_id, identifier.clone()))
            .cloned()
            .ok_or_else(|| FetchError::NotFound(identifier.to_string()))
    }

    async fn fetch_response_body(
        &self,
        tab_id: TabId,
        identifier: &RequestId,
    ) -> Result<FetchedBody, FetchError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| FetchError::Protocol("body cache lock poisoned".to_string()))?;
        if !inner.attached.contains(&tab_id) {
            return Err(FetchError::TabDetached(tab_id));
        }
        inner
            .responses
            .get(&(tab_id, identifier.clone()))
            .cloned()
            .ok_or_else(|| FetchError::NotFound(identifier.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::pending::sample_request;
    use serde_json::json;

    #[tokio::test]
    async fn test_request_body_filled_when_omitted() {
        let fetcher = MemoryBodyFetcher::new();
        fetcher.insert_request_body(1, RequestId::from("7"), json!("name=value"));

        let mut request = sample_request("7", 1);
        request.has_post_data = true;

        let resolved = resolve_request_body(&fetcher, 1, request).await;
        assert_eq!(resolved.post_data, Some(json!("name=value")));
    }

    #[tokio::test]
    async fn test_request_without_post_data_is_unchanged() {
        let fetcher = MemoryBodyFetcher::new();
        fetcher.insert_request_body(1, RequestId::from("7"), json!("unused"));

        let request = sample_request("7", 1);
        let resolved = resolve_request_body(&fetcher, 1, request.clone()).await;
        assert_eq!(resolved, request);
    }

    #[tokio::test]
    async fn test_request_body_failure_is_soft() {
        let fetcher = MemoryBodyFetcher::new();
        let mut request = sample_request("7", 1);
        request.has_post_data = true;

        let resolved = resolve_request_body(&fetcher, 1, request).await;
        assert!(resolved.post_data.is_none());
    }

    #[tokio::test]
    async fn test_response_body_defaults_on_failure() {
        let fetcher = MemoryBodyFetcher::new();
        fetcher.insert_response_body(
            1,
            RequestId::from("7"),
            FetchedBody {
                body: Some(json!("aGk=")),
                is_binary: true,
            },
        );
        fetcher.detach(1);

        assert!(matches!(
            fetcher.fetch_response_body(1, &RequestId::from("7")).await,
            Err(FetchError::TabDetached(1))
        ));
        let body = resolve_response_body(&fetcher, 1, &RequestId::from("7")).await;
        assert_eq!(body, FetchedBody::default());
    }

    #[tokio::test]
    async fn test_response_bodies_are_tab_scoped() {
        let fetcher = MemoryBodyFetcher::new();
        fetcher.attach(2);
        fetcher.insert_response_body(
            1,
            RequestId::from("7"),
            FetchedBody {
                body: Some(json!({"a": 1})),
                is_binary: false,
            },
        );

        assert!(matches!(
            fetcher.fetch_response_body(2, &RequestId::from("7")).await,
            Err(FetchError::NotFound(_))
        ));
        let body = resolve_response_body(&fetcher, 1, &RequestId::from("7")).await;
        assert_eq!(body.body, Some(json!({"a": 1})));
    }
}
