//! Per-tab request/response correlation.
//!
//! Each identifier moves `NoRequest -> RequestPending -> Completed`, or ends
//! `Discarded` when its request was filtered out or never observed. The
//! pending entry is removed only after the collector accepts the record, so
//! a failed dispatch leaves the entry for the next response of the same
//! identifier.

use crate::framework::core::{
    now_millis, EventKind, RequestId, StoreError, TabId, TrafficEvent,
};
use crate::framework::dispatcher::Dispatcher;
use crate::framework::filter::ResourceFilter;
use crate::framework::pending::{PendingRequest, PendingStore};
use crate::framework::record::{to_canonical, NetworkEventRecord, ResponseEnvelope};
use crate::framework::resolver::{resolve_request_body, resolve_response_body, BodyFetcher};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;

/// What handling a single traffic event led to
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Other tab, or a payload the correlator cannot read
    Ignored,
    /// Resource type outside the whitelist
    Filtered,
    /// Request phase recorded
    Stored,
    /// Response with no stored request
    Orphan,
    Dispatched(NetworkEventRecord),
    /// Collector did not accept the record; its pending entry is kept
    DispatchFailed(NetworkEventRecord),
}

pub struct Correlator {
    tab_id: TabId,
    filter: ResourceFilter,
    store: Arc<dyn PendingStore>,
    fetcher: Arc<dyn BodyFetcher>,
    dispatcher: Dispatcher,
}

impl Correlator {
    pub fn new(
        tab_id: TabId,
        filter: ResourceFilter,
        store: Arc<dyn PendingStore>,
        fetcher: Arc<dyn BodyFetcher>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            tab_id,
            filter,
            store,
            fetcher,
            dispatcher,
        }
    }

    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    /// Only store failures surface as errors; everything else is absorbed
    pub async fn handle(&self, event: TrafficEvent) -> Result<Outcome, StoreError> {
        if event.tab_id != self.tab_id {
            debug!(
                "Correlator[{}]: ignoring event for tab {} (request {})",
                self.tab_id, event.tab_id, event.identifier
            );
            return Ok(Outcome::Ignored);
        }

        match event.kind {
            EventKind::RequestSent => self.on_request_sent(event).await,
            EventKind::ResponseReceived => self.on_response_received(event).await,
        }
    }

    async fn on_request_sent(&self, event: TrafficEvent) -> Result<Outcome, StoreError> {
        let params = match event.request_sent() {
            Ok(params) => params,
            Err(e) => {
                warn!(
                    "Correlator[{}]: unreadable request payload for {}: {}",
                    self.tab_id, event.identifier, e
                );
                return Ok(Outcome::Ignored);
            }
        };

        let resource_type = params.resource_type.as_deref().unwrap_or_default();
        if !self.filter.is_relevant(resource_type) {
            debug!(
                "Correlator[{}]: skipping {} request {}",
                self.tab_id, resource_type, event.identifier
            );
            return Ok(Outcome::Filtered);
        }

        let request = PendingRequest::from_request_sent(event.identifier, params);
        let request = resolve_request_body(self.fetcher.as_ref(), self.tab_id, request).await;
        self.store.put(&request).await?;

        debug!(
            "Correlator[{}]: pending {} {} (request {})",
            self.tab_id, request.method, request.url, request.identifier
        );
        Ok(Outcome::Stored)
    }

    async fn on_response_received(&self, event: TrafficEvent) -> Result<Outcome, StoreError> {
        let params = match event.response_received() {
            Ok(params) => params,
            Err(e) => {
                warn!(
                    "Correlator[{}]: unreadable response payload for {}: {}",
                    self.tab_id, event.identifier, e
                );
                return Ok(Outcome::Ignored);
            }
        };

        let Some(request) = self.store.get(&event.identifier).await? else {
            info!(
                "Correlator[{}]: orphan {} response {} for request {}",
                self.tab_id,
                params.resource_type.as_deref().unwrap_or("untyped"),
                params.response.status,
                event.identifier
            );
            return Ok(Outcome::Orphan);
        };

        let fetched =
            resolve_response_body(self.fetcher.as_ref(), self.tab_id, &event.identifier).await;
        let envelope = ResponseEnvelope::new(event.identifier, params.response.status, fetched);
        let record = to_canonical(&request, &envelope);

        if self.dispatcher.send(&record).await {
            if let Err(e) = self.store.remove(&record.identifier).await {
                error!(
                    "Correlator[{}]: dispatched {} but could not drop it from the {} store: {}",
                    self.tab_id,
                    record.identifier,
                    self.store.name(),
                    e
                );
            }
            Ok(Outcome::Dispatched(record))
        } else {
            warn!(
                "Correlator[{}]: keeping pending request {} after failed dispatch",
                self.tab_id, record.identifier
            );
            Ok(Outcome::DispatchFailed(record))
        }
    }

    /// Evict pending entries older than `ttl`
    pub async fn sweep_expired(&self, ttl: Duration) -> Result<Vec<RequestId>, StoreError> {
        let cutoff = now_millis().saturating_sub(ttl.as_millis() as u64);
        let evicted = self.store.evict_older_than(cutoff).await?;
        for identifier in &evicted {
            warn!(
                "Correlator[{}]: evicted request {} after {}s without a dispatched response",
                self.tab_id,
                identifier,
                ttl.as_secs()
            );
        }
        Ok(evicted)
    }
}
