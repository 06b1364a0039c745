use super::{Analyzer, AnalyzerError};
use crate::framework::core::{Event, RequestId, TrafficEvent};
use crate::framework::correlator::{Correlator, Outcome};
use crate::framework::record::NetworkEventRecord;
use crate::framework::runners::EventStream;
use async_trait::async_trait;
use futures::stream::StreamExt;
use log::{debug, error};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Source tag of dispatched record events
pub const CORRELATOR_SOURCE: &str = "correlator";

/// Runs one tab's correlator over the traffic stream.
///
/// Every traffic event for the tab is handled on its own task, chained after
/// the previous task for the same identifier, so a slow body fetch for one
/// request never holds up another. Events that are not traffic for this tab
/// are forwarded untouched, which lets one analyzer per tab be chained.
/// Dispatched records are emitted as `correlator` events.
pub struct CorrelationAnalyzer {
    name: String,
    correlator: Arc<Correlator>,
    pending_ttl: Option<Duration>,
}

impl CorrelationAnalyzer {
    pub fn new(correlator: Correlator) -> Self {
        Self {
            name: format!("CorrelationAnalyzer[tab {}]", correlator.tab_id()),
            correlator: Arc::new(correlator),
            pending_ttl: None,
        }
    }

    /// Periodically evict pending entries older than `ttl`
    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending_ttl = Some(ttl);
        self
    }

    fn record_event(record: &NetworkEventRecord) -> Option<Event> {
        match serde_json::to_value(record) {
            Ok(data) => Some(Event::new(CORRELATOR_SOURCE.to_string(), data)),
            Err(e) => {
                error!("CorrelationAnalyzer: cannot encode record {}: {}", record.identifier, e);
                None
            }
        }
    }

    async fn correlate(
        correlator: Arc<Correlator>,
        traffic: TrafficEvent,
        predecessor: Option<JoinHandle<()>>,
        tx: mpsc::UnboundedSender<Event>,
    ) {
        if let Some(previous) = predecessor {
            let _ = previous.await;
        }

        let identifier = traffic.identifier.clone();
        match correlator.handle(traffic).await {
            Ok(Outcome::Dispatched(record)) => {
                if let Some(event) = Self::record_event(&record) {
                    let _ = tx.send(event);
                }
            }
            Ok(outcome) => {
                debug!(
                    "CorrelationAnalyzer[tab {}]: request {} -> {:?}",
                    correlator.tab_id(),
                    identifier,
                    outcome
                );
            }
            Err(e) => {
                error!(
                    "CorrelationAnalyzer[tab {}]: pending store failure for request {}: {}",
                    correlator.tab_id(),
                    identifier,
                    e
                );
            }
        }
    }
}

#[async_trait]
impl Analyzer for CorrelationAnalyzer {
    async fn process(&mut self, mut stream: EventStream) -> Result<EventStream, AnalyzerError> {
        let correlator = Arc::clone(&self.correlator);
        let pending_ttl = self.pending_ttl;
        let name = self.name.clone();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut in_flight: HashMap<RequestId, JoinHandle<()>> = HashMap::new();
            let mut last_sweep: Option<Instant> = None;

            while let Some(event) = stream.next().await {
                let traffic = match TrafficEvent::from_event(&event) {
                    Some(traffic) if traffic.tab_id == correlator.tab_id() => traffic,
                    _ => {
                        if tx.send(event).is_err() {
                            break;
                        }
                        continue;
                    }
                };

                if let Some(ttl) = pending_ttl {
                    if last_sweep.is_none_or(|at| at.elapsed() >= ttl / 4) {
                        last_sweep = Some(Instant::now());
                        if let Err(e) = correlator.sweep_expired(ttl).await {
                            error!("{}: eviction sweep failed: {}", name, e);
                        }
                    }
                }

                in_flight.retain(|_, handle| !handle.is_finished());
                let identifier = traffic.identifier.clone();
                let predecessor = in_flight.remove(&identifier);
                let task = tokio::spawn(CorrelationAnalyzer::correlate(
                    Arc::clone(&correlator),
                    traffic,
                    predecessor,
                    tx.clone(),
                ));
                in_flight.insert(identifier, task);
            }

            for (_, handle) in in_flight.drain() {
                let _ = handle.await;
            }
            debug!("{}: stream processing completed", name);
        });

        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
