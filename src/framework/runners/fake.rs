use super::{Runner, EventStream, RunnerError};
use super::common::AnalyzerProcessor;
use crate::framework::core::{now_millis, EventKind, RequestId, TabId, TrafficEvent};
use crate::framework::analyzers::Analyzer;
use crate::framework::resolver::{FetchedBody, MemoryBodyFetcher};
use async_trait::async_trait;
use log::{debug, info};
use uuid::Uuid;
use serde_json::json;
use tokio::time::{sleep, Duration};

/// Fake runner that simulates one tab's network traffic.
///
/// Every fourth pair cycles through: a Fetch GET, an XHR POST whose post
/// data is left for the body fetch, an Image load and a Fetch that ends in
/// a 404. A response with no matching request closes the run. Bodies are
/// registered with the runner's fetcher before the traffic is yielded.
pub struct FakeRunner {
    id: String,
    analyzers: Vec<Box<dyn Analyzer>>,
    tab_id: TabId,
    event_count: usize,
    delay_ms: u64,
    fetcher: MemoryBodyFetcher,
}

impl FakeRunner {
    /// Create a new FakeRunner
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            analyzers: Vec::new(),
            tab_id: 1,
            event_count: 5, // 5 request/response pairs plus the orphan
            delay_ms: 100,
            fetcher: MemoryBodyFetcher::new(),
        }
    }

    /// Tab the simulated traffic belongs to
    pub fn tab_id(mut self, tab_id: TabId) -> Self {
        self.tab_id = tab_id;
        self
    }

    /// Number of request/response pairs to generate
    pub fn event_count(mut self, count: usize) -> Self {
        self.event_count = count;
        self
    }

    /// Set delay between pairs in milliseconds
    pub fn delay_ms(mut self, delay: u64) -> Self {
        self.delay_ms = delay;
        self
    }

    /// Set a custom ID for this runner
    #[allow(dead_code)]
    pub fn with_id(mut self, id: String) -> Self {
        self.id = id;
        self
    }

    /// Body fetch service holding the simulated bodies
    pub fn fetcher(&self) -> MemoryBodyFetcher {
        self.fetcher.clone()
    }

    fn identifier(pair_id: usize) -> String {
        format!("fake-{}", pair_id)
    }

    /// Generate the request half of a pair, registering its bodies
    fn generate_request(
        tab_id: TabId,
        pair_id: usize,
        fetcher: &MemoryBodyFetcher,
    ) -> TrafficEvent {
        let identifier = Self::identifier(pair_id);
        let timestamp = now_millis() as f64 / 1000.0;

        let (resource_type, url, method, extra) = match pair_id % 4 {
            0 => {
                fetcher.insert_response_body(
                    tab_id,
                    RequestId::new(identifier.clone()),
                    FetchedBody {
                        body: Some(json!({"id": pair_id, "items": ["alpha", "beta"]})),
                        is_binary: false,
                    },
                );
                let url = format!("https://app.example.com/api/items/{}", pair_id);
                ("Fetch", url, "GET", json!({}))
            }
            1 => {
                fetcher.insert_request_body(
                    tab_id,
                    RequestId::new(identifier.clone()),
                    json!(format!("comment=hello+{}", pair_id)),
                );
                fetcher.insert_response_body(
                    tab_id,
                    RequestId::new(identifier.clone()),
                    FetchedBody {
                        body: Some(json!({"created": true})),
                        is_binary: false,
                    },
                );
                let url = "https://app.example.com/api/comments".to_string();
                ("XHR", url, "POST", json!({"hasPostData": true}))
            }
            2 => {
                fetcher.insert_response_body(
                    tab_id,
                    RequestId::new(identifier.clone()),
                    FetchedBody {
                        body: Some(json!("iVBORw0KGgo=")),
                        is_binary: true,
                    },
                );
                let url = format!("https://cdn.example.com/logo-{}.png", pair_id);
                ("Image", url, "GET", json!({}))
            }
            _ => {
                fetcher.insert_response_body(
                    tab_id,
                    RequestId::new(identifier.clone()),
                    FetchedBody {
                        body: Some(json!("not found")),
                        is_binary: false,
                    },
                );
                let url = format!("https://app.example.com/api/missing/{}", pair_id);
                ("Fetch", url, "GET", json!({}))
            }
        };

        let mut request = json!({"url": url, "method": method});
        if let (Some(request), Some(extra)) = (request.as_object_mut(), extra.as_object()) {
            request.extend(extra.clone());
        }

        TrafficEvent::new(
            EventKind::RequestSent,
            tab_id,
            identifier.clone(),
            json!({
                "requestId": identifier,
                "timestamp": timestamp,
                "type": resource_type,
                "request": request,
            }),
        )
    }

    /// Generate the response half of a pair
    fn generate_response(tab_id: TabId, pair_id: usize) -> TrafficEvent {
        let identifier = Self::identifier(pair_id);
        let (resource_type, status) = match pair_id % 4 {
            0 => ("Fetch", 200),
            1 => ("XHR", 201),
            2 => ("Image", 200),
            _ => ("Fetch", 404),
        };

        TrafficEvent::new(
            EventKind::ResponseReceived,
            tab_id,
            identifier.clone(),
            json!({
                "requestId": identifier,
                "type": resource_type,
                "response": {"status": status},
            }),
        )
    }

    /// A response whose request was never observed
    fn generate_orphan(tab_id: TabId) -> TrafficEvent {
        TrafficEvent::new(
            EventKind::ResponseReceived,
            tab_id,
            "fake-orphan",
            json!({"requestId": "fake-orphan", "type": "Fetch", "response": {"status": 200}}),
        )
    }
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runner for FakeRunner {
    async fn run(&mut self) -> Result<EventStream, RunnerError> {
        info!(
            "FakeRunner: generating {} request/response pairs for tab {} with {}ms delay",
            self.event_count, self.tab_id, self.delay_ms
        );

        let event_count = self.event_count;
        let delay_ms = self.delay_ms;
        let tab_id = self.tab_id;
        let fetcher = self.fetcher.clone();
        fetcher.attach(tab_id);

        let event_stream = async_stream::stream! {
            for i in 0..event_count {
                let request = Self::generate_request(tab_id, i, &fetcher);
                debug!("FakeRunner: yielding request {}", request.identifier);
                yield request.into_event();

                // Small delay between request and response
                sleep(Duration::from_millis(delay_ms / 4)).await;

                let response = Self::generate_response(tab_id, i);
                debug!("FakeRunner: yielding response {}", response.identifier);
                yield response.into_event();

                if i + 1 < event_count {
                    sleep(Duration::from_millis(delay_ms)).await;
                }
            }

            if event_count > 0 {
                yield Self::generate_orphan(tab_id).into_event();
            }

            debug!("FakeRunner: completed {} pairs", event_count);
        };

        AnalyzerProcessor::process_through_analyzers(Box::pin(event_stream), &mut self.analyzers)
            .await
    }

    fn add_analyzer(mut self, analyzer: Box<dyn Analyzer>) -> Self
    where
        Self: Sized
    {
        self.analyzers.push(analyzer);
        self
    }

    fn name(&self) -> &str {
        "fake"
    }

    fn id(&self) -> String {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::analyzers::{CorrelationAnalyzer, CORRELATOR_SOURCE, OutputAnalyzer};
    use crate::framework::correlator::Correlator;
    use crate::framework::dispatcher::{Dispatcher, RecordingTransport};
    use crate::framework::filter::ResourceFilter;
    use crate::framework::pending::MemoryStore;
    use futures::stream::StreamExt;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_fake_runner_basic() {
        let mut runner = FakeRunner::new()
            .with_id("test-basic".to_string())
            .tab_id(3)
            .event_count(2)
            .delay_ms(10);

        let stream = runner.run().await.unwrap();
        let events: Vec<_> = stream.collect().await;

        // 2 pairs plus the orphan response
        assert_eq!(events.len(), 5);

        let traffic: Vec<_> = events.iter().filter_map(TrafficEvent::from_event).collect();
        assert_eq!(traffic.len(), 5);
        assert_eq!(traffic[0].kind, EventKind::RequestSent);
        assert_eq!(traffic[1].kind, EventKind::ResponseReceived);
        assert_eq!(traffic[0].identifier, traffic[1].identifier);
        assert_eq!(traffic[4].identifier, RequestId::from("fake-orphan"));
        assert!(traffic.iter().all(|t| t.tab_id == 3));

        let post = traffic[2].request_sent().unwrap();
        assert_eq!(post.resource_type.as_deref(), Some("XHR"));
        assert!(post.request.has_post_data);
        assert!(post.request.post_data.is_none());
    }

    #[tokio::test]
    async fn test_fake_runner_through_correlation() {
        let store = MemoryStore::new();
        let transport = Arc::new(RecordingTransport::default());
        let mut runner = FakeRunner::new().tab_id(1).event_count(4).delay_ms(1);
        let correlator = Correlator::new(
            1,
            ResourceFilter::default(),
            Arc::new(store.clone()),
            Arc::new(runner.fetcher()),
            Dispatcher::new(transport.clone()),
        );
        runner = runner
            .add_analyzer(Box::new(CorrelationAnalyzer::new(correlator)))
            .add_analyzer(Box::new(OutputAnalyzer::new_with_options(false, false)));

        let stream = runner.run().await.unwrap();
        let events: Vec<_> = stream.collect().await;

        // Image filtered, orphan ignored
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.source == CORRELATOR_SOURCE));

        let mut records = transport.records();
        records.sort_by(|a, b| a.identifier.as_str().cmp(b.identifier.as_str()));
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].status, 200);
        assert_eq!(records[0].response_body, "{\"id\":0,\"items\":[\"alpha\",\"beta\"]}");
        assert_eq!(records[1].method, "POST");
        assert_eq!(records[1].request_body, "comment=hello+1");
        assert_eq!(records[2].status, 404);
        assert_eq!(records[2].response_body, "not found");

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_fake_runner_empty() {
        let mut runner = FakeRunner::new().event_count(0).delay_ms(1);
        let stream = runner.run().await.unwrap();
        let events: Vec<_> = stream.collect().await;
        assert!(events.is_empty());
    }

    #[test]
    fn test_fake_runner_builder_pattern() {
        let runner = FakeRunner::new()
            .with_id("test-builder".to_string())
            .event_count(10)
            .delay_ms(50)
            .add_analyzer(Box::new(OutputAnalyzer::new()));

        assert_eq!(runner.id(), "test-builder");
        assert_eq!(runner.name(), "fake");
    }
}
