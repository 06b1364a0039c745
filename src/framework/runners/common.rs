use crate::framework::analyzers::Analyzer;
use crate::framework::core::{EventKind, RequestId, TabId, TrafficEvent};
use crate::framework::resolver::{FetchedBody, MemoryBodyFetcher};
use super::{EventStream, RunnerError};
use log::warn;
use serde::Deserialize;
use serde_json::Value;

/// One line of a traffic capture file
#[derive(Debug, Deserialize)]
#[serde(tag = "kind")]
pub enum CaptureLine {
    RequestSent(TrafficLine),
    ResponseReceived(TrafficLine),
    #[serde(rename_all = "camelCase")]
    RequestBody {
        tab_id: TabId,
        identifier: RequestId,
        body: Value,
    },
    #[serde(rename_all = "camelCase")]
    ResponseBody {
        tab_id: TabId,
        identifier: RequestId,
        #[serde(default)]
        body: Option<Value>,
        #[serde(default)]
        base64_encoded: bool,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficLine {
    pub tab_id: TabId,
    pub identifier: RequestId,
    #[serde(default)]
    pub payload: Value,
}

impl TrafficLine {
    fn into_traffic(self, kind: EventKind) -> TrafficEvent {
        TrafficEvent {
            kind,
            tab_id: self.tab_id,
            identifier: self.identifier,
            payload: self.payload,
        }
    }
}

/// Parse a JSONL capture. Body lines go into `fetcher`; traffic lines are
/// returned in file order. Blank lines are skipped, malformed ones logged.
pub fn parse_capture(text: &str, fetcher: &MemoryBodyFetcher) -> Vec<TrafficEvent> {
    let mut traffic = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parsed: CaptureLine = match serde_json::from_str(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Capture: skipping line {}: {}", index + 1, e);
                continue;
            }
        };

        match parsed {
            CaptureLine::RequestSent(line) => {
                fetcher.attach(line.tab_id);
                traffic.push(line.into_traffic(EventKind::RequestSent));
            }
            CaptureLine::ResponseReceived(line) => {
                fetcher.attach(line.tab_id);
                traffic.push(line.into_traffic(EventKind::ResponseReceived));
            }
            CaptureLine::RequestBody { tab_id, identifier, body } => {
                fetcher.insert_request_body(tab_id, identifier, body);
            }
            CaptureLine::ResponseBody { tab_id, identifier, body, base64_encoded } => {
                fetcher.insert_response_body(
                    tab_id,
                    identifier,
                    FetchedBody {
                        body,
                        is_binary: base64_encoded,
                    },
                );
            }
        }
    }

    traffic
}

/// Common analyzer processor for runners
pub struct AnalyzerProcessor;

impl AnalyzerProcessor {
    /// Process events through a chain of analyzers
    pub async fn process_through_analyzers(
        mut stream: EventStream,
        analyzers: &mut [Box<dyn Analyzer>],
    ) -> Result<EventStream, RunnerError> {
        // Process through each analyzer in sequence
        for analyzer in analyzers.iter_mut() {
            stream = analyzer.process(stream).await?;
        }

        Ok(stream)
    }
}
