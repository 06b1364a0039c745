use super::{Runner, EventStream, RunnerError};
use super::common::{parse_capture, AnalyzerProcessor};
use crate::framework::analyzers::Analyzer;
use crate::framework::core::{ConfigError, TabId, TrafficEvent};
use crate::framework::resolver::MemoryBodyFetcher;
use async_trait::async_trait;
use futures::stream;
use log::info;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Replays a recorded JSONL capture as live tab traffic
pub struct ReplayRunner {
    id: String,
    path: PathBuf,
    analyzers: Vec<Box<dyn Analyzer>>,
    fetcher: MemoryBodyFetcher,
    traffic: Option<Vec<TrafficEvent>>,
}

impl ReplayRunner {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            path: path.as_ref().to_path_buf(),
            analyzers: Vec::new(),
            fetcher: MemoryBodyFetcher::new(),
            traffic: None,
        }
    }

    /// Set a custom ID for this runner
    #[allow(dead_code)]
    pub fn with_id(mut self, id: String) -> Self {
        self.id = id;
        self
    }

    /// Read and parse the capture file. Idempotent.
    pub async fn load(&mut self) -> Result<(), ConfigError> {
        if self.traffic.is_some() {
            return Ok(());
        }

        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::FileNotFound(self.path.display().to_string()));
            }
            Err(e) => {
                return Err(ConfigError::ParseError(format!("{}: {}", self.path.display(), e)));
            }
        };

        let traffic = parse_capture(&text, &self.fetcher);
        info!(
            "ReplayRunner: loaded {} traffic events from {}",
            traffic.len(),
            self.path.display()
        );
        self.traffic = Some(traffic);
        Ok(())
    }

    /// Tabs seen in the loaded capture, ascending
    pub fn tab_ids(&self) -> Vec<TabId> {
        self.traffic
            .iter()
            .flatten()
            .map(|traffic| traffic.tab_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Body fetch service holding the captured bodies
    pub fn fetcher(&self) -> MemoryBodyFetcher {
        self.fetcher.clone()
    }
}

#[async_trait]
impl Runner for ReplayRunner {
    async fn run(&mut self) -> Result<EventStream, RunnerError> {
        self.load().await?;

        let events: Vec<_> = self
            .traffic
            .take()
            .unwrap_or_default()
            .into_iter()
            .map(TrafficEvent::into_event)
            .collect();

        info!(
            "ReplayRunner: replaying {} events through {} analyzers",
            events.len(),
            self.analyzers.len()
        );
        AnalyzerProcessor::process_through_analyzers(
            Box::pin(stream::iter(events)),
            &mut self.analyzers,
        )
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
        "replay"
    }

    fn id(&self) -> String {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::analyzers::CorrelationAnalyzer;
    use crate::framework::correlator::Correlator;
    use crate::framework::dispatcher::{Dispatcher, RecordingTransport};
    use crate::framework::filter::ResourceFilter;
    use crate::framework::pending::MemoryStore;
    use futures::stream::StreamExt;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    const CAPTURE: &str = concat!(
        r#"{"kind":"RequestSent","tabId":4,"identifier":"1","payload":{"type":"XHR","#,
        r#""timestamp":12.5,"request":{"url":"https://x/form","#,
        r#""method":"POST","hasPostData":true}}}"#,
        "\n",
        r#"{"kind":"RequestBody","tabId":4,"identifier":"1","body":"a=1"}"#,
        "\n",
        r#"{"kind":"ResponseBody","tabId":4,"identifier":"1","body":"aGk=","base64Encoded":true}"#,
        "\n",
        r#"{"kind":"RequestSent","tabId":9,"identifier":"1","payload":{"type":"Script","#,
        r#""request":{"url":"https://x/app.js","method":"GET"}}}"#,
        "\n",
        r#"{"kind":"ResponseReceived","tabId":9,"identifier":"1","#,
        r#""payload":{"response":{"status":200}}}"#,
        "\n",
        r#"{"kind":"ResponseReceived","tabId":4,"identifier":1,"#,
        r#""payload":{"response":{"status":201}}}"#,
        "\n",
    );

    fn capture_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CAPTURE.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_reports_tabs() {
        let file = capture_file();
        let mut runner = ReplayRunner::new(file.path());
        assert!(runner.tab_ids().is_empty());

        runner.load().await.unwrap();
        assert_eq!(runner.tab_ids(), vec![4, 9]);
    }

    #[tokio::test]
    async fn test_missing_capture_file() {
        let mut runner = ReplayRunner::new("/nonexistent/capture.jsonl");
        assert!(matches!(runner.load().await, Err(ConfigError::FileNotFound(_))));
        assert!(runner.run().await.is_err());
    }

    #[tokio::test]
    async fn test_replay_without_analyzers() {
        let file = capture_file();
        let mut runner = ReplayRunner::new(file.path()).with_id("replay-test".to_string());

        let events: Vec<_> = runner.run().await.unwrap().collect().await;
        assert_eq!(events.len(), 4);
        assert_eq!(runner.id(), "replay-test");
        assert_eq!(runner.name(), "replay");
    }

    #[tokio::test]
    async fn test_replay_correlates_captured_bodies() {
        let file = capture_file();
        let mut runner = ReplayRunner::new(file.path());
        runner.load().await.unwrap();

        let store = MemoryStore::new();
        let transport = Arc::new(RecordingTransport::default());
        let correlator = Correlator::new(
            4,
            ResourceFilter::default(),
            Arc::new(store.clone()),
            Arc::new(runner.fetcher()),
            Dispatcher::new(transport.clone()),
        );
        let mut runner = runner.add_analyzer(Box::new(CorrelationAnalyzer::new(correlator)));

        let events: Vec<_> = runner.run().await.unwrap().collect().await;
        // One record for tab 4, tab 9 traffic forwarded untouched
        assert_eq!(events.len(), 3);

        let records = transport.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://x/form");
        assert_eq!(records[0].status, 201);
        assert_eq!(records[0].timestamp, 12.5);
        assert_eq!(records[0].request_body, "a=1");
        assert_eq!(records[0].response_body, "aGk=");
        assert!(records[0].response_body_is_binary);
        assert!(store.is_empty());
    }
}
