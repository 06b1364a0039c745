use super::correlation::CORRELATOR_SOURCE;
use super::{Analyzer, AnalyzerError};
use crate::framework::core::Event;
use crate::framework::runners::EventStream;
use async_trait::async_trait;
use futures::stream::StreamExt;
use std::io::{self, Write};

/// Output analyzer that prints dispatched records as they arrive
pub struct OutputAnalyzer {
    name: String,
    show_timestamps: bool,
    format_json: bool,
}

impl OutputAnalyzer {
    /// Create a new OutputAnalyzer with default formatting
    pub fn new() -> Self {
        Self {
            name: "output".to_string(),
            show_timestamps: true,
            format_json: false,
        }
    }

    /// Create a new OutputAnalyzer with custom formatting options
    pub fn new_with_options(show_timestamps: bool, format_json: bool) -> Self {
        Self {
            name: "output".to_string(),
            show_timestamps,
            format_json,
        }
    }

    fn format_line(event: &Event, show_timestamps: bool, format_json: bool) -> String {
        let mut output_parts = Vec::new();

        if show_timestamps {
            output_parts.push(format!("[{}]", event.datetime().format("%H:%M:%S%.3f")));
        }
        output_parts.push(format!("[{}]", event.source));

        if format_json {
            match event.to_json() {
                Ok(json) => output_parts.push(json),
                Err(_) => output_parts.push(event.data.to_string()),
            }
            return output_parts.join(" ");
        }

        let data = &event.data;
        if event.source == CORRELATOR_SOURCE {
            output_parts.push(format!(
                "{} {} {} -> {} ({} bytes{})",
                data["identifier"].as_str().unwrap_or("?"),
                data["method"].as_str().unwrap_or("?"),
                data["url"].as_str().unwrap_or("?"),
                data["status"],
                data["responseBody"].as_str().map(str::len).unwrap_or(0),
                if data["responseBodyIsBinary"].as_bool().unwrap_or(false) {
                    ", binary"
                } else {
                    ""
                }
            ));
        } else {
            output_parts.push(data.to_string());
        }

        output_parts.join(" ")
    }
}

impl Default for OutputAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Analyzer for OutputAnalyzer {
    async fn process(&mut self, stream: EventStream) -> Result<EventStream, AnalyzerError> {
        let show_timestamps = self.show_timestamps;
        let format_json = self.format_json;

        let processed_stream = stream.map(move |event| {
            println!("{}", Self::format_line(&event, show_timestamps, format_json));
            let _ = io::stdout().flush();

            // Pass the event through unchanged
            event
        });

        Ok(Box::pin(processed_stream))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::json;

    fn record_event() -> Event {
        Event::new(
            CORRELATOR_SOURCE.to_string(),
            json!({
                "identifier": "7",
                "method": "GET",
                "url": "https://x/api",
                "status": 200,
                "responseBody": "{\"a\":1}",
                "responseBodyIsBinary": false
            }),
        )
    }

    #[tokio::test]
    async fn test_output_analyzer_passthrough() {
        let mut analyzer = OutputAnalyzer::new_with_options(false, false);

        let events = vec![
            record_event(),
            Event::new("custom".to_string(), json!({"data": 2})),
        ];

        let input_stream: EventStream = Box::pin(stream::iter(events.clone()));
        let output_stream = analyzer.process(input_stream).await.unwrap();

        let collected: Vec<_> = output_stream.collect().await;
        assert_eq!(collected, events);
    }

    #[test]
    fn test_record_summary_line() {
        let line = OutputAnalyzer::format_line(&record_event(), false, false);
        assert_eq!(line, "[correlator] 7 GET https://x/api -> 200 (7 bytes)");

        let json_line = OutputAnalyzer::format_line(&record_event(), false, true);
        assert!(json_line.starts_with("[correlator] {"));
        let envelope: serde_json::Value =
            serde_json::from_str(json_line.trim_start_matches("[correlator] ")).unwrap();
        assert_eq!(envelope["source"], "correlator");
        assert_eq!(envelope["data"]["status"], 200);
    }

    #[tokio::test]
    async fn test_output_analyzer_name() {
        let analyzer = OutputAnalyzer::new();
        assert_eq!(analyzer.name(), "output");
    }
}
