use super::correlation::CORRELATOR_SOURCE;
use super::{Analyzer, AnalyzerError};
use crate::framework::runners::EventStream;
use async_trait::async_trait;
use futures::stream::StreamExt;
use log::{debug, error};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Appends every dispatched record to a JSONL file
pub struct FileLogger {
    name: String,
    file_path: String,
    file_handle: Arc<Mutex<std::fs::File>>,
}

impl FileLogger {
    /// Create a new FileLogger with specified file path
    pub fn new<P: AsRef<Path>>(file_path: P) -> Result<Self, std::io::Error> {
        let path_str = file_path.as_ref().to_string_lossy().to_string();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path_str)?;

        Ok(Self {
            name: "FileLogger".to_string(),
            file_path: path_str,
            file_handle: Arc::new(Mutex::new(file)),
        })
    }
}

#[async_trait]
impl Analyzer for FileLogger {
    async fn process(&mut self, stream: EventStream) -> Result<EventStream, AnalyzerError> {
        let file_handle = Arc::clone(&self.file_handle);
        let file_path = self.file_path.clone();

        let processed_stream = stream.map(move |event| {
            if event.source != CORRELATOR_SOURCE {
                return event;
            }

            debug!("FileLogger: writing record {}", event.data["identifier"]);
            if let Ok(mut file) = file_handle.lock() {
                let log_entry = format!("{}\n", event.data);
                if let Err(e) = file.write_all(log_entry.as_bytes()) {
                    error!("FileLogger: Failed to write to {}: {}", file_path, e);
                } else if let Err(e) = file.flush() {
                    error!("FileLogger: Failed to flush {}: {}", file_path, e);
                }
            }

            // Pass the event through unchanged
            event
        });

        Ok(Box::pin(processed_stream))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
