use crate::framework::runners::EventStream;
use async_trait::async_trait;

/// Type alias for errors that can be sent between threads
pub type AnalyzerError = Box<dyn std::error::Error + Send + Sync>;

/// Base trait for all analyzers that process event streams
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Process an event stream and return a processed stream
    async fn process(&mut self, stream: EventStream) -> Result<EventStream, AnalyzerError>;

    /// Get the name of this analyzer
    fn name(&self) -> &str;
}

pub mod correlation;
pub mod file_logger;
pub mod output;

pub use correlation::{CorrelationAnalyzer, CORRELATOR_SOURCE};
pub use file_logger::FileLogger;
pub use output::OutputAnalyzer;
