use crate::framework::core::Event;
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

/// Type alias for event streams
pub type EventStream = Pin<Box<dyn Stream<Item = Event> + Send>>;

/// Type alias for errors that can be sent between threads
pub type RunnerError = Box<dyn std::error::Error + Send + Sync>;

/// A traffic observer: produces the tab traffic stream fed to the analyzers
#[async_trait]
pub trait Runner: Send + Sync {
    /// Start observing and return the processed event stream
    async fn run(&mut self) -> Result<EventStream, RunnerError>;

    /// Add an analyzer to this runner's processing chain
    fn add_analyzer(self, analyzer: Box<dyn crate::framework::analyzers::Analyzer>) -> Self
    where
        Self: Sized;

    /// Get the name of this runner
    fn name(&self) -> &str;

    /// Get a unique identifier for this runner instance
    fn id(&self) -> String;
}

pub mod common;
pub mod fake;
pub mod replay;

pub use fake::FakeRunner;
pub use replay::ReplayRunner;
