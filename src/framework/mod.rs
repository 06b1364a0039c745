pub mod core;
pub mod filter;
pub mod pending;
pub mod resolver;
pub mod record;
pub mod dispatcher;
pub mod correlator;
pub mod runners;
pub mod analyzers;

// Re-export commonly used types for convenience
#[allow(unused_imports)]
pub use core::{Event, RelayConfig, RequestId, TabId, TrafficEvent};
#[allow(unused_imports)]
pub use runners::{Runner, FakeRunner, ReplayRunner, EventStream, RunnerError};
#[allow(unused_imports)]
pub use analyzers::{Analyzer, CorrelationAnalyzer, FileLogger, OutputAnalyzer};
#[allow(unused_imports)]
pub use correlator::{Correlator, Outcome};
