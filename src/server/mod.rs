//! Local collector endpoint for development
//!
//! Accepts the records the relay posts and keeps them in memory so a
//! pipeline can be exercised end to end without a remote collector.

pub mod collector;

#[cfg(test)]
mod test_collector;

pub use collector::CollectorServer;
