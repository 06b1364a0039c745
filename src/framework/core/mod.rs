pub mod events;
pub mod traffic;
pub mod config;
pub mod error;

pub use events::*;
pub use traffic::*;
pub use config::*;
pub use error::*;
