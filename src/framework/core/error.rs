use std::fmt;

#[derive(Debug)]
pub enum FrameworkError {
    Store(StoreError),
    Transport(TransportError),
    Config(ConfigError),
    Server(ServerError),
}

#[derive(Debug)]
pub enum StoreError {
    ReadError(String),
    WriteError(String),
    SerializationError(String),
    LockPoisoned,
}

/// Failure of a follow-up body fetch. Always absorbed by the body resolver.
#[derive(Debug)]
pub enum FetchError {
    NotFound(String),
    TabDetached(u64),
    Protocol(String),
}

#[derive(Debug)]
pub enum TransportError {
    InvalidUri(String),
    SerializationError(String),
    Network(String),
    Timeout,
    Rejected(u16),
}

#[derive(Debug)]
pub enum ConfigError {
    ParseError(String),
    ValidationError(String),
    FileNotFound(String),
}

#[derive(Debug)]
pub enum ServerError {
    BindError(String),
    RequestError(String),
}

impl fmt::Display for FrameworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameworkError::Store(e) => write!(f, "Store error: {}", e),
            FrameworkError::Transport(e) => write!(f, "Transport error: {}", e),
            FrameworkError::Config(e) => write!(f, "Configuration error: {}", e),
            FrameworkError::Server(e) => write!(f, "Server error: {}", e),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::ReadError(msg) => write!(f, "Read error: {}", msg),
            StoreError::WriteError(msg) => write!(f, "Write error: {}", msg),
            StoreError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            StoreError::LockPoisoned => write!(f, "Store lock poisoned"),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::NotFound(id) => write!(f, "No body available for request {}", id),
            FetchError::TabDetached(tab) => write!(f, "Tab {} is no longer attached", tab),
            FetchError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::InvalidUri(msg) => write!(f, "Invalid collector URI: {}", msg),
            TransportError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            TransportError::Network(msg) => write!(f, "Network error: {}", msg),
            TransportError::Timeout => write!(f, "Timeout occurred"),
            TransportError::Rejected(status) => {
                write!(f, "Collector rejected event with status {}", status)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            ConfigError::FileNotFound(path) => write!(f, "File not found: {}", path),
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::BindError(msg) => write!(f, "Bind error: {}", msg),
            ServerError::RequestError(msg) => write!(f, "Request error: {}", msg),
        }
    }
}

impl std::error::Error for FrameworkError {}
impl std::error::Error for StoreError {}
impl std::error::Error for FetchError {}
impl std::error::Error for TransportError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for ServerError {}

// Conversion traits
impl From<StoreError> for FrameworkError {
    fn from(error: StoreError) -> Self {
        FrameworkError::Store(error)
    }
}

impl From<TransportError> for FrameworkError {
    fn from(error: TransportError) -> Self {
        FrameworkError::Transport(error)
    }
}

impl From<ConfigError> for FrameworkError {
    fn from(error: ConfigError) -> Self {
        FrameworkError::Config(error)
    }
}

impl From<ServerError> for FrameworkError {
    fn from(error: ServerError) -> Self {
        FrameworkError::Server(error)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        StoreError::SerializationError(error.to_string())
    }
}
