use super::error::ConfigError;
use clap::ValueEnum;
use hyper::Uri;
use std::path::PathBuf;
use std::time::Duration;

/// Default resource types worth correlating: programmatic data fetches
pub const DEFAULT_RESOURCE_TYPES: [&str; 2] = ["Fetch", "XHR"];

/// Deployment environment, used to pick a default collector endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl Environment {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Environment::Local => "http://127.0.0.1:8787",
            Environment::Staging => "http://collector.staging.svc:8787",
            Environment::Production => "http://collector.svc:8787",
        }
    }
}

/// Where and how finished records are delivered
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub base_url: String,
    pub events_path: String,
    pub auth_token: Option<String>,
    pub timeout: Duration,
}

impl CollectorConfig {
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            base_url: environment.default_base_url().to_string(),
            ..Self::default()
        }
    }

    /// Full endpoint URL records are posted to
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.events_path.trim_start_matches('/')
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let uri: Uri = self
            .endpoint()
            .parse()
            .map_err(|e| {
                ConfigError::ParseError(format!("collector url {}: {}", self.base_url, e))
            })?;

        match uri.scheme_str() {
            Some("http") => {}
            Some(other) => {
                return Err(ConfigError::ValidationError(format!(
                    "unsupported collector scheme '{}', expected http",
                    other
                )))
            }
            None => {
                return Err(ConfigError::ValidationError(format!(
                    "collector url {} has no scheme",
                    self.base_url
                )))
            }
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::ValidationError("timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            base_url: Environment::default().default_base_url().to_string(),
            events_path: "/api/events".to_string(),
            auth_token: None,
            timeout: Duration::from_millis(10_000),
        }
    }
}

/// Everything the relay pipeline needs, injected at construction
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub collector: CollectorConfig,
    pub resource_types: Vec<String>,
    /// Enables the file-backed pending store when set
    pub store_dir: Option<PathBuf>,
    /// Evict pending entries older than this; `None` keeps them forever
    pub pending_ttl: Option<Duration>,
}

impl RelayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.collector.validate()?;
        if self.resource_types.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "at least one resource type must be selected".to_string(),
            ));
        }
        if matches!(self.pending_ttl, Some(ttl) if ttl.is_zero()) {
            return Err(ConfigError::ValidationError("pending ttl must be non-zero".to_string()));
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            collector: CollectorConfig::default(),
            resource_types: DEFAULT_RESOURCE_TYPES.iter().map(|t| t.to_string()).collect(),
            store_dir: None,
            pending_ttl: None,
        }
    }
}
