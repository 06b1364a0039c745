use crate::framework::core::{CollectorConfig, TransportError};
use crate::framework::record::NetworkEventRecord;
use async_trait::async_trait;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{header, Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use log::{debug, error};
use std::sync::Arc;
use std::time::Duration;

/// Outbound delivery of finished records
#[async_trait]
pub trait Transport: Send + Sync {
    /// `Ok` only when the collector accepted the record
    async fn post_event(&self, record: &NetworkEventRecord) -> Result<(), TransportError>;

    fn name(&self) -> &str;
}

/// Posts records as JSON to the configured collector endpoint
pub struct HttpTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    endpoint: Uri,
    auth_token: Option<String>,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &CollectorConfig) -> Result<Self, TransportError> {
        let endpoint: Uri = config
            .endpoint()
            .parse::<Uri>()
            .map_err(|e| TransportError::InvalidUri(e.to_string()))?;

        Ok(Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            endpoint,
            auth_token: config.auth_token.clone(),
            timeout: config.timeout,
        })
    }

    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_event(&self, record: &NetworkEventRecord) -> Result<(), TransportError> {
        let body = record
            .to_json()
            .map_err(|e| TransportError::SerializationError(e.to_string()))?;

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = &self.auth_token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = builder
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| TransportError::InvalidUri(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Rejected(status.as_u16()))
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Hands finished records to the transport. No inline retry: a rejected
/// record leaves its pending entry in place.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn send(&self, record: &NetworkEventRecord) -> bool {
        match self.transport.post_event(record).await {
            Ok(()) => {
                debug!(
                    "Dispatcher: {} accepted record {} ({} {})",
                    self.transport.name(),
                    record.identifier,
                    record.method,
                    record.url
                );
                true
            }
            Err(e) => {
                error!(
                    "Dispatcher: failed to deliver record {} ({} {}) via {}: {}",
                    record.identifier,
                    record.method,
                    record.url,
                    self.transport.name(),
                    e
                );
                false
            }
        }
    }
}

/// In-process transport that records what it was given
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingTransport {
    pub reject: std::sync::atomic::AtomicBool,
    pub records: std::sync::Mutex<Vec<NetworkEventRecord>>,
}

#[cfg(test)]
impl RecordingTransport {
    pub fn rejecting() -> Self {
        let transport = Self::default();
        transport.reject.store(true, std::sync::atomic::Ordering::SeqCst);
        transport
    }

    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<NetworkEventRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Transport for RecordingTransport {
    async fn post_event(&self, record: &NetworkEventRecord) -> Result<(), TransportError> {
        self.records.lock().unwrap().push(record.clone());
        if self.reject.load(std::sync::atomic::Ordering::SeqCst) {
            Err(TransportError::Rejected(503))
        } else {
            Ok(())
        }
    }

    fn name(&self) -> &str {
        "recording"
    }
}
