use crate::framework::core::ServerError;
use crate::framework::record::NetworkEventRecord;
use http_body_util::{BodyExt, Full};
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{body::Bytes, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

pub const EVENTS_PATH: &str = "/api/events";

/// Development collector: accepts records over HTTP and keeps them in memory
#[derive(Clone)]
pub struct CollectorServer {
    records: Arc<RwLock<Vec<NetworkEventRecord>>>,
    auth_token: Option<Arc<str>>,
}

impl CollectorServer {
    pub fn new(auth_token: Option<String>) -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            auth_token: auth_token.map(Arc::from),
        }
    }

    /// Records accepted so far, in arrival order
    pub async fn records(&self) -> Vec<NetworkEventRecord> {
        self.records.read().await.clone()
    }

    pub async fn start(&self, addr: SocketAddr) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("{}: {}", addr, e)))?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until it fails
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(e.to_string()))?;
        log::info!("🚀 Collector listening on http://{}{}", local_addr, EVENTS_PATH);

        loop {
            let (stream, peer) = listener
                .accept()
                .await
                .map_err(|e| ServerError::RequestError(e.to_string()))?;
            let server = self.clone();

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle_request(req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    log::error!("Collector: error serving connection from {}: {:?}", peer, err);
                }
            });
        }
    }

    async fn handle_request(
        &self,
        req: Request<hyper::body::Incoming>,
    ) -> Result<Response<Full<Bytes>>, Infallible> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        log::debug!("Collector: {} {}", method, path);

        let response = match (&method, path.as_str()) {
            (&Method::POST, EVENTS_PATH) => self.accept_record(req).await,
            (&Method::GET, EVENTS_PATH) => self.list_records().await,
            (_, path) => {
                log::info!("Collector: 404 Not Found: {}", path);
                respond(StatusCode::NOT_FOUND, "text/plain", "Not Found")
            }
        };
        Ok(response)
    }

    fn authorized(&self, req: &Request<hyper::body::Incoming>) -> bool {
        let Some(expected) = &self.auth_token else {
            return true;
        };
        req.headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected.as_ref())
    }

    async fn accept_record(&self, req: Request<hyper::body::Incoming>) -> Response<Full<Bytes>> {
        if !self.authorized(&req) {
            log::warn!("Collector: rejecting record with missing or wrong bearer token");
            return respond(StatusCode::UNAUTHORIZED, "text/plain", "Unauthorized");
        }

        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                log::error!("Collector: failed to read request body: {}", e);
                return respond(StatusCode::BAD_REQUEST, "text/plain", "Unreadable body");
            }
        };

        let record: NetworkEventRecord = match serde_json::from_slice(&body) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Collector: invalid record: {}", e);
                return respond(
                    StatusCode::BAD_REQUEST,
                    "text/plain",
                    format!("Invalid record: {}", e),
                );
            }
        };

        log::info!(
            "Collector: accepted {} {} -> {} (request {})",
            record.method,
            record.url,
            record.status,
            record.identifier
        );
        self.records.write().await.push(record);
        respond(StatusCode::ACCEPTED, "text/plain", "Accepted")
    }

    async fn list_records(&self) -> Response<Full<Bytes>> {
        let records = self.records.read().await;
        match serde_json::to_string(&*records) {
            Ok(json) => respond(StatusCode::OK, "application/json", json),
            Err(e) => {
                log::error!("Collector: failed to encode records: {}", e);
                respond(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", "Internal Server Error")
            }
        }
    }
}

fn respond(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
