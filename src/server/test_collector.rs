use super::collector::{CollectorServer, EVENTS_PATH};
use crate::framework::core::{CollectorConfig, RequestId, TransportError};
use crate::framework::correlator::fixtures::{request_sent, response_received};
use crate::framework::correlator::{Correlator, Outcome};
use crate::framework::dispatcher::{Dispatcher, HttpTransport, Transport};
use crate::framework::filter::ResourceFilter;
use crate::framework::pending::{MemoryStore, PendingStore};
use crate::framework::record::NetworkEventRecord;
use crate::framework::resolver::{FetchedBody, MemoryBodyFetcher};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::Client as LegacyClient;
use hyper_util::rt::TokioExecutor;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

async fn start_collector(
    auth_token: Option<&str>,
) -> (CollectorServer, SocketAddr, JoinHandle<()>) {
    let server = CollectorServer::new(auth_token.map(str::to_string));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let background = server.clone();
    let handle = tokio::spawn(async move {
        let _ = background.serve(listener).await;
    });
    (server, addr, handle)
}

fn collector_config(addr: SocketAddr, auth_token: Option<&str>) -> CollectorConfig {
    CollectorConfig {
        base_url: format!("http://{}", addr),
        auth_token: auth_token.map(str::to_string),
        timeout: Duration::from_secs(2),
        ..CollectorConfig::default()
    }
}

fn sample_record() -> NetworkEventRecord {
    NetworkEventRecord {
        identifier: RequestId::from("7"),
        timestamp: 1000.5,
        resource_type: "Fetch".to_string(),
        url: "https://x/api".to_string(),
        method: "GET".to_string(),
        status: 200,
        request_body: String::new(),
        response_body: "{\"a\":1}".to_string(),
        response_body_is_binary: false,
    }
}

#[tokio::test]
async fn test_transport_posts_to_collector() {
    let (server, addr, handle) = start_collector(None).await;
    let transport = HttpTransport::new(&collector_config(addr, None)).unwrap();
    assert_eq!(transport.endpoint().path(), EVENTS_PATH);

    transport.post_event(&sample_record()).await.unwrap();

    assert_eq!(server.records().await, vec![sample_record()]);
    handle.abort();
}

#[tokio::test]
async fn test_wrong_token_is_rejected() {
    let (server, addr, handle) = start_collector(Some("secret")).await;

    let wrong = HttpTransport::new(&collector_config(addr, Some("guess"))).unwrap();
    assert!(matches!(
        wrong.post_event(&sample_record()).await,
        Err(TransportError::Rejected(401))
    ));

    let anonymous = HttpTransport::new(&collector_config(addr, None)).unwrap();
    assert!(matches!(
        anonymous.post_event(&sample_record()).await,
        Err(TransportError::Rejected(401))
    ));

    let right = HttpTransport::new(&collector_config(addr, Some("secret"))).unwrap();
    right.post_event(&sample_record()).await.unwrap();

    assert_eq!(server.records().await.len(), 1);
    handle.abort();
}

#[tokio::test]
async fn test_unreachable_collector_is_a_network_error() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = HttpTransport::new(&collector_config(addr, None)).unwrap();
    assert!(matches!(
        transport.post_event(&sample_record()).await,
        Err(TransportError::Network(_))
    ));
}

#[tokio::test]
async fn test_collector_routes() {
    let (_server, addr, handle) = start_collector(None).await;
    let client = LegacyClient::builder(TokioExecutor::new()).build_http::<Full<Bytes>>();
    let events_uri: Uri = format!("http://{}{}", addr, EVENTS_PATH).parse().unwrap();

    let bad = Request::builder()
        .method(Method::POST)
        .uri(events_uri.clone())
        .body(Full::new(Bytes::from("not json")))
        .unwrap();
    let response = client.request(bad).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let good = Request::builder()
        .method(Method::POST)
        .uri(events_uri.clone())
        .body(Full::new(Bytes::from(sample_record().to_json().unwrap())))
        .unwrap();
    let response = client.request(good).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = client.get(events_uri).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let listed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(listed[0]["identifier"], "7");
    assert_eq!(listed[0]["responseBody"], "{\"a\":1}");

    let missing: Uri = format!("http://{}/elsewhere", addr).parse().unwrap();
    let response = client.get(missing).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    handle.abort();
}

#[tokio::test]
async fn test_correlator_dispatches_over_http() {
    let (server, addr, handle) = start_collector(Some("secret")).await;
    let transport = HttpTransport::new(&collector_config(addr, Some("secret"))).unwrap();

    let store = MemoryStore::new();
    let fetcher = MemoryBodyFetcher::new();
    fetcher.insert_response_body(
        1,
        RequestId::from("7"),
        FetchedBody {
            body: Some(json!({"a": 1})),
            is_binary: false,
        },
    );
    let correlator = Correlator::new(
        1,
        ResourceFilter::default(),
        Arc::new(store.clone()),
        Arc::new(fetcher),
        Dispatcher::new(Arc::new(transport)),
    );

    let stored = correlator
        .handle(request_sent(1, "7", "Fetch", "https://x/api", "GET"))
        .await
        .unwrap();
    assert_eq!(stored, Outcome::Stored);
    let dispatched = correlator.handle(response_received(1, "7", 200)).await.unwrap();
    assert!(matches!(dispatched, Outcome::Dispatched(_)));

    assert!(store.is_empty());
    assert_eq!(server.records().await, vec![sample_record()]);
    handle.abort();
}

#[tokio::test]
async fn test_rejected_dispatch_keeps_pending_entry() {
    let (server, addr, handle) = start_collector(Some("secret")).await;
    let transport = HttpTransport::new(&collector_config(addr, Some("stale"))).unwrap();

    let store = MemoryStore::new();
    let correlator = Correlator::new(
        1,
        ResourceFilter::default(),
        Arc::new(store.clone()),
        Arc::new(MemoryBodyFetcher::new()),
        Dispatcher::new(Arc::new(transport)),
    );

    correlator.handle(request_sent(1, "9", "XHR", "https://x/form", "POST")).await.unwrap();
    let outcome = correlator.handle(response_received(1, "9", 500)).await.unwrap();
    assert!(matches!(outcome, Outcome::DispatchFailed(_)));

    assert_eq!(store.identifiers().await.unwrap(), vec![RequestId::from("9")]);
    assert!(server.records().await.is_empty());
    handle.abort();
}
