use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use httpmock::prelude::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use alertwatch::config::default_config;
use alertwatch::core::source::{AlertSource, SourceKind};
use alertwatch::sources::fetcher::Fetcher;

fn source(kind_str: &str, endpoint: String) -> AlertSource {
    AlertSource {
        id: "s1".to_string(),
        name: "Test Source".to_string(),
        source_type: kind_str.to_string(),
        kind: SourceKind::from_source_type(kind_str),
        api_endpoint: endpoint,
        is_active: true,
        polling_interval_secs: 300,
        last_poll_at: None,
        health_status: "unknown".to_string(),
        configuration: HashMap::new(),
    }
}

fn fast_fetcher(base_delay_ms: u64) -> Fetcher {
    let mut cfg = default_config();
    cfg.retry_base_delay_ms = base_delay_ms;
    cfg.timeout_ms = 2_000;
    Fetcher::new(&cfg).unwrap()
}

/// Tiny HTTP server that fails the first `failures` requests with a 500
/// and then answers 200. httpmock cannot vary a response across the
/// retries inside one fetch call, so this covers the recovery path.
async fn flaky_server(failures: usize) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            let hit = counter.fetch_add(1, Ordering::SeqCst);
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = if hit < failures {
                "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                    .to_string()
            } else {
                let body = "{\"features\":[]}";
                format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                )
            };
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    (format!("http://{}/feed", addr), hits)
}

#[tokio::test]
async fn resilient_source_recovers_after_two_backoff_delays() {
    let (endpoint, hits) = flaky_server(2).await;
    let fetcher = fast_fetcher(100);
    let src = source("weather-geocmet", endpoint);

    let started = Instant::now();
    let outcome = fetcher.fetch(&src).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.http_status, 200);
    assert_eq!(outcome.payload, "{\"features\":[]}");
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    // Two backoff sleeps: base and base * 2.
    assert!(elapsed.as_millis() >= 300, "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn exhausted_retries_surface_one_error_naming_the_attempts() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/advisories");
        then.status(503);
    });

    let fetcher = fast_fetcher(10);
    let src = source("security-rss", server.url("/advisories"));

    let failure = fetcher.fetch(&src).await.unwrap_err();
    assert_eq!(failure.attempts, 4);
    assert!(failure.message().contains("after 4 attempts"));
    assert_eq!(failure.http_status(), Some(503));
    mock.assert_hits(4);
}

#[tokio::test]
async fn non_resilient_kinds_get_a_single_attempt() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/broadcast");
        then.status(500);
    });

    let fetcher = fast_fetcher(10);
    let src = source("emergency-broadcast", server.url("/broadcast"));

    let failure = fetcher.fetch(&src).await.unwrap_err();
    assert_eq!(failure.attempts, 1);
    assert!(failure.message().contains("after 1 attempts"));
    mock.assert_hits(1);
}

#[tokio::test]
async fn request_carries_accept_header_and_bearer_credential() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/geojson")
            .header("authorization", "Bearer wx-secret")
            .header("accept", SourceKind::WeatherGeocmet.accept_header());
        then.status(200).body("{\"features\":[]}");
    });

    let fetcher = fast_fetcher(10);
    let mut src = source("weather-geocmet", server.url("/geojson"));
    src.configuration
        .insert("api_key".to_string(), "wx-secret".to_string());

    let outcome = fetcher.fetch(&src).await.unwrap();
    assert_eq!(outcome.attempts, 1);
    mock.assert();
}
