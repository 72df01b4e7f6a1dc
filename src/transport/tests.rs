// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::config::DEFAULT_USER_AGENT;
use crate::rate_limiter::IntervalLimiter;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport_with(interval: Duration, retry: RetryConfig) -> Transport {
    Transport::new(
        &HttpConfig::default(),
        retry,
        Arc::new(IntervalLimiter::new(interval)),
        CancellationToken::new(),
    )
    .expect("failed to build transport")
}

fn fast_transport() -> Transport {
    transport_with(Duration::ZERO, RetryConfig::disabled())
}

#[tokio::test]
async fn fetch_text_sends_user_agent_and_returns_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/r/pics.json"))
        .and(header("user-agent", DEFAULT_USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":{}}"#))
        .expect(1)
        .mount(&server)
        .await;

    let body = fast_transport()
        .fetch_text(&format!("{}/r/pics.json", server.uri()))
        .await
        .unwrap();

    assert_eq!(body, r#"{"data":{}}"#);
}

#[tokio::test]
async fn non_success_status_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = fast_transport()
        .fetch_text(&format!("{}/missing", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Status(404)), "got {err:?}");
}

#[tokio::test]
async fn empty_text_body_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let err = fast_transport()
        .fetch_text(&format!("{}/empty", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::EmptyBody));
}

#[tokio::test]
async fn fetch_json_passes_extra_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/3/album/abc"))
        .and(header("authorization", "Client-ID test-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let value: serde_json::Value = fast_transport()
        .fetch_json(
            &format!("{}/3/album/abc", server.uri()),
            &[("Authorization", "Client-ID test-id")],
        )
        .await
        .unwrap();

    assert_eq!(value["ok"], true);
}

#[tokio::test]
async fn fetch_json_rejects_wrong_shape() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
        .mount(&server)
        .await;

    let result: Result<serde_json::Value, _> = fast_transport()
        .fetch_json(&format!("{}/api", server.uri()), &[])
        .await;

    assert!(matches!(result, Err(FetchError::InvalidJson(_))));
}

#[tokio::test]
async fn get_with_status_exposes_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .mount(&server)
        .await;

    let reply = fast_transport()
        .get_with_status(&format!("{}/v2/gifs/x", server.uri()), &[])
        .await
        .unwrap();

    assert_eq!(reply.status, 401);
    assert!(!reply.is_success());
    assert_eq!(reply.body, "expired");
}

#[tokio::test]
async fn post_with_status_uses_post() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/auth/temporary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "t" })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = fast_transport()
        .post_with_status(&format!("{}/v2/auth/temporary", server.uri()), &[])
        .await
        .unwrap();

    assert!(reply.is_success());
    let value: serde_json::Value = reply.json().unwrap();
    assert_eq!(value["token"], "t");
}

#[tokio::test]
async fn fetch_binary_streams_to_disk() {
    let server = MockServer::start().await;
    let body = vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 4];
    Mock::given(method("GET"))
        .and(path("/a.jpg"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body.clone(), "image/jpeg"),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("a.jpg");
    let downloaded = fast_transport()
        .fetch_binary(&format!("{}/a.jpg", server.uri()), &dest)
        .await
        .unwrap();

    assert_eq!(downloaded.path, dest);
    assert_eq!(downloaded.bytes, body.len() as u64);
    assert_eq!(downloaded.content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(std::fs::read(&dest).unwrap(), body);
}

#[tokio::test]
async fn failed_binary_fetch_leaves_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("broken.jpg");
    let err = fast_transport()
        .fetch_binary(&format!("{}/broken.jpg", server.uri()), &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Status(500)));
    assert!(!dest.exists());
}

#[tokio::test]
async fn empty_binary_body_is_removed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/png"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("empty.png");
    let err = fast_transport()
        .fetch_binary(&format!("{}/empty.png", server.uri()), &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::EmptyBody));
    assert!(!dest.exists(), "zero-length artifact must not survive");
}

#[tokio::test]
async fn consecutive_calls_respect_minimum_interval() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let interval = Duration::from_millis(150);
    let transport = transport_with(interval, RetryConfig::disabled());
    let url = format!("{}/page", server.uri());

    let start = Instant::now();
    transport.fetch_text(&url).await.unwrap();
    transport.fetch_text(&url).await.unwrap();
    transport.fetch_text(&url).await.unwrap();

    assert!(
        start.elapsed() >= interval * 2,
        "three calls must span at least two intervals, took {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn transient_status_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
        .mount(&server)
        .await;

    let retry = RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    let transport = transport_with(Duration::ZERO, retry);

    let body = transport
        .fetch_text(&format!("{}/flaky", server.uri()))
        .await
        .unwrap();

    assert_eq!(body, "recovered");
}

#[tokio::test]
async fn cancelled_session_fails_fast() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("late"))
        .expect(0)
        .mount(&server)
        .await;

    let transport = fast_transport();
    transport.cancellation().cancel();

    let err = transport
        .fetch_text(&format!("{}/page", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Cancelled));
}

#[tokio::test]
async fn cancellation_during_download_removes_partial_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0u8; 1024])
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let transport = Arc::new(fast_transport());
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("slow.mp4");

    let cancel = transport.cancellation().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let err = transport
        .fetch_binary(&format!("{}/slow.mp4", server.uri()), &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Cancelled));
    assert!(!dest.exists());
}
