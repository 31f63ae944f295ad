// End-to-end tests for the authorization flow: config resolution, launch,
// completion detection, and cache reconciliation against a mock remote API.

use connect_console::auth::attempt::AttemptOutcome;
use connect_console::auth::launcher::FormData;
use connect_console::auth::surface::{AuthSurface, PopupOptions, SurfaceHandle};
use connect_console::auth::{AuthError, DetectionStrategy, InboundMessage};
use connect_console::client::types::ConnectionState;
use connect_console::config::ConsoleConfig;
use connect_console::Session;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

const JSON: (&str, &str) = ("content-type", "application/json");

struct MockHandle {
    closed: AtomicBool,
}

impl SurfaceHandle for MockHandle {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Records opened URLs; optionally blocks popups.
struct MockSurface {
    block_popups: bool,
    popup_urls: Mutex<Vec<String>>,
    frame_urls: Mutex<Vec<String>>,
}

impl MockSurface {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            block_popups: false,
            popup_urls: Mutex::new(Vec::new()),
            frame_urls: Mutex::new(Vec::new()),
        })
    }

    fn blocking() -> Arc<Self> {
        Arc::new(Self {
            block_popups: true,
            popup_urls: Mutex::new(Vec::new()),
            frame_urls: Mutex::new(Vec::new()),
        })
    }

    fn popup_urls(&self) -> Vec<String> {
        self.popup_urls.lock().unwrap().clone()
    }
}

impl AuthSurface for MockSurface {
    fn open_popup(&self, url: &Url, _options: &PopupOptions) -> Option<Arc<dyn SurfaceHandle>> {
        if self.block_popups {
            return None;
        }
        self.popup_urls.lock().unwrap().push(url.to_string());
        Some(Arc::new(MockHandle {
            closed: AtomicBool::new(false),
        }))
    }

    fn open_hidden_frame(&self, url: &Url) -> Arc<dyn SurfaceHandle> {
        self.frame_urls.lock().unwrap().push(url.to_string());
        Arc::new(MockHandle {
            closed: AtomicBool::new(false),
        })
    }
}

fn config(base_url: String, strategy: DetectionStrategy) -> ConsoleConfig {
    let mut config = ConsoleConfig::default();
    config.api.base_url = base_url;
    config.auth.strategy = strategy;
    config.auth.poll_interval_ms = 20;
    config.auth.attempt_timeout_seconds = 10;
    config
}

async fn mock_begin_auth(server: &mut mockito::Server, auth_url: &str) -> mockito::Mock {
    server
        .mock("GET", "/auth/salesforce/begin")
        .with_status(200)
        .with_header(JSON.0, JSON.1)
        .with_body(
            json!({
                "auth_method": "oauth2+fields",
                "auth_params": [{
                    "id": "api_key",
                    "type": "string",
                    "label": "API Key",
                    "required": true
                }],
                "base_connection_url": auth_url,
            })
            .to_string(),
        )
        .create_async()
        .await
}

fn api_key_form(value: &str) -> FormData {
    let mut form = FormData::new();
    form.insert("api_key".to_string(), json!(value));
    form
}

#[tokio::test]
async fn test_end_to_end_poll_flow() {
    let mut server = mockito::Server::new_async().await;
    mock_begin_auth(
        &mut server,
        "https://api.example.com/connection-popup?token=tok&requestId=2",
    )
    .await;

    // pending, pending, then success; polling must stop at the terminal poll
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_mock = Arc::clone(&calls);
    let status_mock = server
        .mock("GET", "/auth/salesforce/status/2")
        .with_status(200)
        .with_header(JSON.0, JSON.1)
        .with_body_from_request(move |_| {
            let n = calls_in_mock.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= 3 {
                br#"{"status": "success"}"#.to_vec()
            } else {
                br#"{"status": "pending"}"#.to_vec()
            }
        })
        .expect(3)
        .create_async()
        .await;

    let connection_mock = server
        .mock("GET", "/auth/salesforce/connection")
        .with_status(200)
        .with_header(JSON.0, JSON.1)
        .with_body(
            r#"{"id": "conn-9", "key": "salesforce", "name": "Salesforce", "state": "READY"}"#,
        )
        .create_async()
        .await;

    let surface = MockSurface::new();
    let session = Session::new(
        config(server.url(), DetectionStrategy::Poll),
        surface.clone(),
    );

    let attempt = session.connect("salesforce", api_key_form("abc")).await.unwrap();
    assert_eq!(attempt.request_id(), Some("2"));

    // The popup URL carries the submitted fields, URL-encoded
    let urls = surface.popup_urls();
    assert_eq!(urls.len(), 1);
    assert!(
        urls[0].contains("connectionParameters=%7B%22api_key%22%3A%22abc%22%7D"),
        "url was: {}",
        urls[0]
    );

    let outcome = attempt.wait().await;
    assert!(outcome.is_success());

    // No polls after the terminal one
    tokio::time::sleep(Duration::from_millis(100)).await;
    status_mock.assert_async().await;

    // Success invalidated the cache; the next read fetches the real state
    let connection = session.connection_state("salesforce").await.unwrap().unwrap();
    assert_eq!(connection.state, ConnectionState::Ready);
    connection_mock.assert_async().await;
}

#[tokio::test]
async fn test_end_to_end_message_flow_with_duplicate_delivery() {
    let mut server = mockito::Server::new_async().await;
    mock_begin_auth(&mut server, "https://api.example.com/connection-popup?token=tok").await;

    let surface = MockSurface::new();
    let session = Session::new(
        config(server.url(), DetectionStrategy::Message),
        surface.clone(),
    );

    let attempt = session.connect("salesforce", api_key_form("abc")).await.unwrap();
    let tx = attempt.message_sender().unwrap();

    let ready = InboundMessage::new(
        "https://api.example.com",
        json!({"connection": {"state": "READY"}}),
    );
    tx.send(ready.clone()).await.unwrap();
    let _ = tx.send(ready).await; // duplicate must be ignored

    assert!(attempt.wait().await.is_success());
}

#[tokio::test]
async fn test_message_from_untrusted_origin_is_dropped() {
    let mut server = mockito::Server::new_async().await;
    mock_begin_auth(&mut server, "https://api.example.com/connection-popup?token=tok").await;

    let session = Session::new(
        config(server.url(), DetectionStrategy::Message),
        MockSurface::new(),
    );

    let attempt = session.connect("salesforce", api_key_form("abc")).await.unwrap();
    let tx = attempt.message_sender().unwrap();

    tx.send(InboundMessage::new(
        "https://evil.example.com",
        json!({"status": "success"}),
    ))
    .await
    .unwrap();
    tx.send(InboundMessage::new(
        "https://api.example.com",
        json!({"status": "error", "error_message": "user denied"}),
    ))
    .await
    .unwrap();

    match attempt.wait().await {
        AttemptOutcome::Failed(AuthError::AuthRemote { message }) => {
            assert_eq!(message, "user denied");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_validation_failure_opens_nothing() {
    let mut server = mockito::Server::new_async().await;
    mock_begin_auth(&mut server, "https://api.example.com/connection-popup?requestId=2").await;

    let surface = MockSurface::new();
    let session = Session::new(
        config(server.url(), DetectionStrategy::Poll),
        surface.clone(),
    );

    let err = session
        .connect("salesforce", FormData::new())
        .await
        .unwrap_err();

    let fields = err.field_errors().expect("validation error");
    assert_eq!(fields.get("api_key").unwrap(), "API Key is required");
    assert!(surface.popup_urls().is_empty());
    assert_eq!(session.attempts().active_count(), 0);
}

#[tokio::test]
async fn test_popup_blocked_starts_no_detector() {
    let mut server = mockito::Server::new_async().await;
    mock_begin_auth(&mut server, "https://api.example.com/connection-popup?requestId=2").await;

    // Any status poll would hit this mock; none may arrive
    let status_mock = server
        .mock("GET", "/auth/salesforce/status/2")
        .with_status(200)
        .with_header(JSON.0, JSON.1)
        .with_body(r#"{"status": "pending"}"#)
        .expect(0)
        .create_async()
        .await;

    let session = Session::new(
        config(server.url(), DetectionStrategy::Poll),
        MockSurface::blocking(),
    );

    let err = session
        .connect("salesforce", api_key_form("abc"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::PopupBlocked));

    tokio::time::sleep(Duration::from_millis(100)).await;
    status_mock.assert_async().await;
    assert_eq!(session.attempts().active_count(), 0);
}

#[tokio::test]
async fn test_poll_transport_failure_is_terminal() {
    let mut server = mockito::Server::new_async().await;
    mock_begin_auth(&mut server, "https://api.example.com/connection-popup?requestId=2").await;

    let status_mock = server
        .mock("GET", "/auth/salesforce/status/2")
        .with_status(502)
        .expect(1)
        .create_async()
        .await;

    let session = Session::new(
        config(server.url(), DetectionStrategy::Poll),
        MockSurface::new(),
    );

    let attempt = session.connect("salesforce", api_key_form("abc")).await.unwrap();
    match attempt.wait().await {
        AttemptOutcome::Failed(AuthError::PollTransport { .. }) => {}
        other => panic!("unexpected outcome: {other:?}"),
    }

    // The failed poll is terminal; no retries follow
    tokio::time::sleep(Duration::from_millis(100)).await;
    status_mock.assert_async().await;
}

#[tokio::test]
async fn test_config_fetch_failure() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/auth/salesforce/begin")
        .with_status(500)
        .create_async()
        .await;

    let session = Session::new(
        config(server.url(), DetectionStrategy::Poll),
        MockSurface::new(),
    );

    let err = session
        .connect("salesforce", api_key_form("abc"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ConfigFetch { .. }));
}

#[tokio::test]
async fn test_second_connect_cancels_first_attempt() {
    let mut server = mockito::Server::new_async().await;
    mock_begin_auth(&mut server, "https://api.example.com/connection-popup?token=tok").await;

    let session = Session::new(
        config(server.url(), DetectionStrategy::Message),
        MockSurface::new(),
    );

    let first = session.connect("salesforce", api_key_form("abc")).await.unwrap();
    let second = session.connect("salesforce", api_key_form("abc")).await.unwrap();

    match first.wait().await {
        AttemptOutcome::Failed(AuthError::Cancelled) => {}
        other => panic!("expected cancellation, got {other:?}"),
    }

    // The replacement still completes normally
    let tx = second.message_sender().unwrap();
    tx.send(InboundMessage::new(
        "https://api.example.com",
        json!({"status": "success"}),
    ))
    .await
    .unwrap();
    assert!(second.wait().await.is_success());
}

#[tokio::test]
async fn test_cancel_connect_tears_down_attempt() {
    let mut server = mockito::Server::new_async().await;
    mock_begin_auth(&mut server, "https://api.example.com/connection-popup?token=tok").await;

    let session = Session::new(
        config(server.url(), DetectionStrategy::Message),
        MockSurface::new(),
    );

    let attempt = session.connect("salesforce", api_key_form("abc")).await.unwrap();
    assert!(session.cancel_connect("salesforce"));

    match attempt.wait().await {
        AttemptOutcome::Failed(AuthError::Cancelled) => {}
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(session.attempts().active_count(), 0);
}

#[tokio::test]
async fn test_disconnect_invalidates_cached_state() {
    let mut server = mockito::Server::new_async().await;

    let archive_mock = server
        .mock("GET", "/archive-connection/conn-1")
        .with_status(200)
        .with_header(JSON.0, JSON.1)
        .with_body(r#"{"success": true}"#)
        .create_async()
        .await;

    // After invalidation the next read must re-fetch; the remote now 404s
    let connection_mock = server
        .mock("GET", "/auth/salesforce/connection")
        .with_status(404)
        .create_async()
        .await;

    let session = Session::new(
        config(server.url(), DetectionStrategy::Poll),
        MockSurface::new(),
    );

    session.cache().insert(
        "salesforce",
        serde_json::from_value(json!({
            "id": "conn-1", "key": "salesforce", "name": "Salesforce",
            "state": "READY"
        }))
        .unwrap(),
    );

    session.disconnect("salesforce", "conn-1").await.unwrap();

    let connection = session.connection_state("salesforce").await.unwrap();
    assert!(connection.is_none());
    archive_mock.assert_async().await;
    connection_mock.assert_async().await;
}
