//! End-to-end tests against a local axum server.

use crate::middleware::{headers, parse, stringify, ParseType};
use crate::protocol::constants::DEFAULT_USER_AGENT;
use crate::*;
use axum::body::Bytes;
use axum::extract::Path;
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response as AxumResponse};
use axum::routing::any;
use axum::Router;
use parking_lot::Mutex;
use serde_json::json;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn redirect() -> AxumResponse {
    (
        StatusCode::FOUND,
        [(header::LOCATION, "/destination")],
        "Found. Redirecting to /destination",
    )
        .into_response()
}

async fn destination(method: Method) -> String {
    format!("welcome {}", method.as_str().to_ascii_lowercase())
}

async fn redirect_n(Path(n): Path<u32>) -> AxumResponse {
    let to = if n <= 1 {
        "/destination".to_string()
    } else {
        format!("/redirect/{}", n - 1)
    };
    (StatusCode::FOUND, [(header::LOCATION, to)]).into_response()
}

async fn redirect_status(Path(code): Path<u16>) -> AxumResponse {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, [(header::LOCATION, "/destination")]).into_response()
}

async fn delay(Path(ms): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    "late"
}

async fn hop() -> AxumResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/delay/1500")]).into_response()
}

async fn echo_headers(headers: HeaderMap) -> axum::Json<serde_json::Value> {
    let map: serde_json::Map<String, serde_json::Value> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                json!(value.to_str().unwrap_or_default()),
            )
        })
        .collect();
    axum::Json(serde_json::Value::Object(map))
}

async fn echo_body(headers: HeaderMap, body: Bytes) -> AxumResponse {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    ([(header::CONTENT_TYPE, content_type)], body).into_response()
}

async fn set_cookie() -> AxumResponse {
    ([(header::SET_COOKIE, "hello=world; Path=/")], "ok").into_response()
}

async fn cookie_redirect() -> AxumResponse {
    (
        StatusCode::FOUND,
        [
            (header::SET_COOKIE, "new=cookie; Path=/"),
            (header::LOCATION, "/cookie/echo"),
        ],
    )
        .into_response()
}

async fn cookie_echo(headers: HeaderMap) -> String {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn download() -> &'static str {
    "hello world!"
}

/// Start the fixture server on an ephemeral port and return its base URL.
async fn serve() -> String {
    init_tracing();

    let app = Router::new()
        .route("/redirect", any(redirect))
        .route("/redirect/{n}", any(redirect_n))
        .route("/status/{code}", any(redirect_status))
        .route("/destination", any(destination))
        .route("/delay/{ms}", any(delay))
        .route("/hop", any(hop))
        .route("/echo", any(echo_headers))
        .route("/echo/body", any(echo_body))
        .route("/cookie", any(set_cookie))
        .route("/cookie/redirect", any(cookie_redirect))
        .route("/cookie/echo", any(cookie_echo))
        .route("/download", any(download));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

#[tokio::test]
async fn test_follows_302_with_get_and_emits_redirect_once() {
    let base = serve().await;
    let redirects = Arc::new(Mutex::new(Vec::new()));

    let req = Client::new().get(format!("{}/redirect", base)).build();
    {
        let redirects = redirects.clone();
        req.on_redirect(move |url| redirects.lock().push(url.to_string()));
    }

    let res = req.await.unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.text().as_deref(), Some("welcome get"));
    assert_eq!(res.url(), format!("{}/destination", base));
    assert_eq!(*redirects.lock(), vec![format!("{}/destination", base)]);
}

#[tokio::test]
async fn test_301_and_303_post_become_get() {
    let base = serve().await;
    let client = Client::new();

    for code in [301, 303] {
        let res = client
            .post(format!("{}/status/{}", base, code))
            .body("payload")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(res.text().as_deref(), Some("welcome get"));
    }
}

#[tokio::test]
async fn test_307_post_needs_confirmation() {
    let base = serve().await;

    let res = Client::new()
        .post(format!("{}/status/307", base))
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 307);

    let transport = HttpTransport::builder()
        .confirm_redirect(|_req, _res| true)
        .build();
    let res = Client::with_transport(Arc::new(transport), ClientConfig::default())
        .post(format!("{}/status/307", base))
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().as_deref(), Some("welcome post"));
}

#[tokio::test]
async fn test_following_can_be_disabled() {
    let base = serve().await;
    let client = Client::with_config(ClientConfig {
        follow_redirects: false,
        ..Default::default()
    });

    let res = client.post(format!("{}/redirect", base)).send().await.unwrap();

    assert_eq!(res.status(), 302);
    assert_eq!(res.text().as_deref(), Some("Found. Redirecting to /destination"));
}

#[tokio::test]
async fn test_default_maximum_of_five_redirects() {
    let base = serve().await;

    let err = Client::new()
        .get(format!("{}/redirect/6", base))
        .send()
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::MaxRedirects);
    assert_eq!(err.message(), "Maximum redirects exceeded: 5");
}

#[tokio::test]
async fn test_raised_maximum_follows_the_chain() {
    let base = serve().await;
    let client = Client::with_config(ClientConfig {
        max_redirects: 10,
        ..Default::default()
    });

    let res = tokio_test::assert_ok!(client.get(format!("{}/redirect/6", base)).send().await);
    assert_eq!(res.text().as_deref(), Some("welcome get"));
}

#[tokio::test]
async fn test_timeout_rejects_slow_response() {
    let base = serve().await;
    let mut req = Client::new()
        .get(format!("{}/delay/1500", base))
        .timeout(Duration::from_millis(100))
        .build();

    let err = tokio_test::assert_err!(req.send().await);

    assert_eq!(err.code(), ErrorCode::Timeout);
    assert_eq!(err.message(), "Timeout of 100ms exceeded");
    assert!(req.is_timed_out());
    assert!(req.is_aborted());
    assert_eq!(req.phase(), Phase::Rejected);
}

#[tokio::test]
async fn test_client_default_timeout_applies() {
    let base = serve().await;
    let client = Client::with_config(ClientConfig {
        request_timeout_ms: 100,
        ..Default::default()
    });

    let err = client
        .get(format!("{}/delay/1500", base))
        .send()
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Timeout);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_abort_during_second_hop() {
    let base = serve().await;
    let req = Client::new().get(format!("{}/hop", base)).build();
    let handle = req.abort_handle();
    let redirects = Arc::new(AtomicUsize::new(0));
    {
        let redirects = redirects.clone();
        req.on_redirect(move |_| {
            redirects.fetch_add(1, Ordering::SeqCst);
        });
    }

    let task = tokio::spawn(req.into_future());
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(redirects.load(Ordering::SeqCst), 1);
    assert!(handle.abort());

    let err = tokio::time::timeout(Duration::from_millis(1000), task)
        .await
        .expect("abort settles before the slow hop answers")
        .unwrap()
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Abort);
    assert!(handle.is_aborted());
    assert_eq!(
        err.request().map(|r| r.url.clone()),
        Some(format!("{}/delay/1500", base))
    );
}

#[tokio::test]
async fn test_timeout_during_second_hop() {
    let base = serve().await;
    let mut req = Client::new()
        .get(format!("{}/hop", base))
        .timeout(Duration::from_millis(300))
        .build();

    let started = std::time::Instant::now();
    let err = req.send().await.unwrap_err();

    assert!(started.elapsed() < Duration::from_millis(1200));
    assert_eq!(err.code(), ErrorCode::Timeout);
    assert_eq!(err.message(), "Timeout of 300ms exceeded");
    assert!(req.is_timed_out());
    assert!(req.is_aborted());
    assert_eq!(req.phase(), Phase::Rejected);
}

#[tokio::test]
async fn test_abort_twice_rejects_once() {
    let base = serve().await;
    let mut req = Client::new().get(format!("{}/destination", base)).build();
    let aborts = Arc::new(AtomicUsize::new(0));
    {
        let aborts = aborts.clone();
        req.on_abort(move || {
            aborts.fetch_add(1, Ordering::SeqCst);
        });
    }

    assert!(req.abort());
    assert!(!req.abort());

    let err = req.send().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Abort);
    assert_eq!(err.message(), "Request aborted");
    assert_eq!(aborts.load(Ordering::SeqCst), 1);
    assert!(!req.is_opened());
}

#[tokio::test]
async fn test_abort_in_flight_from_another_task() {
    let base = serve().await;
    let req = Client::new().get(format!("{}/delay/1500", base)).build();
    let handle = req.abort_handle();

    let task = tokio::spawn(req.into_future());
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.abort();

    let err = task.await.unwrap().unwrap_err();
    assert_eq!(err.code(), ErrorCode::Abort);
    assert!(err.request().is_some());
}

#[tokio::test]
async fn test_invalid_url_is_refused_before_connecting() {
    let err = Client::new().get("http://#test").send().await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::Invalid);
    assert_eq!(err.message(), "Refused to connect to invalid URL \"http://#test\"");
    assert_eq!(err.request().map(|r| r.url.as_str()), Some("http://#test"));
}

#[tokio::test]
async fn test_connection_refused_is_unavailable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = format!("http://{}/", addr);
    let err = Client::new().get(url.clone()).send().await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::Unavailable);
    assert_eq!(err.message(), format!("Unable to connect to \"{}\"", url));
    assert!(std::error::Error::source(&err).is_some());
}

#[tokio::test]
async fn test_cookie_jar_round_trip() {
    let base = serve().await;
    let transport = HttpTransport::builder()
        .jar(Arc::new(MemoryCookieJar::new()))
        .build();
    let client = Client::with_transport(Arc::new(transport), ClientConfig::default());

    let res = client.get(format!("{}/cookie", base)).send().await.unwrap();
    assert!(res.headers().has("Set-Cookie"));
    let sent = res.request().unwrap();
    assert!(!sent.headers.contains_key("Cookie"));

    let res = client.get(format!("{}/cookie/echo", base)).send().await.unwrap();
    assert_eq!(res.text().as_deref(), Some("hello=world"));
    assert!(!res.headers().has("Set-Cookie"));
}

#[tokio::test]
async fn test_cookies_update_over_redirects() {
    let base = serve().await;
    let transport = HttpTransport::builder()
        .jar(Arc::new(MemoryCookieJar::new()))
        .build();

    let res = Request::builder(format!("{}/cookie/redirect", base))
        .transport(Arc::new(transport))
        .send()
        .await
        .unwrap();

    assert!(res.text().unwrap_or_default().starts_with("new=cookie"));
}

#[tokio::test]
async fn test_default_headers_reach_the_server() {
    let base = serve().await;

    let res = Client::new()
        .get(format!("{}/echo", base))
        .header("X-Custom-Header", "custom")
        .header("Host", "spoofed.example")
        .use_middleware(stringify())
        .use_middleware(headers())
        .use_middleware(parse(&[ParseType::Json], true))
        .send()
        .await
        .unwrap();

    let Body::Json(seen) = res.body() else {
        panic!("expected a JSON body, got {:?}", res.body());
    };
    assert_eq!(seen["x-custom-header"], json!("custom"));
    assert_eq!(seen["accept"], json!("*/*"));
    assert_eq!(seen["user-agent"], json!(DEFAULT_USER_AGENT));
    assert_ne!(seen["host"], json!("spoofed.example"));
}

#[tokio::test]
async fn test_json_body_round_trip() {
    let base = serve().await;

    let res = Client::new()
        .post(format!("{}/echo/body", base))
        .json(json!({"username": "relay"}))
        .use_middleware(stringify())
        .use_middleware(headers())
        .use_middleware(parse(&[ParseType::Json], true))
        .send()
        .await
        .unwrap();

    assert_eq!(res.content_type(), Some("application/json"));
    assert!(matches!(res.body(), Body::Json(value) if *value == json!({"username": "relay"})));
}

#[tokio::test]
async fn test_download_progress() {
    let base = serve().await;
    let req = Client::new().get(format!("{}/download", base)).build();
    let events = Arc::new(Mutex::new(Vec::new()));
    {
        let events = events.clone();
        req.on_progress(move |progress| {
            events.lock().push(*progress);
            Ok(())
        });
    }

    let mut req = req;
    let res = req.send().await.unwrap();
    assert_eq!(res.text().as_deref(), Some("hello world!"));

    let progress = req.progress();
    assert_eq!(progress.downloaded_bytes, 12);
    assert_eq!(progress.download_length, Some(12));
    assert_eq!(req.completed(), 1.0);

    let events = events.lock();
    assert!(events.iter().any(|p| p.downloaded_bytes == 12));
    assert_eq!(events.last().map(|p| p.completed()), Some(1.0));
}

#[tokio::test]
async fn test_failing_progress_listener_aborts() {
    let base = serve().await;
    let mut req = Client::new().get(format!("{}/download", base)).build();
    req.on_progress(|_| Err("stop".into()));

    let err = req.send().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Abort);
    assert_eq!(err.message(), "stop");
    assert_eq!(
        std::error::Error::source(&err).map(|s| s.to_string()).as_deref(),
        Some("stop")
    );
}

#[tokio::test]
async fn test_exec_callback() {
    let base = serve().await;
    let (tx, rx) = tokio::sync::oneshot::channel();

    Client::new()
        .get(format!("{}/destination", base))
        .build()
        .exec(move |result| {
            let _ = tx.send(result.map(|res| res.text()));
        });

    let text = rx.await.unwrap().unwrap();
    assert_eq!(text.as_deref(), Some("welcome get"));
}

#[tokio::test]
async fn test_clone_can_be_resent() {
    let base = serve().await;
    let mut req = Client::new().get(format!("{}/destination", base)).build();
    req.send().await.unwrap();

    let err = req.send().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Started);

    let res = req.clone().await.unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn test_against_mock_server() {
    init_tracing();
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/hello")
        .match_header("accept", "*/*")
        .match_header("user-agent", DEFAULT_USER_AGENT)
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_header("X-Trace", "a")
        .with_body("world")
        .create_async()
        .await;

    let res = Client::new()
        .get(format!("{}/hello", server.url()))
        .send()
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(res.ok());
    assert_eq!(res.status_text(), "OK");
    assert_eq!(res.get("x-trace").as_deref(), Some("a"));
    assert_eq!(res.text().as_deref(), Some("world"));
}

#[tokio::test]
async fn test_mock_server_error_status_still_resolves() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("DELETE", "/item")
        .with_status(503)
        .create_async()
        .await;

    let res = Client::new()
        .delete(format!("{}/item", server.url()))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 503);
    assert_eq!(res.status_type(), 5);
    assert!(!res.ok());
}

#[tokio::test]
async fn test_server_reason_phrase_is_kept() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await.unwrap();
        socket
            .write_all(b"HTTP/1.1 200 Everything Fine\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
            .await
            .unwrap();
    });

    let res = Client::new()
        .get(format!("http://{}/", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.status_text(), "Everything Fine");
    assert_eq!(res.text().as_deref(), Some("ok"));
}
