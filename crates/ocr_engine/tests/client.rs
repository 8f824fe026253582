use std::sync::{Arc, Mutex};
use std::time::Duration;

use ocr_engine::wire::{ReasoningFlag, RecognizeRequest};
use ocr_engine::{
    Backend, ClientSettings, EngineEvent, EventSink, FailureKind, ReqwestBackend, StreamEvent,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct TestSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl TestSink {
    fn take(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl EventSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn backend(server: &MockServer) -> ReqwestBackend {
    ReqwestBackend::new(&ClientSettings {
        base_url: server.uri(),
        ..ClientSettings::default()
    })
    .expect("backend")
}

fn request() -> RecognizeRequest {
    RecognizeRequest {
        images: vec!["data:image/png;base64,AAAA".to_string()],
        prompt: String::new(),
        model: Some("vision/model".to_string()),
        enable_reasoning: Some(true),
    }
}

const SSE_BODY: &str = concat!(
    ": OPENROUTER PROCESSING\n",
    "data: {\"choices\":[{\"delta\":{\"reasoning\":\"hmm\"}}]}\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"<|begin_of_box|>INVOICE\"}}]}\n",
    "data: not json\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\" 42<|end_of_box|>\"}}]}\n",
    "data: [DONE]\n",
);

#[tokio::test]
async fn fetches_models_and_history() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [
                {"id": "a", "name": "A", "supports_reasoning": "default"},
                {"id": "b", "name": "B", "supports_reasoning": "false"}
            ],
            "default_model": "b",
            "enable_reasoning_by_default": false
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "history": [{"id": 0, "time": "10:11:12", "text": "hello"}]
        })))
        .mount(&server)
        .await;

    let backend = backend(&server);
    let models = backend.fetch_models().await.expect("models");
    assert_eq!(models.default_model, "b");
    assert!(!models.enable_reasoning_by_default);
    assert_eq!(models.models[0].supports_reasoning, ReasoningFlag::Default);
    assert_eq!(models.models[1].supports_reasoning, ReasoningFlag::False);

    let history = backend.fetch_history().await.expect("history");
    assert_eq!(history.history.len(), 1);
    assert_eq!(history.history[0].time, "10:11:12");
}

#[tokio::test]
async fn stream_recognize_emits_deltas_and_strips_markers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/stream_recognize"))
        .and(body_partial_json(serde_json::json!({
            "model": "vision/model",
            "enable_reasoning": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(SSE_BODY, "text/event-stream"))
        .mount(&server)
        .await;

    let sink = TestSink::default();
    let output = backend(&server)
        .stream_recognize(5, &request(), &sink, &CancellationToken::new())
        .await
        .expect("stream ok");

    assert_eq!(output.text, "INVOICE 42");
    assert_eq!(output.reasoning, "hmm");
    assert_eq!(
        sink.take(),
        vec![
            EngineEvent::RequestSent { run_id: 5 },
            EngineEvent::Stream {
                run_id: 5,
                event: StreamEvent::ReasoningDelta("hmm".to_string()),
            },
            EngineEvent::Stream {
                run_id: 5,
                event: StreamEvent::ContentDelta("<|begin_of_box|>INVOICE".to_string()),
            },
            EngineEvent::Stream {
                run_id: 5,
                event: StreamEvent::ContentDelta(" 42<|end_of_box|>".to_string()),
            },
        ]
    );
}

#[tokio::test]
async fn backend_error_text_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/stream_recognize"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "error": "API error: 401",
            "details": "{\"error\":{\"message\":\"No auth credentials found\"}}"
        })))
        .mount(&server)
        .await;

    let err = backend(&server)
        .stream_recognize(1, &request(), &TestSink::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::HttpStatus(500));
    assert!(err.message.starts_with("API error: 401"));
    assert!(err.message.contains("No auth credentials found"));
}

#[tokio::test]
async fn status_without_error_body_gets_generic_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/stream_recognize"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = backend(&server)
        .stream_recognize(1, &request(), &TestSink::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::HttpStatus(502));
    assert_eq!(err.message, "HTTP error 502 Bad Gateway");
}

#[tokio::test]
async fn upstream_error_inside_stream_fails_the_run() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"par\"}}]}\n",
        "data: {\"error\":{\"message\":\"Rate limit exceeded\"}}\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/stream_recognize"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let err = backend(&server)
        .stream_recognize(1, &request(), &TestSink::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Upstream);
    assert_eq!(err.message, "Rate limit exceeded");
}

#[tokio::test]
async fn cancellation_is_distinct_from_network_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/stream_recognize"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_raw(SSE_BODY, "text/event-stream"),
        )
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let sink = TestSink::default();
    let err = backend(&server)
        .stream_recognize(9, &request(), &sink, &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(sink.take(), vec![EngineEvent::RequestSent { run_id: 9 }]);
}

/// Cancels the run as soon as the first output text arrives.
struct CancelOnContent {
    inner: TestSink,
    cancel: CancellationToken,
}

impl EventSink for CancelOnContent {
    fn emit(&self, event: EngineEvent) {
        if matches!(
            event,
            EngineEvent::Stream {
                event: StreamEvent::ContentDelta(_),
                ..
            }
        ) {
            self.cancel.cancel();
        }
        self.inner.emit(event);
    }
}

/// Serves one streaming response that sends `line` and then stalls.
async fn stalling_backend(line: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut request = vec![0u8; 8192];
        let _ = socket.read(&mut request).await;

        let chunk = format!("{line}\n");
        let head = "HTTP/1.1 200 OK\r\n\
                    Content-Type: text/event-stream\r\n\
                    Transfer-Encoding: chunked\r\n\r\n";
        let body = format!("{:x}\r\n{chunk}\r\n", chunk.len());
        socket.write_all(head.as_bytes()).await.expect("head");
        socket.write_all(body.as_bytes()).await.expect("chunk");
        socket.flush().await.expect("flush");

        // Keep the connection open without finishing the body.
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(socket);
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn cancelling_mid_stream_keeps_delivered_text_and_reports_cancelled() {
    let base_url =
        stalling_backend(r#"data: {"choices":[{"delta":{"content":"PARTIAL"}}]}"#).await;
    let backend = ReqwestBackend::new(&ClientSettings {
        base_url,
        ..ClientSettings::default()
    })
    .expect("backend");

    let cancel = CancellationToken::new();
    let sink = CancelOnContent {
        inner: TestSink::default(),
        cancel: cancel.clone(),
    };
    let err = tokio::time::timeout(
        Duration::from_secs(10),
        backend.stream_recognize(4, &request(), &sink, &cancel),
    )
    .await
    .expect("cancellation should end the stalled stream")
    .unwrap_err();

    assert_eq!(err.kind, FailureKind::Cancelled);
    assert_eq!(
        sink.inner.take(),
        vec![
            EngineEvent::RequestSent { run_id: 4 },
            EngineEvent::Stream {
                run_id: 4,
                event: StreamEvent::ContentDelta("PARTIAL".to_string()),
            },
        ]
    );
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let settings = ClientSettings {
        base_url: "http://127.0.0.1:9".to_string(),
        connect_timeout: Duration::from_millis(200),
        ..ClientSettings::default()
    };
    let err = ReqwestBackend::new(&settings)
        .expect("backend")
        .fetch_models()
        .await
        .unwrap_err();

    assert!(matches!(err.kind, FailureKind::Network | FailureKind::Timeout));
}

#[test]
fn invalid_base_url_is_rejected() {
    let err = ReqwestBackend::new(&ClientSettings {
        base_url: "not a url".to_string(),
        ..ClientSettings::default()
    })
    .unwrap_err();

    assert_eq!(err.kind, FailureKind::InvalidUrl);
}
