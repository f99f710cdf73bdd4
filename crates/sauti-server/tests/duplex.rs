//! End-to-end duplex protocol tests against a real listener.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use sauti_core::protocol::request::{
    RequestBody, RequestEnvelope, SynthesisInput, SynthesisOptions, TextLanguageDetectionOptions,
};
use sauti_core::protocol::response::{ResponseBody, ResponseEnvelope};
use sauti_core::{Executor, ExecutorKind, FfmpegTranscoder, PackageResolver, ServerConfig};
use sauti_server::backend::BasicBackend;
use sauti_server::state::AppState;
use sauti_server::{build_router, routing};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn start_server() -> (SocketAddr, tempfile::TempDir) {
    let packages_dir = tempfile::tempdir().unwrap();
    let backend = BasicBackend::new(
        PackageResolver::new(packages_dir.path()),
        FfmpegTranscoder::default(),
    );

    let (engine, events) = Executor::spawn(Arc::new(backend), ExecutorKind::InProcess);
    let state = AppState::new(engine, ServerConfig::default());
    tokio::spawn(routing::route_events(events, state.connections.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });

    (addr, packages_dir)
}

async fn connect(addr: SocketAddr) -> WsClient {
    let (client, _) = connect_async(format!("ws://{addr}/"))
        .await
        .expect("websocket handshake failed");
    client
}

async fn send(client: &mut WsClient, envelope: &RequestEnvelope) {
    let bytes = rmp_serde::to_vec_named(envelope).unwrap();
    client.send(Message::Binary(bytes.into())).await.unwrap();
}

/// Read binary frames until a terminal event arrives, returning every
/// decoded envelope in arrival order.
async fn collect_until_terminal(client: &mut WsClient) -> Vec<ResponseEnvelope> {
    let mut envelopes = Vec::new();
    loop {
        let frame = tokio::time::timeout(std::time::Duration::from_secs(10), client.next())
            .await
            .expect("timed out waiting for a response frame")
            .expect("connection closed early")
            .expect("connection errored");

        let Message::Binary(bytes) = frame else {
            continue;
        };
        let envelope: ResponseEnvelope = rmp_serde::from_slice(&bytes).unwrap();
        let terminal = !matches!(
            envelope.body,
            ResponseBody::SynthesisSegmentEvent(_) | ResponseBody::SynthesisSentenceEvent(_)
        );
        envelopes.push(envelope);
        if terminal {
            return envelopes;
        }
    }
}

fn synthesis(request_id: &str, text: &str) -> RequestEnvelope {
    RequestEnvelope::new(
        request_id,
        RequestBody::SynthesisRequest {
            input: SynthesisInput::Text(text.into()),
            options: SynthesisOptions::default(),
        },
    )
}

fn detect(request_id: &str, text: &str) -> RequestEnvelope {
    RequestEnvelope::new(
        request_id,
        RequestBody::TextLanguageDetectionRequest {
            input: text.into(),
            options: TextLanguageDetectionOptions::default(),
        },
    )
}

#[tokio::test]
async fn test_synthesis_streams_progress_then_result() {
    let (addr, _packages) = start_server().await;
    let mut client = connect(addr).await;

    send(&mut client, &synthesis("syn-1", "Hello there. How are you?")).await;
    let envelopes = collect_until_terminal(&mut client).await;

    assert!(envelopes.len() > 1, "expected progress before the result");
    assert!(envelopes.iter().all(|e| e.request_id == "syn-1"));
    assert_eq!(envelopes.last().unwrap().message_type(), "SynthesisResponse");

    // Two sentences: sentence events plus the wrapping segment event.
    let sentence_events = envelopes
        .iter()
        .filter(|e| matches!(e.body, ResponseBody::SynthesisSentenceEvent(_)))
        .count();
    assert_eq!(sentence_events, 2);
}

#[tokio::test]
async fn test_malformed_frame_leaves_connection_usable() {
    let (addr, _packages) = start_server().await;
    let mut client = connect(addr).await;

    client
        .send(Message::Binary(vec![0xde, 0xad, 0xbe, 0xef].into()))
        .await
        .unwrap();

    send(&mut client, &detect("det-1", "Привет")).await;
    let envelopes = collect_until_terminal(&mut client).await;

    assert_eq!(envelopes.len(), 1);
    assert_eq!(envelopes[0].request_id, "det-1");
    assert_eq!(
        envelopes[0].message_type(),
        "TextLanguageDetectionResponse"
    );
}

#[tokio::test]
async fn test_failed_job_does_not_affect_later_jobs() {
    let (addr, _packages) = start_server().await;
    let mut client = connect(addr).await;

    // Recognition is not provided by the built-in backend.
    send(
        &mut client,
        &RequestEnvelope::new(
            "rec-1",
            RequestBody::RecognitionRequest {
                input: sauti_core::protocol::request::AudioSource::Encoded(vec![0u8; 8]),
                options: Default::default(),
            },
        ),
    )
    .await;
    send(&mut client, &detect("det-2", "hello world")).await;

    let first = collect_until_terminal(&mut client).await;
    assert_eq!(first.last().unwrap().request_id, "rec-1");
    match &first.last().unwrap().body {
        ResponseBody::Error { error } => assert!(!error.canceled),
        other => panic!("expected an error terminal, got {other:?}"),
    }

    let second = collect_until_terminal(&mut client).await;
    assert_eq!(second.last().unwrap().request_id, "det-2");
    assert_eq!(
        second.last().unwrap().message_type(),
        "TextLanguageDetectionResponse"
    );
}

#[tokio::test]
async fn test_cancellation_of_queued_job_yields_single_canceled_error() {
    let (addr, _packages) = start_server().await;
    let mut client = connect(addr).await;

    // A long first job keeps the queue busy while the second is canceled.
    send(
        &mut client,
        &synthesis("busy", "One. Two. Three. Four. Five. Six. Seven. Eight."),
    )
    .await;
    send(&mut client, &synthesis("victim", "Should never render.")).await;
    send(
        &mut client,
        &RequestEnvelope::new("victim", RequestBody::CancellationRequest {}),
    )
    .await;

    let busy = collect_until_terminal(&mut client).await;
    assert_eq!(busy.last().unwrap().request_id, "busy");
    assert_eq!(busy.last().unwrap().message_type(), "SynthesisResponse");

    let victim = collect_until_terminal(&mut client).await;
    assert_eq!(victim.len(), 1, "canceled job must emit no progress");
    assert_eq!(victim[0].request_id, "victim");
    match &victim[0].body {
        ResponseBody::Error { error } => {
            assert!(error.canceled);
        }
        other => panic!("expected a canceled error terminal, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disconnect_mid_job_does_not_stall_the_queue() {
    let (addr, _packages) = start_server().await;

    let mut client_a = connect(addr).await;
    let mut client_b = connect(addr).await;

    // A long job on A, then a job on B queued behind it.
    send(
        &mut client_a,
        &synthesis(
            "doomed",
            "One. Two. Three. Four. Five. Six. Seven. Eight. Nine. Ten.",
        ),
    )
    .await;
    send(&mut client_b, &detect("survivor", "hello world")).await;

    // Drop A while its job is (at latest) still queued or running. The
    // job runs to completion, its events go nowhere.
    drop(client_a);

    let envelopes = collect_until_terminal(&mut client_b).await;
    assert_eq!(envelopes.len(), 1);
    assert_eq!(envelopes[0].request_id, "survivor");
    assert_eq!(
        envelopes[0].message_type(),
        "TextLanguageDetectionResponse"
    );
}

#[tokio::test]
async fn test_plain_http_get_returns_banner() {
    let (addr, _packages) = start_server().await;

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("This is the Sauti speech server!"));
}
