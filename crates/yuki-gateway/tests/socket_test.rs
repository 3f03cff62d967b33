//! WebSocket transport tests.
//!
//! Runs the production transport against a local mock server to verify
//! the reader and writer tasks end to end: frame decoding, garbage
//! tolerance, and outbound encoding.

use std::io::Write;
use std::net::SocketAddr;
use std::time::Duration;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use yuki_gateway::{GatewayError, SocketHandle, Transport, WebSocketTransport};
use yuki_proto::{Envelope, EnvelopeKind};

// ============================================================================
// Test Helpers - Mock Gateway Server
// ============================================================================

struct MockServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl MockServer {
    async fn new() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        Self { listener, addr }
    }

    fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Accept a single connection and complete the WebSocket upgrade.
    async fn accept(&self) -> WebSocketStream<TcpStream> {
        let (stream, _) = self.listener.accept().await.expect("accept");
        accept_async(stream).await.expect("websocket upgrade")
    }
}

fn deflate(text: &str) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).expect("deflate write");
    encoder.finish().expect("deflate finish")
}

async fn open(
    server: &MockServer,
    compressed: bool,
) -> (SocketHandle, mpsc::Receiver<Envelope>, WebSocketStream<TcpStream>) {
    let (inbound_tx, inbound_rx) = mpsc::channel(8);
    let url = server.url();
    let accept = server.accept();
    let connect = WebSocketTransport.open(url, compressed, inbound_tx);
    let (ws, handle) = tokio::join!(accept, connect);
    (handle.expect("transport open"), inbound_rx, ws)
}

// ============================================================================
// Reader Path
// ============================================================================

#[tokio::test]
async fn test_reader_decodes_compressed_binary_frames() {
    let server = MockServer::new().await;
    let (_handle, mut inbound, mut ws) = open(&server, true).await;

    let frame = deflate(r#"{"s":1,"d":{"session_id":"sess-1"}}"#);
    ws.send(Message::Binary(frame)).await.expect("server send");

    let envelope = timeout(Duration::from_secs(5), inbound.recv())
        .await
        .expect("inbound in time")
        .expect("inbound open");
    assert_eq!(envelope.kind, EnvelopeKind::HandshakeResult);
    assert_eq!(envelope.payload["session_id"], "sess-1");
}

#[tokio::test]
async fn test_reader_drops_garbage_and_keeps_reading() {
    let server = MockServer::new().await;
    let (_handle, mut inbound, mut ws) = open(&server, true).await;

    // A frame that fails to inflate must not kill the reader; the
    // valid frame behind it still comes through.
    ws.send(Message::Binary(b"\x00\x01garbage".to_vec()))
        .await
        .expect("server send");
    ws.send(Message::Text(r#"{"s":3,"d":{}}"#.to_string()))
        .await
        .expect("server send");

    let envelope = timeout(Duration::from_secs(5), inbound.recv())
        .await
        .expect("inbound in time")
        .expect("inbound open");
    assert_eq!(envelope.kind, EnvelopeKind::Pong);

    // The garbage frame produced nothing.
    drop(ws);
    let rest = timeout(Duration::from_secs(5), inbound.recv())
        .await
        .expect("reader shutdown in time");
    assert!(rest.is_none());
}

#[tokio::test]
async fn test_reader_parses_text_frames_without_inflating() {
    // Text frames bypass decompression even on a compressed socket.
    let server = MockServer::new().await;
    let (_handle, mut inbound, mut ws) = open(&server, true).await;

    ws.send(Message::Text(r#"{"s":0,"sn":7,"d":{"type":1,"content":"hi"}}"#.to_string()))
        .await
        .expect("server send");

    let envelope = timeout(Duration::from_secs(5), inbound.recv())
        .await
        .expect("inbound in time")
        .expect("inbound open");
    assert_eq!(envelope.kind, EnvelopeKind::Event);
    assert_eq!(envelope.sn, Some(7));
}

// ============================================================================
// Writer Path
// ============================================================================

#[tokio::test]
async fn test_writer_encodes_envelopes_onto_the_wire() {
    let server = MockServer::new().await;
    let (handle, _inbound, mut ws) = open(&server, false).await;

    handle.send(Envelope::ping(7)).await.expect("send");

    let message = timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("frame in time")
        .expect("connection open")
        .expect("frame");
    let text = message.into_text().expect("text frame");
    let value: Value = serde_json::from_str(&text).expect("json");
    assert_eq!(value["s"], 2);
    assert_eq!(value["sn"], 7);
}

#[tokio::test]
async fn test_dropping_the_handle_closes_the_connection() {
    let server = MockServer::new().await;
    let (handle, _inbound, mut ws) = open(&server, false).await;

    drop(handle);

    let message = timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("close in time")
        .expect("connection open")
        .expect("frame");
    assert!(matches!(message, Message::Close(_)));
}

// ============================================================================
// Connection Failures
// ============================================================================

#[tokio::test]
async fn test_connect_failure_is_a_transport_error() {
    // Bind a port, then release it so the connect is refused.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("ws://{}", listener.local_addr().expect("local addr"));
    drop(listener);

    let (inbound_tx, _inbound_rx) = mpsc::channel(8);
    let result = WebSocketTransport.open(url, false, inbound_tx).await;
    assert!(matches!(result, Err(GatewayError::Transport(_))));
}
