//! WebSocket transport.
//!
//! A live socket is a pair of detached tasks: a writer draining an
//! outbound envelope queue and a reader decoding inbound frames onto
//! the session's envelope channel. Neither task reports failure to the
//! session; connection loss surfaces through heartbeat supervision.

use std::future::Future;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use yuki_proto::Envelope;

use crate::error::GatewayError;

const OUTBOUND_QUEUE_DEPTH: usize = 32;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handle to a live socket.
///
/// Dropping the last handle closes the outbound queue, which stops the
/// writer task and closes the connection.
#[derive(Debug, Clone)]
pub struct SocketHandle {
    outbound: mpsc::Sender<Envelope>,
}

impl SocketHandle {
    /// Wrap an outbound envelope queue.
    #[must_use]
    pub fn new(outbound: mpsc::Sender<Envelope>) -> Self {
        Self { outbound }
    }

    /// Queue an envelope for sending.
    pub async fn send(&self, envelope: Envelope) -> Result<(), GatewayError> {
        self.outbound
            .send(envelope)
            .await
            .map_err(|_| GatewayError::Transport("socket writer gone".to_string()))
    }
}

/// The socket-opening service consumed by the session.
///
/// Implemented over tokio-tungstenite in production
/// ([`WebSocketTransport`]) and by mocks in tests.
pub trait Transport: Send + Sync + 'static {
    /// Open a socket against `url`. Decoded inbound envelopes are
    /// delivered on `inbound` until the connection dies; `compressed`
    /// selects whether binary frames are inflated before parsing.
    fn open(
        &self,
        url: String,
        compressed: bool,
        inbound: mpsc::Sender<Envelope>,
    ) -> impl Future<Output = Result<SocketHandle, GatewayError>> + Send;
}

/// Production [`Transport`] over tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl Transport for WebSocketTransport {
    fn open(
        &self,
        url: String,
        compressed: bool,
        inbound: mpsc::Sender<Envelope>,
    ) -> impl Future<Output = Result<SocketHandle, GatewayError>> + Send {
        async move {
            let (stream, _) = connect_async(url.as_str())
                .await
                .map_err(|e| GatewayError::Transport(format!("connect to {url} failed: {e}")))?;
            info!(%url, "socket open");

            let (sink, source) = stream.split();
            let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
            tokio::spawn(write_loop(sink, outbound_rx));
            tokio::spawn(read_loop(source, compressed, inbound));
            Ok(SocketHandle::new(outbound_tx))
        }
    }
}

async fn write_loop(mut sink: SplitSink<WsStream, Message>, mut outbound: mpsc::Receiver<Envelope>) {
    while let Some(envelope) = outbound.recv().await {
        let text = match envelope.encode() {
            Ok(text) => text,
            Err(error) => {
                warn!(%error, "dropping unencodable envelope");
                continue;
            }
        };
        if let Err(error) = sink.send(Message::Text(text)).await {
            debug!(%error, "socket write failed");
            break;
        }
    }
    let _ = sink.send(Message::Close(None)).await;
}

async fn read_loop(mut source: SplitStream<WsStream>, compressed: bool, inbound: mpsc::Sender<Envelope>) {
    while let Some(message) = source.next().await {
        let frame = match message {
            Ok(Message::Binary(data)) => Envelope::decode(&data, compressed),
            Ok(Message::Text(text)) => Envelope::decode(text.as_bytes(), false),
            Ok(Message::Close(frame)) => {
                info!(?frame, "socket closed by peer");
                break;
            }
            Ok(_) => continue,
            Err(error) => {
                info!(%error, "socket read failed");
                break;
            }
        };
        match frame {
            Ok(envelope) => {
                if inbound.send(envelope).await.is_err() {
                    break;
                }
            }
            // Undecodable frames are dropped; they never affect
            // session liveness.
            Err(error) => warn!(%error, "dropping undecodable frame"),
        }
    }
    debug!("socket reader finished");
}
