//! Persistent WebSocket signaling channel
//!
//! The gateway speaks JSON frames `{"type": ..., "data": ...}` over a
//! socket derived from its base address by scheme substitution. The
//! gateway sends the offer; the local side answers and both sides trickle
//! candidates. Closure is reported as a distinct terminal event tagged
//! with whether it was locally initiated.

use super::{
    NegotiationRole, OutboundSignal, SignalEvent, SignalMessage, SignalingChannel,
    SignalingConnector,
};
use crate::{CameraStreamRef, Error, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens [`DuplexChannel`]s against the gateway's signaling socket
#[derive(Clone, Default)]
pub struct DuplexConnector;

impl DuplexConnector {
    /// Create a connector
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SignalingConnector for DuplexConnector {
    async fn open(&self, stream: &CameraStreamRef) -> Result<Box<dyn SignalingChannel>> {
        stream.validate()?;

        let url = stream.signaling_socket_url()?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::WebSocket(format!("invalid signaling url: {}", e)))?;

        if let Some(credentials) = &stream.credentials {
            let value = HeaderValue::from_str(&credentials.basic_header())
                .map_err(|e| Error::InvalidConfig(format!("invalid credentials: {}", e)))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        debug!(%url, stream = %stream.stream_id, "connecting signaling socket");

        let (socket, _) = connect_async(request)
            .await
            .map_err(|e| Error::WebSocket(format!("failed to connect: {}", e)))?;

        Ok(Box::new(DuplexChannel::from_socket(socket)))
    }
}

/// One persistent signaling connection
pub struct DuplexChannel {
    out_tx: mpsc::UnboundedSender<Message>,
    events_rx: mpsc::UnboundedReceiver<SignalEvent>,
    locally_closed: Arc<AtomicBool>,
    closed: bool,
}

impl DuplexChannel {
    fn from_socket(socket: WsStream) -> Self {
        let (write, read) = socket.split();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let locally_closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(Self::sender_task(write, out_rx));
        tokio::spawn(Self::receiver_task(read, events_tx, locally_closed.clone()));

        Self {
            out_tx,
            events_rx,
            locally_closed,
            closed: false,
        }
    }

    /// Sender task: forwards outbound frames onto the socket
    async fn sender_task(
        mut write: futures_util::stream::SplitSink<WsStream, Message>,
        mut out_rx: mpsc::UnboundedReceiver<Message>,
    ) {
        while let Some(msg) = out_rx.recv().await {
            let is_close = matches!(msg, Message::Close(_));
            if let Err(e) = write.send(msg).await {
                warn!("failed to send signaling frame: {}", e);
                break;
            }
            if is_close {
                break;
            }
        }

        debug!("signaling sender task terminated");
    }

    /// Receiver task: maps inbound frames to events, then reports closure
    async fn receiver_task(
        mut read: futures_util::stream::SplitStream<WsStream>,
        events_tx: mpsc::UnboundedSender<SignalEvent>,
        locally_closed: Arc<AtomicBool>,
    ) {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => match serde_json::from_str::<SignalMessage>(&text) {
                    Ok(msg) => {
                        if events_tx.send(msg.into_event()).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("unparseable signaling frame, skipping: {}", e),
                },
                Ok(Message::Close(_)) => {
                    debug!("signaling socket closed by remote");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("signaling socket error: {}", e);
                    break;
                }
            }
        }

        let _ = events_tx.send(SignalEvent::Closed {
            initiated: locally_closed.load(Ordering::SeqCst),
        });

        debug!("signaling receiver task terminated");
    }
}

#[async_trait]
impl SignalingChannel for DuplexChannel {
    fn role(&self) -> NegotiationRole {
        NegotiationRole::RemoteOffer
    }

    async fn send(&mut self, signal: OutboundSignal) -> Result<()> {
        if self.closed {
            return Err(Error::Cancelled);
        }

        let frame = SignalMessage::from_outbound(signal);
        let json = serde_json::to_string(&frame)
            .map_err(|e| Error::Decode(format!("failed to serialize signaling frame: {}", e)))?;

        self.out_tx
            .send(Message::Text(json))
            .map_err(|_| Error::WebSocket("signaling channel closed".to_string()))
    }

    async fn next_event(&mut self) -> Option<SignalEvent> {
        self.events_rx.recv().await
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.locally_closed.store(true, Ordering::SeqCst);
        let _ = self.out_tx.send(Message::Close(None));
    }
}
