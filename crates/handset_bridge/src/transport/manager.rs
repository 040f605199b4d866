//! Connection manager: connect, greet, serve, reconnect

use futures::{SinkExt, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::reconnect::ReconnectPolicy;
use super::sender::EventSender;
use super::SessionHandler;
use crate::error::Result;
use crate::protocol::{Envelope, OutboundEvent};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a finished session may spend flushing queued frames.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Stopped,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Owns the controller link for the lifetime of the process.
pub struct ConnectionManager {
    endpoint: String,
    policy: ReconnectPolicy,
    handler: Arc<dyn SessionHandler>,
    sender: EventSender,
    state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl ConnectionManager {
    pub fn new(
        endpoint: impl Into<String>,
        policy: ReconnectPolicy,
        handler: Arc<dyn SessionHandler>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            endpoint: endpoint.into(),
            policy,
            handler,
            sender: EventSender::new(),
            state,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop when `cancel` fires instead of on [`stop`](Self::stop) alone.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Send path for events that are not replies.
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Ask the loop to finish. A handler already running is not interrupted.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("connection state {} -> {}", previous, state);
        }
    }

    /// Keep a connection up until stopped (or until the policy gives up).
    pub async fn run(&self) {
        let mut failures = 0u32;

        while !self.cancel.is_cancelled() {
            self.set_state(ConnectionState::Connecting);
            info!("Connecting to {}", self.endpoint);

            let attempt = tokio::select! {
                _ = self.cancel.cancelled() => break,
                attempt = connect_async(self.endpoint.as_str()) => attempt,
            };

            match attempt {
                Ok((socket, _response)) => {
                    failures = 0;
                    self.set_state(ConnectionState::Connected);
                    info!("Connected to {}", self.endpoint);
                    if let Err(e) = self.serve(socket).await {
                        warn!("Connection to {} failed: {}", self.endpoint, e);
                    }
                    self.sender.detach();
                    self.set_state(ConnectionState::Disconnected);
                }
                Err(e) => {
                    failures += 1;
                    self.set_state(ConnectionState::Disconnected);
                    warn!("Could not connect to {}: {}", self.endpoint, e);
                    if !self.policy.should_retry(failures) {
                        warn!("Giving up after {} failed attempts", failures);
                        break;
                    }
                }
            }

            if self.cancel.is_cancelled() {
                break;
            }
            info!("Reconnecting in {:?}", self.policy.delay);
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.policy.delay) => {}
            }
        }

        self.sender.detach();
        self.set_state(ConnectionState::Stopped);
        info!("Connection manager stopped");
    }

    /// One connected session: hello first, then requests until the socket
    /// closes or a stop is requested.
    async fn serve(&self, socket: Socket) -> Result<()> {
        let (sink, mut stream) = socket.split();
        let (events_tx, events_rx) = mpsc::unbounded_channel::<OutboundEvent>();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel::<Message>();
        let writer = tokio::spawn(write_loop(sink, events_rx, frames_rx));

        let hello = self.handler.hello().await;
        // Queued before the sender is attached, so nothing can overtake it.
        let _ = events_tx.send(hello);
        self.sender.attach(events_tx.clone());

        let outcome = loop {
            let frame = tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = frames_tx.send(Message::Close(None));
                    break Ok(());
                }
                frame = stream.next() => frame,
            };

            match frame {
                None => break Ok(()),
                Some(Err(e)) => break Err(e.into()),
                Some(Ok(Message::Text(text))) => self.on_text(&text).await,
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => self.on_text(&text).await,
                    Err(_) => debug!("Dropping non UTF-8 binary frame"),
                },
                Some(Ok(Message::Ping(payload))) => {
                    let _ = frames_tx.send(Message::Pong(payload));
                }
                Some(Ok(Message::Close(frame))) => {
                    info!("Controller closed the connection: {:?}", frame);
                    break Ok(());
                }
                Some(Ok(_)) => {}
            }
        };

        self.sender.detach();
        drop(events_tx);
        drop(frames_tx);
        if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
            debug!("Writer did not drain in time");
        }
        outcome
    }

    async fn on_text(&self, text: &str) {
        let envelope = match Envelope::parse(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("Dropping malformed message ({}): {:.200}", e, text);
                return;
            }
        };

        if let Some(reply) = self.handler.handle(envelope).await {
            self.sender.send(reply);
        }
    }
}

async fn write_loop(
    mut sink: futures::stream::SplitSink<Socket, Message>,
    mut events: mpsc::UnboundedReceiver<OutboundEvent>,
    mut frames: mpsc::UnboundedReceiver<Message>,
) {
    loop {
        let message = tokio::select! {
            biased;
            Some(frame) = frames.recv() => frame,
            Some(event) = events.recv() => match event.to_text() {
                Ok(text) => Message::Text(text),
                Err(e) => {
                    warn!("Could not encode {} event: {}", event.kind, e);
                    continue;
                }
            },
            else => break,
        };

        let closing = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            debug!("Write failed: {}", e);
            break;
        }
        if closing {
            break;
        }
    }
    let _ = sink.close().await;
}
