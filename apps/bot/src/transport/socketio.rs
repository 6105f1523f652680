//! Socket.IO client over a WebSocket
//!
//! Speaks Engine.IO v4 packet framing on the default namespace: the reader
//! task answers pings and decodes event packets onto the inbound channel,
//! the writer task owns the sink.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::Transport;
use crate::discovery::EndpointResolver;
use crate::error::{BotError, BotResult};
use crate::protocol::{InboundEvent, OutboundEvent};

/// One decoded Engine.IO / Socket.IO packet
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Engine.IO handshake
    Open,
    Close,
    Ping,
    Pong,
    /// Namespace connection confirmed
    Connected,
    /// Namespace disconnected by the server
    Disconnect,
    ConnectError(String),
    Event { name: String, payload: Value },
    /// Anything else (acks, binary packets, upgrades)
    Other,
}

/// Build the WebSocket URL for an advertised endpoint
pub fn websocket_url(endpoint: &str) -> BotResult<String> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| BotError::Discovery(format!("invalid endpoint '{}': {}", endpoint, e)))?;

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(BotError::Discovery(format!(
                "unsupported endpoint scheme '{}'",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| BotError::Discovery(format!("cannot use scheme {} for {}", scheme, endpoint)))?;
    url.set_path("/socket.io/");
    url.set_query(Some("EIO=4&transport=websocket"));

    Ok(url.to_string())
}

/// Decode a text packet
///
/// Packet type digits are ASCII; any other leading character yields
/// [`Frame::Other`].
pub fn decode_frame(text: &str) -> BotResult<Frame> {
    let Some((kind, rest)) = split_kind(text) else {
        return Ok(Frame::Other);
    };
    let frame = match kind {
        b'0' => Frame::Open,
        b'1' => Frame::Close,
        b'2' => Frame::Ping,
        b'3' => Frame::Pong,
        b'4' => decode_message(rest)?,
        _ => Frame::Other,
    };
    Ok(frame)
}

fn split_kind(text: &str) -> Option<(u8, &str)> {
    let kind = *text.as_bytes().first()?;
    if !kind.is_ascii_digit() {
        return None;
    }
    // An ASCII digit is one byte, so index 1 is a char boundary
    Some((kind, &text[1..]))
}

fn decode_message(body: &str) -> BotResult<Frame> {
    let Some((kind, rest)) = split_kind(body) else {
        return Ok(Frame::Other);
    };

    let frame = match kind {
        b'0' => Frame::Connected,
        b'1' => Frame::Disconnect,
        b'2' => {
            // Optional ack id precedes the array
            let json = rest.trim_start_matches(|c: char| c.is_ascii_digit());
            let mut parts: Vec<Value> = serde_json::from_str(json)?;
            if parts.is_empty() {
                return Ok(Frame::Other);
            }
            let payload = if parts.len() > 1 {
                parts.swap_remove(1)
            } else {
                Value::Null
            };
            match parts.first().and_then(Value::as_str) {
                Some(name) => Frame::Event {
                    name: name.to_string(),
                    payload,
                },
                None => Frame::Other,
            }
        }
        b'4' => {
            let message = serde_json::from_str::<Value>(rest)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| rest.to_string());
            Frame::ConnectError(message)
        }
        _ => Frame::Other,
    };
    Ok(frame)
}

/// Encode an outbound event as a Socket.IO event packet
pub fn encode_event(event: &OutboundEvent) -> String {
    format!(
        "42{}",
        Value::Array(vec![Value::from(event.name()), event.payload()])
    )
}

struct Connection {
    writer: mpsc::UnboundedSender<Message>,
    reader_task: AbortHandle,
    writer_task: JoinHandle<()>,
}

impl Connection {
    fn abort(self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

/// Socket.IO transport with endpoint rediscovery on reconnect
pub struct SocketIoTransport {
    resolver: EndpointResolver,
    events: mpsc::Sender<InboundEvent>,
    connection: Mutex<Option<Connection>>,
}

impl SocketIoTransport {
    pub fn new(resolver: EndpointResolver, events: mpsc::Sender<InboundEvent>) -> Self {
        Self {
            resolver,
            events,
            connection: Mutex::new(None),
        }
    }

    /// Discover the endpoint and open the socket
    ///
    /// Failures are also reported as a `ConnectError` event.
    pub async fn connect(&self) -> BotResult<()> {
        match self.open().await {
            Ok(connection) => {
                if let Some(old) = self.connection.lock().await.replace(connection) {
                    old.abort();
                }
                Ok(())
            }
            Err(e) => {
                e.log();
                let _ = self
                    .events
                    .send(InboundEvent::ConnectError {
                        message: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    async fn open(&self) -> BotResult<Connection> {
        let endpoint = self.resolver.resolve().await?;
        let url = websocket_url(&endpoint)?;

        tracing::info!(url = %url, "Opening room socket");
        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        let (mut sink, mut source) = stream.split();

        let (writer, mut outgoing) = mpsc::unbounded_channel::<Message>();
        let writer_task = tokio::spawn(async move {
            while let Some(message) = outgoing.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    tracing::debug!(error = %e, "Socket write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let events = self.events.clone();
        let replies = writer.clone();
        let reader_task = tokio::spawn(async move {
            let reason = loop {
                let message = match source.next().await {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => break e.to_string(),
                    None => break "stream ended".to_string(),
                };

                let text = match message {
                    Message::Text(text) => text,
                    Message::Close(frame) => {
                        break frame
                            .map(|f| f.reason.to_string())
                            .unwrap_or_else(|| "closed by server".to_string())
                    }
                    _ => continue,
                };
                tracing::trace!(frame = %text, "Received frame");

                let frame = match decode_frame(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::debug!(error = %e, "Undecodable frame");
                        continue;
                    }
                };

                let event = match frame {
                    Frame::Open => {
                        let _ = replies.send(Message::Text("40".to_string()));
                        continue;
                    }
                    Frame::Ping => {
                        let _ = replies.send(Message::Text("3".to_string()));
                        continue;
                    }
                    Frame::Close => break "engine closed".to_string(),
                    Frame::Connected => InboundEvent::Connected,
                    Frame::Disconnect => break "namespace disconnected".to_string(),
                    Frame::ConnectError(message) => InboundEvent::ConnectError { message },
                    Frame::Event { name, payload } => match InboundEvent::decode(&name, payload) {
                        Ok(Some(event)) => event,
                        Ok(None) => continue,
                        Err(e) => {
                            tracing::debug!(event = %name, error = %e, "Malformed event payload");
                            continue;
                        }
                    },
                    Frame::Pong | Frame::Other => continue,
                };

                if events.send(event).await.is_err() {
                    break "event loop gone".to_string();
                }
            };

            tracing::info!(reason = %reason, "Room socket closed");
            let _ = replies.send(Message::Close(None));
            let _ = events.send(InboundEvent::Disconnected { reason }).await;
        });

        let reader_abort = reader_task.abort_handle();
        tokio::spawn(watch_reader(reader_task, self.events.clone(), writer.clone()));

        Ok(Connection {
            writer,
            reader_task: reader_abort,
            writer_task,
        })
    }
}

/// Report a disconnect if the reader task dies without sending one
///
/// An aborted reader belongs to a connection being replaced and reports
/// nothing.
async fn watch_reader(
    reader: JoinHandle<()>,
    events: mpsc::Sender<InboundEvent>,
    replies: mpsc::UnboundedSender<Message>,
) {
    let Err(e) = reader.await else {
        return;
    };
    if !e.is_panic() {
        return;
    }

    tracing::error!(error = %e, "Room socket reader panicked");
    let _ = replies.send(Message::Close(None));
    let _ = events
        .send(InboundEvent::Disconnected {
            reason: "socket reader failed".to_string(),
        })
        .await;
}

#[async_trait]
impl Transport for SocketIoTransport {
    async fn emit(&self, event: OutboundEvent) -> BotResult<()> {
        let guard = self.connection.lock().await;
        let connection = guard.as_ref().ok_or(BotError::NotConnected)?;

        tracing::trace!(event = event.name(), "Sending event");
        connection
            .writer
            .send(Message::Text(encode_event(&event)))
            .map_err(|_| BotError::NotConnected)
    }

    async fn disconnect(&self) -> BotResult<()> {
        let guard = self.connection.lock().await;
        match guard.as_ref() {
            Some(connection) => {
                let _ = connection.writer.send(Message::Text("41".to_string()));
                let _ = connection.writer.send(Message::Close(None));
                Ok(())
            }
            None => Err(BotError::NotConnected),
        }
    }

    async fn reconnect(&self) -> BotResult<()> {
        if let Some(old) = self.connection.lock().await.take() {
            old.abort();
        }
        self.connect().await
    }
}
