//! Transport session: one WebSocket connection
//!
//! `TransportSession::open` returns immediately; the connection runs on its
//! own tokio task and reports `Opened` / `Fault` / `Closed` through the
//! attempt's `SessionEvents`. Decoded messages go to a per-session dispatch
//! thread, so a slow dispatcher never stalls the socket.

use crate::codec::{decode_stream, CodecResult};
use crate::core::dispatch::DispatchWorker;
use crate::core::heartbeat::{Heartbeat, HeartbeatConfig, HeartbeatEvent};
use crate::traits::{Dispatcher, HubSocketError, Result, SessionEvents, SessionHandle};
use futures::{SinkExt, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::{http, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Characters of an incoming frame echoed to the debug log
const FRAME_PREVIEW_LEN: usize = 1000;

/// Per-session tuning
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub heartbeat: HeartbeatConfig,
    /// How long `close` waits for queued messages to reach the dispatcher
    pub drain_grace: Duration,
    /// Name used in logs and for the dispatch thread
    pub label: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            heartbeat: HeartbeatConfig::default(),
            drain_grace: Duration::from_secs(2),
            label: "session".to_string(),
        }
    }
}

impl SessionOptions {
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Why the message loop ended
#[derive(Debug)]
enum LoopExit {
    /// `close()` was requested
    Cancelled,
    /// Peer sent a close frame or the stream ended
    Remote { code: Option<u16>, reason: String },
    /// Read/write error or heartbeat loss
    Fault(HubSocketError),
}

/// Build the upgrade request with connection-level headers
///
/// Headers that are not valid HTTP are skipped with a warning.
pub fn build_request(url: &str, headers: &BTreeMap<String, String>) -> Result<Request> {
    let mut request = url
        .into_client_request()
        .map_err(|e| HubSocketError::Configuration(format!("invalid transport url: {}", e)))?;

    for (key, value) in headers {
        match (
            key.parse::<http::header::HeaderName>(),
            value.parse::<http::header::HeaderValue>(),
        ) {
            (Ok(name), Ok(value)) => {
                request.headers_mut().insert(name, value);
            }
            (Err(_), _) => warn!("Invalid header name: {}", key),
            (_, Err(_)) => warn!("Invalid header value for key '{}': {}", key, value),
        }
    }

    Ok(request)
}

pub struct TransportSession;

impl TransportSession {
    /// Spawn the connection task and return its handle
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        request: Request,
        dispatcher: Arc<dyn Dispatcher>,
        events: SessionEvents,
        options: SessionOptions,
    ) -> SessionHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_session(
            request,
            dispatcher,
            events,
            options,
            cancel.clone(),
        ));
        SessionHandle::new(cancel, task)
    }
}

async fn run_session(
    request: Request,
    dispatcher: Arc<dyn Dispatcher>,
    events: SessionEvents,
    options: SessionOptions,
    cancel: CancellationToken,
) {
    let label = options.label.as_str();

    let connected = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(session = %label, "Closed before the connection opened");
            events.closed(None, "closed before open");
            return;
        }
        result = connect_async(request) => result,
    };

    let ws_stream = match connected {
        Ok((ws_stream, response)) => {
            debug!(session = %label, status = %response.status(), "WebSocket upgrade accepted");
            ws_stream
        }
        Err(e) => {
            error!(session = %label, "[ws error] connect failed: {}", e);
            let reason = e.to_string();
            events.fault(HubSocketError::transport(&reason));
            events.closed(None, reason);
            return;
        }
    };

    info!(session = %label, "[ws] opened");
    events.opened();

    let worker = DispatchWorker::spawn(dispatcher, label);
    let exit = message_loop(ws_stream, &cancel, &worker, options.heartbeat, label).await;
    worker.finish(options.drain_grace).await;

    match exit {
        LoopExit::Cancelled => {
            info!(session = %label, "[ws close] closed by client");
            events.closed(Some(1000), "closed by client");
        }
        LoopExit::Remote { code, reason } => {
            info!(session = %label, "[ws close] {:?} {}", code, reason);
            events.closed(code, reason);
        }
        LoopExit::Fault(e) => {
            error!(session = %label, "[ws error] {}", e);
            let reason = e.to_string();
            events.fault(e);
            events.closed(None, reason);
        }
    }
}

async fn message_loop(
    ws_stream: WsStream,
    cancel: &CancellationToken,
    worker: &DispatchWorker,
    heartbeat_config: HeartbeatConfig,
    label: &str,
) -> LoopExit {
    let (mut write, mut read) = ws_stream.split();
    let mut heartbeat = Heartbeat::new(heartbeat_config);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                let close = async {
                    let _ = write.send(Message::Close(None)).await;
                    let _ = write.close().await;
                };
                if tokio::time::timeout(Duration::from_secs(1), close).await.is_err() {
                    debug!(session = %label, "Close handshake timed out");
                }
                return LoopExit::Cancelled;
            }

            beat = heartbeat.next() => match beat {
                HeartbeatEvent::Tick => {
                    if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                        return LoopExit::Fault(HubSocketError::transport(format!(
                            "failed to send heartbeat: {}", e
                        )));
                    }
                    heartbeat.record_ping();
                    debug!(session = %label, "Heartbeat ping sent");
                }
                HeartbeatEvent::TimedOut => {
                    return LoopExit::Fault(HubSocketError::transport(format!(
                        "no pong within {:?}",
                        heartbeat.config().timeout
                    )));
                }
            },

            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => handle_frame(&text, worker, label),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => handle_frame(&text, worker, label),
                    Err(_) => warn!(session = %label, "Dropping non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Pong(_))) => heartbeat.record_pong(),
                // tungstenite answers pings itself
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(f) => (Some(u16::from(f.code)), f.reason.to_string()),
                        None => (None, String::new()),
                    };
                    return LoopExit::Remote { code, reason };
                }
                Some(Err(e)) => return LoopExit::Fault(HubSocketError::transport(e)),
                None => {
                    return LoopExit::Remote {
                        code: None,
                        reason: "stream ended".to_string(),
                    };
                }
            },
        }
    }
}

fn handle_frame(text: &str, worker: &DispatchWorker, label: &str) {
    debug!(session = %label, "[ws message] {}", preview(text, FRAME_PREVIEW_LEN));

    let result = decode_stream(text);
    match &result {
        CodecResult::Empty(e) => {
            debug!(session = %label, "Frame skipped: {}", e);
            return;
        }
        CodecResult::Partial { undecodable, .. } => {
            warn!(
                session = %label,
                undecodable = *undecodable,
                "Frame partially decoded, keeping raw fragments"
            );
        }
        CodecResult::Complete(_) => {}
    }

    for message in result.into_messages() {
        worker.dispatch(message);
    }
}

fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
