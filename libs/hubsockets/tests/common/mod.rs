//! Common test utilities for HubSockets integration tests
//!
//! A mock hub server that speaks just enough WebSocket to exercise the
//! transport session.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// How the mock server behaves once a client is connected
#[derive(Debug, Clone, Default)]
pub struct ServerScript {
    /// Text frames pushed right after the upgrade
    pub frames: Vec<String>,
    /// Stop reading after the frames are sent, so pings go unanswered
    pub silent: bool,
}

/// A mock hub WebSocket server for testing
pub struct MockWsServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
    close_sessions: Arc<Notify>,
    connections: Arc<AtomicUsize>,
    uris: Arc<Mutex<Vec<String>>>,
    origins: Arc<Mutex<Vec<String>>>,
}

impl MockWsServer {
    /// Create and start a new mock WebSocket server
    pub async fn start(script: ServerScript) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let close_sessions = Arc::new(Notify::new());
        let connections = Arc::new(AtomicUsize::new(0));
        let uris = Arc::new(Mutex::new(Vec::new()));
        let origins = Arc::new(Mutex::new(Vec::new()));

        let server = Self {
            addr,
            shutdown: shutdown.clone(),
            close_sessions: close_sessions.clone(),
            connections: connections.clone(),
            uris: uris.clone(),
            origins: origins.clone(),
        };

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                connections.fetch_add(1, Ordering::SeqCst);
                                let script = script.clone();
                                let close = close_sessions.clone();
                                let uris = uris.clone();
                                let origins = origins.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, script, close, uris, origins).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown.notified() => {
                        break;
                    }
                }
            }
        });

        server
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        script: ServerScript,
        close: Arc<Notify>,
        uris: Arc<Mutex<Vec<String>>>,
        origins: Arc<Mutex<Vec<String>>>,
    ) {
        use futures_util::{SinkExt, StreamExt};
        use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
        use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
        use tokio_tungstenite::tungstenite::protocol::CloseFrame;
        use tokio_tungstenite::tungstenite::Message;

        let record = |req: &Request, resp: Response| {
            uris.lock().push(req.uri().to_string());
            if let Some(origin) = req.headers().get("origin").and_then(|v| v.to_str().ok()) {
                origins.lock().push(origin.to_string());
            }
            Ok::<Response, ErrorResponse>(resp)
        };

        let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, record).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        for frame in &script.frames {
            if write.send(Message::Text(frame.clone())).await.is_err() {
                return;
            }
        }

        if script.silent {
            close.notified().await;
            return;
        }

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(msg)) => {
                            if msg.is_ping() {
                                let pong = Message::Pong(msg.into_data());
                                if write.send(pong).await.is_err() {
                                    break;
                                }
                            } else if msg.is_close() {
                                break;
                            }
                        }
                        Some(Err(_)) | None => break,
                    }
                }
                _ = close.notified() => {
                    let frame = CloseFrame {
                        code: CloseCode::Away,
                        reason: "server going away".into(),
                    };
                    let _ = write.send(Message::Close(Some(frame))).await;
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    break;
                }
            }
        }
    }

    /// WebSocket base URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Request URIs seen during upgrades
    pub fn uris(&self) -> Vec<String> {
        self.uris.lock().clone()
    }

    pub fn origins(&self) -> Vec<String> {
        self.origins.lock().clone()
    }

    /// Send a close frame on every open connection
    pub fn close_sessions(&self) {
        self.close_sessions.notify_waiters();
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
        self.close_sessions();
    }
}

/// Poll a crossbeam receiver from async code without blocking the runtime
pub async fn recv_within<T>(rx: &crossbeam_channel::Receiver<T>, timeout: Duration) -> Option<T> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(item) = rx.try_recv() {
            return Some(item);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
