use crate::core::endpoint::ConnectionToken;
use crate::traits::{HubSocketError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lifecycle event reported by a transport session
#[derive(Debug)]
pub enum SessionEvent {
    /// The streaming connection is up
    Opened,
    /// The connection reported an error; closing is the supervisor's call
    Fault(HubSocketError),
    /// The connection is gone
    Closed { code: Option<u16>, reason: String },
}

/// Sending half of a session's event channel
///
/// Enforces the event contract: `Opened` and `Closed` at most once each,
/// nothing after `Closed`.
#[derive(Debug)]
pub struct SessionEvents {
    tx: mpsc::UnboundedSender<SessionEvent>,
    opened: AtomicBool,
    closed: AtomicBool,
}

impl SessionEvents {
    /// Create a fresh per-attempt event channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                opened: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            },
            rx,
        )
    }

    pub fn opened(&self) {
        if self.closed.load(Ordering::Acquire) || self.opened.swap(true, Ordering::AcqRel) {
            return;
        }
        self.emit(SessionEvent::Opened);
    }

    pub fn fault(&self, error: HubSocketError) {
        if self.closed.load(Ordering::Acquire) {
            debug!("Dropping fault reported after close: {}", error);
            return;
        }
        self.emit(SessionEvent::Fault(error));
    }

    pub fn closed(&self, code: Option<u16>, reason: impl Into<String>) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.emit(SessionEvent::Closed {
            code,
            reason: reason.into(),
        });
    }

    fn emit(&self, event: SessionEvent) {
        // Receiver gone means the supervisor already moved on from this attempt
        let _ = self.tx.send(event);
    }
}

/// Owner-side handle of a running transport session
///
/// Dropping the handle closes the session.
#[derive(Debug)]
pub struct SessionHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub fn new(cancel: CancellationToken, task: JoinHandle<()>) -> Self {
        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Handle for a session whose connection loop is not a tokio task
    pub fn detached(cancel: CancellationToken) -> Self {
        Self { cancel, task: None }
    }

    /// Token that closes this session when cancelled
    pub fn closer(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request close. Idempotent and callable from any thread.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Close and wait up to `grace` for the connection loop to finish
    pub async fn close_and_wait(mut self, grace: Duration) {
        self.close();
        if let Some(task) = self.task.take() {
            if tokio::time::timeout(grace, task).await.is_err() {
                debug!("Session task still running after {:?}, leaving it to finish", grace);
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start confirmation response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartAck {
    pub status: u16,
    pub body: String,
}

impl StartAck {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The network steps of one connection attempt
///
/// The supervisor calls these in order for every attempt:
/// `negotiate` → `open` → (wait for `Opened`) → `confirm_start`.
/// A fresh token is negotiated per attempt and never reused.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Exchange client identity for a connection token
    async fn negotiate(&self) -> Result<ConnectionToken>;

    /// Start the streaming connection without waiting for it to open
    ///
    /// Lifecycle events go to `events`; the returned handle closes it.
    async fn open(&self, token: &ConnectionToken, events: SessionEvents) -> Result<SessionHandle>;

    /// Confirm the transport after the session reported `Opened`
    async fn confirm_start(&self, token: &ConnectionToken) -> Result<StartAck>;

    /// Drop pooled resources (HTTP client); called on stop
    fn release(&self) {}
}
