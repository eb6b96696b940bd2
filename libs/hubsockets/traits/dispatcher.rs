//! Message dispatch boundary
//!
//! ```text
//! WebSocket → Frame Codec → DecodedMessage → Session dispatch thread → Dispatcher
//!                                                (one per session, FIFO)
//! ```
//!
//! # Guarantees
//!
//! - **Per-session sequential**: one dispatch thread per transport session,
//!   messages handled one at a time in arrival order
//! - **Contained failures**: an `Err` or a panic from `handle` is logged and
//!   the session keeps running
//! - **No cross-session ordering**: a new session starts a fresh stream

use crate::codec::DecodedMessage;
use crate::traits::DispatchError;
use std::sync::Arc;

/// Receives decoded application messages
///
/// Runs on a dedicated OS thread, not in an async context. Blocking work is
/// fine; it only delays later messages of the same session.
///
/// # Example
///
/// ```ignore
/// struct PrintDispatcher;
///
/// impl Dispatcher for PrintDispatcher {
///     fn handle(&self, message: &DecodedMessage) -> Result<(), DispatchError> {
///         for inv in &message.invocations {
///             println!("{}.{} {:?}", inv.hub, inv.method, inv.args);
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Dispatcher: Send + Sync + 'static {
    fn handle(&self, message: &DecodedMessage) -> Result<(), DispatchError>;
}

impl<D: Dispatcher + ?Sized> Dispatcher for Arc<D> {
    fn handle(&self, message: &DecodedMessage) -> Result<(), DispatchError> {
        (**self).handle(message)
    }
}

/// Dispatcher that drops everything
pub struct NoOpDispatcher;

impl Dispatcher for NoOpDispatcher {
    fn handle(&self, _message: &DecodedMessage) -> Result<(), DispatchError> {
        Ok(())
    }
}

/// Dispatcher that forwards every message into a crossbeam channel
///
/// Useful for consumers that want to pull messages on their own thread.
pub struct ChannelDispatcher {
    tx: crossbeam_channel::Sender<DecodedMessage>,
}

impl ChannelDispatcher {
    pub fn new() -> (Self, crossbeam_channel::Receiver<DecodedMessage>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl Dispatcher for ChannelDispatcher {
    fn handle(&self, message: &DecodedMessage) -> Result<(), DispatchError> {
        self.tx
            .send(message.clone())
            .map_err(|_| DispatchError::new("receiver dropped"))
    }
}
