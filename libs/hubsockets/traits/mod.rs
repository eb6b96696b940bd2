//! # HubSockets Traits
//!
//! Seams and shared types of the feed client:
//!
//! - **Dispatcher**: receives decoded hub messages
//! - **ReconnectionStrategy**: delay/ceiling policy used by the supervisor
//! - **Connector**: one attempt's network steps (negotiate, open, start)
//! - Error taxonomy shared by every layer

pub mod connector;
pub mod dispatcher;
pub mod error;
pub mod reconnect;

pub use connector::{Connector, SessionEvent, SessionEvents, SessionHandle, StartAck};
pub use dispatcher::{ChannelDispatcher, Dispatcher, NoOpDispatcher};
pub use error::{CodecError, DispatchError, HandshakeError, HubSocketError, Result};
pub use reconnect::{FixedDelay, JitteredBackoff, ReconnectionStrategy, DEFAULT_JITTER_RATIO};
