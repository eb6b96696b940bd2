//! # HubSockets
//!
//! Reconnecting client for negotiate-then-upgrade hub feeds (SignalR 2.1
//! style) over WebSockets.
//!
//! ## Features
//!
//! - **Frame codec**: pulls every JSON fragment out of noisy frames and JSONP
//!   handshake bodies
//! - **Supervisor**: exponential backoff with jitter, retry ceiling,
//!   cancellable start/stop from any thread
//! - **Per-session dispatch thread**: the dispatcher never blocks the socket
//! - **Type-state builder**: endpoint and dispatcher checked at compile time

pub mod codec;
pub mod core;
pub mod traits;

// Re-export all traits
pub use traits::*;

pub use codec::{decode_stream, extract_handshake_payload, CodecResult, DecodedMessage, Fragment, HubInvocation};

pub use self::core::{
    builder::states, EndpointDescriptor, FeedSupervisor, FeedSupervisorBuilder, SessionState,
    SignalRConnector, StateSnapshot, SubscriptionDescriptor, SupervisorConfig, SupervisorPhase,
};
