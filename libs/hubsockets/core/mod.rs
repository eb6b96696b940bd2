//! # HubSockets core
//!
//! Handshake, transport session and the reconnection supervisor.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hubsockets::{EndpointDescriptor, FeedSupervisor, NoOpDispatcher};
//!
//! #[tokio::main]
//! async fn main() -> hubsockets::Result<()> {
//!     let endpoint = EndpointDescriptor::builder("https://feed.example.com")
//!         .origin("https://www.example.com")
//!         .auth_token(std::env::var("FEED_FTOKEN").ok())
//!         .build()?;
//!
//!     let supervisor = FeedSupervisor::builder()
//!         .endpoint(endpoint)
//!         .dispatcher(NoOpDispatcher)
//!         .max_retries(10)
//!         .build()?;
//!
//!     supervisor.start();
//!     tokio::signal::ctrl_c().await.ok();
//!     supervisor.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod config;
pub mod connector;
pub(crate) mod dispatch;
pub mod endpoint;
pub mod handshake;
pub mod heartbeat;
pub mod session;
pub mod state;
pub mod supervisor;

// Re-export main types
pub use builder::{states, FeedSupervisorBuilder};
pub use config::SupervisorConfig;
pub use connector::SignalRConnector;
pub use endpoint::{ConnectionToken, EndpointDescriptor, EndpointDescriptorBuilder, SubscriptionDescriptor};
pub use handshake::{parse_negotiate_body, HandshakeClient, HttpRetryPolicy, NegotiateResponse};
pub use heartbeat::HeartbeatConfig;
pub use session::{build_request, SessionOptions, TransportSession};
pub use state::{SessionState, StateSnapshot, SupervisorPhase};
pub use supervisor::FeedSupervisor;
