//! # Newsfeed
//!
//! Glue around `hubsockets`: configuration, logging, shutdown and the
//! NewsHub dispatcher that turns hub invocations into news items.

pub mod config;
pub mod handlers;
pub mod infrastructure;

pub use config::{ConfigError, EndpointSection, FeedConfig, LoggingConfig, ReconnectSection};
pub use handlers::{ChannelSink, LogSink, NewsHubHandler, NewsItem, NewsSink};
pub use infrastructure::{LoggingContext, LoggingError, ShutdownManager};
