//! Process-level plumbing: logging setup and shutdown signalling

pub mod logging;
pub mod shutdown;

pub use logging::{LoggingContext, LoggingError};
pub use shutdown::ShutdownManager;
