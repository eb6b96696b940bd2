//! News Feed Ingest - Main Library
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, runners)
//! - **hubsockets**: Reconnecting hub client (re-exported from workspace)
//! - **newsfeed**: Config, logging, shutdown and the NewsHub dispatcher
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use newsfeed_ingest::bin_common::{CliOptions, FeedRunner};
//! use newsfeed_ingest::newsfeed::FeedConfig;
//! ```

// Re-export workspace libraries for convenience
pub use hubsockets;
pub use newsfeed;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod runner;

    pub use cli::{load_config_from_env, parse_args, CliOptions, ConfigType};
    pub use runner::{BinaryRunner, FeedRunner, RunConfig};
}
