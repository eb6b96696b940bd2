//! News feed ingest
//!
//! Connects to the NewsHub feed, keeps the connection alive across drops and
//! logs every headline until Ctrl+C.

use anyhow::Result;
use newsfeed::{LogSink, LoggingContext, NewsHubHandler, ShutdownManager};
use newsfeed_ingest::bin_common::{BinaryRunner, CliOptions, FeedRunner, RunConfig};
use std::sync::Arc;
use tracing::Instrument;

#[tokio::main]
async fn main() -> Result<()> {
    let options = CliOptions::from_env()?;
    if options.help {
        println!("Usage: feed_ingest [options]\n\n{}", CliOptions::USAGE);
        return Ok(());
    }

    let config = options.load_feed_config()?;
    let logging = LoggingContext::init(&config.logging)?;

    // Fail before connecting when no token is available
    config.require_auth_token()?;

    let shutdown = ShutdownManager::new();
    shutdown.spawn_signal_handler();

    let handler = Arc::new(NewsHubHandler::new(LogSink));
    let mut runner = FeedRunner::new(
        RunConfig::new("Feed Ingest"),
        config,
        handler.clone(),
        shutdown,
    );
    let result = runner.execute().instrument(logging.span("feed_ingest")).await;

    tracing::info!(
        "News items logged: {} (skipped {})",
        handler.items_published(),
        handler.items_skipped()
    );
    result
}
