//! Test binary for the handshake
//!
//! Runs negotiate and prints the connection token length and the transport
//! URL without opening a socket.

use anyhow::{Context, Result};
use hubsockets::core::handshake::HandshakeClient;
use newsfeed::LoggingContext;
use newsfeed_ingest::bin_common::CliOptions;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let options = CliOptions::from_env()?;
    if options.help {
        println!("Usage: test_negotiate [options]\n\n{}", CliOptions::USAGE);
        return Ok(());
    }

    let config = options.load_feed_config()?;
    LoggingContext::init(&config.logging)?;

    let endpoint = Arc::new(config.endpoint()?);
    let client = HandshakeClient::new(endpoint.clone(), config.supervisor_config().http_retry());

    println!("Negotiating with {} ...", endpoint.negotiate_url());
    let token = client.negotiate().await.context("negotiate failed")?;
    println!("Connection token: {} chars", token.as_str().len());

    let url = endpoint.connect_url(&token);
    let shown = url.split('?').next().unwrap_or(&url);
    println!("Transport URL: {}?...", shown);

    client.release();
    Ok(())
}
