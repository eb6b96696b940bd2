//! Binary runner utilities
//!
//! Provides a standardized way to run binaries with proper
//! logging, status reporting, and graceful shutdown.

use anyhow::{anyhow, Context};
use hubsockets::{Dispatcher, FeedSupervisor, SupervisorPhase};
use newsfeed::{FeedConfig, ShutdownManager};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Configuration for running a binary application
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Name of the binary (for logging)
    pub name: String,
    /// Status log interval in seconds
    pub status_interval_secs: u64,
}

impl RunConfig {
    /// Create a new run configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status_interval_secs: 300, // 5 minutes default
        }
    }

    /// Set status log interval
    pub fn with_status_interval(mut self, secs: u64) -> Self {
        self.status_interval_secs = secs;
        self
    }
}

/// Trait for binary applications
pub trait BinaryRunner {
    /// Run the application main loop
    async fn run(&mut self) -> anyhow::Result<()>;

    /// Get the run configuration
    fn config(&self) -> &RunConfig;

    /// Summary line for the shutdown banner
    fn stats(&self) -> Option<String> {
        None
    }

    /// Print startup banner
    fn print_banner(&self) {
        let config = self.config();
        info!("");
        info!("========================================");
        info!("Starting {}", config.name);
        info!("Press Ctrl+C to stop");
        info!("========================================");
        info!("");
    }

    /// Print shutdown banner
    fn print_shutdown(&self, stats: Option<&str>) {
        let config = self.config();
        info!("");
        info!("========================================");
        info!("{} stopped", config.name);
        if let Some(stats) = stats {
            info!("{}", stats);
        }
        info!("========================================");
    }

    /// Execute the binary with proper initialization and cleanup
    async fn execute(&mut self) -> anyhow::Result<()> {
        self.print_banner();
        let result = self.run().await;
        let stats = self.stats();
        self.print_shutdown(stats.as_deref());
        result
    }
}

/// Runs one feed supervisor until Ctrl+C or until it gives up
pub struct FeedRunner {
    run_config: RunConfig,
    feed: FeedConfig,
    dispatcher: Arc<dyn Dispatcher>,
    shutdown: ShutdownManager,
    last_attempts: u64,
}

impl FeedRunner {
    pub fn new(
        run_config: RunConfig,
        feed: FeedConfig,
        dispatcher: Arc<dyn Dispatcher>,
        shutdown: ShutdownManager,
    ) -> Self {
        Self {
            run_config,
            feed,
            dispatcher,
            shutdown,
            last_attempts: 0,
        }
    }
}

impl BinaryRunner for FeedRunner {
    async fn run(&mut self) -> anyhow::Result<()> {
        let endpoint = self.feed.endpoint()?;
        info!(
            "Feed endpoint {} (hubs: {})",
            endpoint.http_base(),
            endpoint.subscription().hubs().join(",")
        );

        let supervisor = FeedSupervisor::builder()
            .endpoint(endpoint)
            .shared_dispatcher(self.dispatcher.clone())
            .config(self.feed.supervisor_config())
            .build()
            .context("building feed supervisor")?;

        let mut states = supervisor.subscribe();
        supervisor.start();

        let mut status = tokio::time::interval(Duration::from_secs(
            self.run_config.status_interval_secs.max(1),
        ));
        status.tick().await;

        let outcome = loop {
            tokio::select! {
                _ = self.shutdown.wait() => break Ok(()),
                _ = status.tick() => {
                    let s = supervisor.snapshot();
                    info!(
                        phase = %s.phase,
                        attempts = s.attempts,
                        episodes = s.episodes,
                        retry = s.retry_count,
                        "Feed status"
                    );
                }
                changed = states.changed() => {
                    if changed.is_err() {
                        break Err(anyhow!("supervisor state channel closed"));
                    }
                    let s = states.borrow_and_update().clone();
                    if s.phase == SupervisorPhase::GivenUp {
                        warn!("Feed supervisor gave up after {} attempts", s.attempts);
                        break Err(anyhow!("gave up after {} attempts", s.attempts));
                    }
                }
            }
        };

        supervisor.shutdown().await;
        self.last_attempts = supervisor.snapshot().attempts;
        outcome
    }

    fn config(&self) -> &RunConfig {
        &self.run_config
    }

    fn stats(&self) -> Option<String> {
        Some(format!("Connection attempts: {}", self.last_attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_config_builder() {
        let config = RunConfig::new("test-binary").with_status_interval(120);

        assert_eq!(config.name, "test-binary");
        assert_eq!(config.status_interval_secs, 120);
    }

    #[test]
    fn test_default_config() {
        let config = RunConfig::new("default");
        assert_eq!(config.status_interval_secs, 300);
    }
}
