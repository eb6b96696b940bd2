use crate::core::handshake::HttpRetryPolicy;
use crate::core::heartbeat::{HeartbeatConfig, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_HEARTBEAT_TIMEOUT};
use crate::core::session::SessionOptions;
use crate::traits::{HubSocketError, JitteredBackoff, Result, DEFAULT_JITTER_RATIO};
use std::time::Duration;

/// Supervisor tuning
///
/// Defaults: 10 retries, 1 s base doubling to a 60 s cap with 25% jitter,
/// 5 s open window, 60 s ping with a 50 s pong deadline, 10 s HTTP timeout
/// with 3 transport retries.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Failed attempts tolerated before `GivenUp`
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_ratio: f64,
    /// How long to wait for `Opened` after `open`
    pub open_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    /// Fail the attempt when the start call answers non-2xx
    pub require_start_success: bool,
    /// Send the auth token on the start call as well
    pub start_includes_auth: bool,
    pub http_timeout: Duration,
    pub http_retries: u32,
    /// Grace for the dispatch worker to drain on close
    pub drain_grace: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            jitter_ratio: DEFAULT_JITTER_RATIO,
            open_timeout: Duration::from_secs(5),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            require_start_success: false,
            start_includes_auth: true,
            http_timeout: Duration::from_secs(10),
            http_retries: 3,
            drain_grace: Duration::from_secs(2),
        }
    }
}

impl SupervisorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_backoff.is_zero() {
            return Err(HubSocketError::Configuration(
                "base_backoff must be greater than zero".to_string(),
            ));
        }
        if self.max_backoff < self.base_backoff {
            return Err(HubSocketError::Configuration(format!(
                "max_backoff ({:?}) must not be below base_backoff ({:?})",
                self.max_backoff, self.base_backoff
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter_ratio) {
            return Err(HubSocketError::Configuration(format!(
                "jitter_ratio must be within [0, 1], got {}",
                self.jitter_ratio
            )));
        }
        if self.open_timeout.is_zero() || self.heartbeat_interval.is_zero() {
            return Err(HubSocketError::Configuration(
                "open_timeout and heartbeat_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Backoff policy for the reconnection loop
    pub fn strategy(&self) -> JitteredBackoff {
        JitteredBackoff::new(
            self.base_backoff,
            self.max_backoff,
            Some(self.max_retries as usize),
        )
        .with_jitter_ratio(self.jitter_ratio)
    }

    pub fn heartbeat(&self) -> HeartbeatConfig {
        HeartbeatConfig {
            interval: self.heartbeat_interval,
            timeout: self.heartbeat_timeout,
        }
    }

    pub fn http_retry(&self) -> HttpRetryPolicy {
        HttpRetryPolicy {
            max_retries: self.http_retries,
            timeout: self.http_timeout,
            ..HttpRetryPolicy::default()
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            heartbeat: self.heartbeat(),
            drain_grace: self.drain_grace,
            ..SessionOptions::default()
        }
    }
}
