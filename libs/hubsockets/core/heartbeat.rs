//! Keep-alive heartbeat for a transport session
//!
//! ```text
//! every `interval`:  send Ping ──> arm pong deadline (`timeout`)
//! Pong received:     disarm deadline
//! deadline fires:    transport fault (connection presumed dead)
//! ```
//!
//! Lives inside the session's own task and is polled from its select loop,
//! so it never competes with message delivery for a lock.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior, Sleep};

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(50);

/// Ping cadence and pong deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_HEARTBEAT_INTERVAL,
            timeout: DEFAULT_HEARTBEAT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeartbeatEvent {
    /// Time to send a ping
    Tick,
    /// A ping went unanswered for longer than the timeout
    TimedOut,
}

pub(crate) struct Heartbeat {
    config: HeartbeatConfig,
    ticker: Interval,
    deadline: Option<Pin<Box<Sleep>>>,
    last_ping: Option<Instant>,
    last_pong: Option<Instant>,
}

impl Heartbeat {
    pub(crate) fn new(config: HeartbeatConfig) -> Self {
        // First ping one full interval after open, not immediately
        let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            config,
            ticker,
            deadline: None,
            last_ping: None,
            last_pong: None,
        }
    }

    pub(crate) fn config(&self) -> HeartbeatConfig {
        self.config
    }

    /// Wait for the next heartbeat event
    pub(crate) async fn next(&mut self) -> HeartbeatEvent {
        let Self {
            ticker, deadline, ..
        } = self;

        tokio::select! {
            _ = ticker.tick() => HeartbeatEvent::Tick,
            _ = async {
                match deadline.as_mut() {
                    Some(sleep) => sleep.as_mut().await,
                    None => pending::<()>().await,
                }
            } => HeartbeatEvent::TimedOut,
        }
    }

    /// Record a ping just sent; arms the pong deadline if not already armed
    pub(crate) fn record_ping(&mut self) {
        let now = Instant::now();
        self.last_ping = Some(now);
        if self.deadline.is_none() {
            self.deadline = Some(Box::pin(tokio::time::sleep_until(now + self.config.timeout)));
        }
    }

    pub(crate) fn record_pong(&mut self) {
        self.last_pong = Some(Instant::now());
        self.deadline = None;
    }

    pub(crate) fn awaiting_pong(&self) -> bool {
        self.deadline.is_some()
    }

    pub(crate) fn since_last_pong(&self) -> Option<Duration> {
        self.last_pong.map(|t| t.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(interval_ms: u64, timeout_ms: u64) -> HeartbeatConfig {
        HeartbeatConfig {
            interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_waits_one_interval() {
        let mut hb = Heartbeat::new(config(1000, 500));
        let started = Instant::now();
        assert_eq!(hb.next().await, HeartbeatEvent::Tick);
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_ping_times_out() {
        let mut hb = Heartbeat::new(config(1000, 500));
        assert_eq!(hb.next().await, HeartbeatEvent::Tick);
        hb.record_ping();
        assert!(hb.awaiting_pong());
        assert_eq!(hb.next().await, HeartbeatEvent::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_disarms_deadline() {
        let mut hb = Heartbeat::new(config(1000, 500));
        assert_eq!(hb.next().await, HeartbeatEvent::Tick);
        hb.record_ping();
        hb.record_pong();
        assert!(!hb.awaiting_pong());
        assert!(hb.since_last_pong().is_some());
        // next event is the following tick, not a timeout
        assert_eq!(hb.next().await, HeartbeatEvent::Tick);
    }
}
