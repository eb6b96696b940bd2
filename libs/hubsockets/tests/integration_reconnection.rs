//! Integration tests for reconnection strategies
//!
//! These tests verify the delay policy the supervisor sleeps on between
//! attempts.

use hubsockets::traits::reconnect::{FixedDelay, JitteredBackoff, ReconnectionStrategy};
use hubsockets::SupervisorConfig;
use std::time::Duration;

mod common;

#[test]
fn test_jittered_delays_stay_within_bounds() {
    verbose_println!("Testing jittered delay bounds...");

    let strategy = JitteredBackoff::new(Duration::from_secs(1), Duration::from_secs(60), None);

    for attempt in 0..10 {
        let (low, high) = strategy.delay_bounds(attempt);
        for _ in 0..200 {
            let delay = strategy.next_delay(attempt).unwrap();
            assert!(
                delay >= low && delay <= high,
                "delay {:?} outside [{:?}, {:?}] at attempt {}",
                delay,
                low,
                high,
                attempt
            );
        }
        verbose_println!("  Attempt {}: [{:?}, {:?}]", attempt, low, high);
    }
}

#[test]
fn test_lower_bound_doubles_until_ceiling() {
    let strategy = JitteredBackoff::new(Duration::from_secs(1), Duration::from_secs(60), None);

    let lows: Vec<u64> = (0..9)
        .map(|k| strategy.delay_bounds(k).0.as_secs())
        .collect();
    assert_eq!(lows, vec![1, 2, 4, 8, 16, 32, 60, 60, 60]);

    // Upper bound is the capped delay plus 25%
    assert_eq!(strategy.delay_bounds(8).1, Duration::from_secs(75));
}

#[test]
fn test_bounds_are_monotonic() {
    let strategy =
        JitteredBackoff::new(Duration::from_millis(250), Duration::from_secs(30), None);

    let mut previous = Duration::ZERO;
    for attempt in 0..40 {
        let (low, _) = strategy.delay_bounds(attempt);
        assert!(low >= previous, "lower bound shrank at attempt {}", attempt);
        previous = low;
    }
}

#[test]
fn test_ceiling_from_supervisor_config() {
    verbose_println!("Testing retry ceiling from config...");

    let config = SupervisorConfig {
        max_retries: 4,
        ..SupervisorConfig::default()
    };
    let strategy = config.strategy();

    for attempt in 0..4 {
        assert!(strategy.should_reconnect(attempt));
        assert!(strategy.next_delay(attempt).is_some());
    }
    assert!(!strategy.should_reconnect(4));
    assert!(strategy.next_delay(4).is_none());
}

#[test]
fn test_zero_jitter_ratio_gives_exact_delays() {
    let strategy = JitteredBackoff::new(Duration::from_millis(100), Duration::from_secs(1), Some(6))
        .with_jitter_ratio(0.0);

    let delays: Vec<u64> = (0..6)
        .map(|i| strategy.next_delay(i).unwrap().as_millis() as u64)
        .collect();
    assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
}

#[test]
fn test_fixed_delay_with_max_attempts() {
    let strategy = FixedDelay::new(Duration::from_millis(500), Some(3));

    assert_eq!(strategy.next_delay(0), Some(Duration::from_millis(500)));
    assert!(strategy.next_delay(2).is_some());
    assert!(strategy.next_delay(3).is_none());
}
