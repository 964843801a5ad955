//! Contract Test: Propagation Wait
//!
//! The wait after attach/detach is a bounded poll, not a fixed sleep.
//!
//! Constraints verified:
//! - The poll exits at the first read that reports a changed address
//! - A lagging provider is re-read until it catches up, within max_attempts
//! - If the provider never catches up, the last observed address is returned
//! - A single-read policy reproduces the fixed-delay behavior
//!
//! All tests run on a paused clock, so elapsed time is exact.

mod common;

use common::*;
use iprotate_core::{Operation, PropagationPolicy, RotationOrchestrator};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn poll_exits_on_first_changed_read() {
    let provider = dynamic_instance();
    let orchestrator = orchestrator(provider.clone());

    let started = Instant::now();
    let rotation = orchestrator.rotate(INSTANCE, STATIC_IP).await.unwrap();

    assert_eq!(started.elapsed(), Duration::from_secs(1));
    assert_ne!(rotation.new_ip, DYNAMIC_IP);
    assert_eq!(provider.calls(Operation::GetInstance), 2);
}

#[tokio::test(start_paused = true)]
async fn lagging_provider_is_polled_until_it_catches_up() {
    let provider = dynamic_instance().with_propagation_lag(3);
    let orchestrator = orchestrator(provider.clone());

    let started = Instant::now();
    let rotation = orchestrator.rotate(INSTANCE, STATIC_IP).await.unwrap();

    assert_eq!(started.elapsed(), Duration::from_secs(4));
    assert_eq!(rotation.new_ip, provider.snapshot(INSTANCE).unwrap().public_ip);
    assert_eq!(provider.calls(Operation::GetInstance), 1 + 4);
}

#[tokio::test(start_paused = true)]
async fn poll_gives_up_after_max_attempts() {
    let provider = dynamic_instance().with_propagation_lag(50);
    let orchestrator = orchestrator(provider.clone());

    let started = Instant::now();
    let rotation = orchestrator.rotate(INSTANCE, STATIC_IP).await.unwrap();

    assert_eq!(started.elapsed(), test_policy().max_wait());
    assert_eq!(rotation.new_ip, DYNAMIC_IP);
    assert_eq!(
        provider.calls(Operation::GetInstance),
        1 + test_policy().max_attempts
    );
}

#[tokio::test(start_paused = true)]
async fn fixed_policy_reads_once_after_the_delay() {
    let provider = static_instance().with_propagation_lag(1);
    let orchestrator = RotationOrchestrator::new(
        Arc::new(provider.clone()),
        PropagationPolicy::fixed(Duration::from_secs(5)),
    );

    let started = Instant::now();
    let rotation = orchestrator.rotate(INSTANCE, STATIC_IP).await.unwrap();

    assert_eq!(started.elapsed(), Duration::from_secs(5));
    // the single read still saw the stale address
    assert_eq!(rotation.new_ip, rotation.old_ip);
    assert_eq!(provider.calls(Operation::GetInstance), 2);
}
