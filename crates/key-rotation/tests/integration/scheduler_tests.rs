//! Background scheduler tests: rotation firing on schedule and graceful
//! shutdown via the cancellation token.
//!
//! Tests run with paused tokio time so the scheduler's sleeps complete
//! instantly; the rotation schedule itself is driven by the manual clock.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{Duration as ChronoDuration, Utc};
use common::clock::{Clock, ManualClock};
use key_rotation::config::RotationConfig;
use key_rotation::repositories::InMemoryActiveKeyRepository;
use key_rotation::services::rotation_service::RotationController;
use key_rotation::store::KeyStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn config() -> RotationConfig {
    RotationConfig {
        rotation_interval_seconds: 7 * 24 * 3600,
        overlap_seconds: 24 * 3600,
        validation_grace_seconds: 300,
        max_retained_keys: 5,
        pregenerate_standby: true,
        max_poll_interval_seconds: 1,
    }
}

fn build(config: RotationConfig) -> (Arc<RotationController>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Arc::new(KeyStore::new(&config));
    let controller = Arc::new(RotationController::new(
        store,
        config,
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::new(InMemoryActiveKeyRepository::new()),
    ));
    (controller, clock)
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_rotates_when_interval_elapses() -> Result<(), anyhow::Error> {
    let (controller, clock) = build(config());
    controller.bootstrap().await?;
    let before = controller.get_key_health().active_key_id;

    let cancel = CancellationToken::new();
    let scheduler = tokio::spawn(
        Arc::clone(&controller).run_scheduler(cancel.clone()),
    );

    // Not due: the scheduler polls but leaves the key set alone.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(controller.get_key_health().active_key_id, before);

    // Push the wall clock past the rotation deadline; the next poll fires.
    clock.advance(ChronoDuration::days(8));
    tokio::time::sleep(Duration::from_secs(5)).await;

    let after = controller.get_key_health().active_key_id;
    assert_ne!(before, after);

    // A past-due deadline rotates once, not repeatedly.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(controller.get_key_health().active_key_id, after);

    cancel.cancel();
    scheduler.await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_shuts_down_on_cancellation() -> Result<(), anyhow::Error> {
    let (controller, _clock) = build(config());
    controller.bootstrap().await?;

    let cancel = CancellationToken::new();
    let scheduler = tokio::spawn(
        Arc::clone(&controller).run_scheduler(cancel.clone()),
    );
    tokio::time::sleep(Duration::from_secs(1)).await;

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), scheduler).await??;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_consecutive_rotations() -> Result<(), anyhow::Error> {
    let (controller, clock) = build(config());
    controller.bootstrap().await?;

    let cancel = CancellationToken::new();
    let scheduler = tokio::spawn(
        Arc::clone(&controller).run_scheduler(cancel.clone()),
    );

    let mut seen = Vec::new();
    for _ in 0..3 {
        clock.advance(ChronoDuration::days(7));
        tokio::time::sleep(Duration::from_secs(5)).await;
        seen.push(controller.get_key_health().active_key_id.unwrap());
    }

    // Three distinct keys activated, one per elapsed interval.
    seen.dedup();
    assert_eq!(seen.len(), 3);

    cancel.cancel();
    scheduler.await?;
    Ok(())
}
