//! Concurrency tests: forced-rotation idempotency and issuance racing
//! against rotation.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Utc;
use common::clock::{Clock, ManualClock};
use key_rotation::config::RotationConfig;
use key_rotation::repositories::InMemoryActiveKeyRepository;
use key_rotation::services::rotation_service::RotationController;
use key_rotation::services::token_service::{TokenIssuer, TokenValidator};
use key_rotation::store::KeyStore;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

fn config() -> RotationConfig {
    RotationConfig {
        rotation_interval_seconds: 7 * 24 * 3600,
        overlap_seconds: 24 * 3600,
        validation_grace_seconds: 300,
        max_retained_keys: 10,
        pregenerate_standby: true,
        max_poll_interval_seconds: 60,
    }
}

fn build(
    config: RotationConfig,
) -> (Arc<KeyStore>, Arc<RotationController>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Arc::new(KeyStore::new(&config));
    let controller = Arc::new(RotationController::new(
        Arc::clone(&store),
        config,
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::new(InMemoryActiveKeyRepository::new()),
    ));
    (store, controller, clock)
}

fn claims(subject: &str) -> Map<String, Value> {
    let mut claims = Map::new();
    claims.insert("sub".to_string(), Value::from(subject));
    claims
}

#[tokio::test]
async fn test_concurrent_force_rotations_stay_consistent() -> Result<(), anyhow::Error> {
    let (_store, controller, _clock) = build(config());
    controller.bootstrap().await?;
    let before = controller.get_key_health().active_key_id;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.force_rotate().await })
        })
        .collect();

    let mut rotated = 0;
    for handle in handles {
        if handle.await?? {
            rotated += 1;
        }
    }

    // Callers whose request was satisfied by an overlapping rotation
    // report false; the store reflects exactly the rotations that applied.
    // Bootstrap leaves 2 keys (active + standby) and each applied rotation
    // adds one (promoted standby replaced by a fresh pre-generated one).
    assert!(rotated >= 1);
    let health = controller.get_key_health();
    assert_eq!(health.total_keys, 2 + rotated);
    assert!(health.active_key_id.is_some());
    assert_ne!(before, health.active_key_id);
    Ok(())
}

#[tokio::test]
async fn test_sequential_force_rotations_each_apply() -> Result<(), anyhow::Error> {
    let (_store, controller, _clock) = build(config());
    controller.bootstrap().await?;

    assert!(controller.force_rotate().await?);
    assert!(controller.force_rotate().await?);

    // Each call saw the key it intended to replace, so both applied.
    let health = controller.get_key_health();
    assert!(health.active_key_id.is_some());
    Ok(())
}

#[tokio::test]
async fn test_issuance_during_rotation_yields_valid_tokens() -> Result<(), anyhow::Error> {
    let (store, controller, clock) = build(config());
    controller.bootstrap().await?;

    let issuer = Arc::new(TokenIssuer::new(
        Arc::clone(&store),
        Arc::clone(&clock) as Arc<dyn Clock>,
    ));
    let validator = TokenValidator::new(store, Arc::clone(&clock) as Arc<dyn Clock>);

    // Issue from many tasks while rotations happen in between. Every
    // token is signed by whichever key was active at its instant, and all
    // of them must validate afterwards because the previous key stays
    // eligible through its overlap.
    let mut issue_handles = Vec::new();
    for round in 0..4 {
        for task in 0..4 {
            let issuer = Arc::clone(&issuer);
            let subject = format!("user-{round}-{task}");
            issue_handles.push(tokio::spawn(async move {
                issuer.issue(claims(&subject), Duration::from_secs(3600))
            }));
        }
        controller.force_rotate().await?;
    }

    for handle in issue_handles {
        let token = handle.await??;
        validator.validate(&token, true)?;
    }
    Ok(())
}

#[tokio::test]
async fn test_reads_see_old_or_new_key_never_none() -> Result<(), anyhow::Error> {
    let (store, controller, _clock) = build(config());
    controller.bootstrap().await?;

    // Hammer the active-key read path while rotating; the store must never
    // observe an intermediate state with no active key.
    let reader_store = Arc::clone(&store);
    let reader = tokio::spawn(async move {
        for _ in 0..2000 {
            reader_store
                .get_active()
                .expect("active key must always exist after bootstrap");
            tokio::task::yield_now().await;
        }
    });

    for _ in 0..5 {
        controller.force_rotate().await?;
        tokio::task::yield_now().await;
    }

    reader.await?;
    Ok(())
}
