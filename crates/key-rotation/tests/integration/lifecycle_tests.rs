//! End-to-end key lifecycle tests: bootstrap, scheduled rotation, the
//! overlap window, and retention, all driven through a manual clock.
//!
//! The timeline used throughout: rotation every 7 days, 1 day of overlap,
//! 5 minutes of validation grace.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use chrono::{Duration as ChronoDuration, Utc};
use common::clock::{Clock, ManualClock};
use key_rotation::config::RotationConfig;
use key_rotation::errors::KrError;
use key_rotation::models::KeyState;
use key_rotation::repositories::InMemoryActiveKeyRepository;
use key_rotation::services::jwks_service::JwksExporter;
use key_rotation::services::rotation_service::RotationController;
use key_rotation::services::token_service::{TokenIssuer, TokenValidator};
use key_rotation::store::KeyStore;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

fn week() -> ChronoDuration {
    ChronoDuration::days(7)
}

struct Harness {
    clock: Arc<ManualClock>,
    controller: RotationController,
    issuer: TokenIssuer,
    validator: TokenValidator,
    exporter: JwksExporter,
}

fn config() -> RotationConfig {
    RotationConfig {
        rotation_interval_seconds: 7 * 24 * 3600,
        overlap_seconds: 24 * 3600,
        validation_grace_seconds: 300,
        max_retained_keys: 5,
        pregenerate_standby: true,
        max_poll_interval_seconds: 60,
    }
}

fn harness(config: RotationConfig) -> Harness {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Arc::new(KeyStore::new(&config));
    let controller = RotationController::new(
        Arc::clone(&store),
        config,
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::new(InMemoryActiveKeyRepository::new()),
    );
    let issuer = TokenIssuer::new(Arc::clone(&store), Arc::clone(&clock) as Arc<dyn Clock>);
    let validator = TokenValidator::new(Arc::clone(&store), Arc::clone(&clock) as Arc<dyn Clock>);
    let exporter = JwksExporter::new(store, Arc::clone(&clock) as Arc<dyn Clock>);
    Harness {
        clock,
        controller,
        issuer,
        validator,
        exporter,
    }
}

fn claims(subject: &str) -> Map<String, Value> {
    let mut claims = Map::new();
    claims.insert("sub".to_string(), Value::from(subject));
    claims
}

#[tokio::test]
async fn test_full_lifecycle_with_overlap_window() -> Result<(), anyhow::Error> {
    let h = harness(config());
    h.controller.bootstrap().await?;

    // Day 0: issue a long-lived token under key A.
    let token_a = h
        .issuer
        .issue(claims("alice"), Duration::from_secs(30 * 24 * 3600))?;
    h.validator.validate(&token_a, true)?;

    // Day 7: scheduled rotation promotes key B; A enters its overlap.
    h.clock.advance(week());
    assert!(h.controller.rotate_if_due().await?);

    // Tokens signed by A keep validating during the overlap.
    h.validator.validate(&token_a, true)?;
    let token_b = h
        .issuer
        .issue(claims("alice"), Duration::from_secs(3600))?;
    h.validator.validate(&token_b, true)?;

    // Day 8 minus a second: still inside the overlap.
    h.clock
        .advance(ChronoDuration::days(1) - ChronoDuration::seconds(1));
    h.validator.validate(&token_a, true)?;

    // Day 8 plus grace minus a second: still eligible.
    h.clock.advance(ChronoDuration::seconds(1 + 299));
    h.validator.validate(&token_a, true)?;

    // Past day 8 plus the full grace: A no longer validates anything.
    h.clock.advance(ChronoDuration::seconds(2));
    assert!(matches!(
        h.validator.validate(&token_a, true),
        Err(KrError::SignatureInvalid)
    ));

    // Tokens from the current key are unaffected throughout.
    let token_b2 = h
        .issuer
        .issue(claims("alice"), Duration::from_secs(3600))?;
    h.validator.validate(&token_b2, true)?;
    Ok(())
}

#[tokio::test]
async fn test_rotation_changes_signing_key_id() -> Result<(), anyhow::Error> {
    let h = harness(config());
    h.controller.bootstrap().await?;

    let before = h.controller.get_key_health().active_key_id;
    h.clock.advance(week());
    h.controller.rotate_if_due().await?;
    let after = h.controller.get_key_health().active_key_id;

    assert!(before.is_some());
    assert!(after.is_some());
    assert_ne!(before, after);
    Ok(())
}

#[tokio::test]
async fn test_standby_pregenerated_across_rotations() -> Result<(), anyhow::Error> {
    let h = harness(config());
    h.controller.bootstrap().await?;

    for _ in 0..3 {
        let health = h.controller.get_key_health();
        let standby = health.standby_key_id.clone().expect("standby present");

        h.clock.advance(week());
        h.controller.rotate_if_due().await?;

        // The pre-generated standby is the one that got promoted.
        let health = h.controller.get_key_health();
        assert_eq!(health.active_key_id.as_deref(), Some(standby.as_str()));
        assert!(health.standby_key_id.is_some());
        assert_ne!(health.standby_key_id, health.active_key_id);
    }
    Ok(())
}

#[tokio::test]
async fn test_retention_bound_holds_across_many_rotations() -> Result<(), anyhow::Error> {
    // Short overlap so retiring keys pile up only through retention, and a
    // tight retention bound to exercise eviction.
    let config = RotationConfig {
        max_retained_keys: 3,
        ..config()
    };
    let h = harness(config);
    h.controller.bootstrap().await?;

    for _ in 0..10 {
        h.clock.advance(week());
        h.controller.rotate_if_due().await?;
        assert!(h.controller.get_key_health().total_keys <= 3);
    }

    // The active key is never evicted.
    let health = h.controller.get_key_health();
    assert!(health.active_key_id.is_some());
    Ok(())
}

#[tokio::test]
async fn test_expired_keys_swept_on_rotation() -> Result<(), anyhow::Error> {
    let h = harness(config());
    h.controller.bootstrap().await?;

    h.clock.advance(week());
    h.controller.rotate_if_due().await?;

    // Two more weeks: the first key's overlap and grace lapsed long ago,
    // so the next rotation's sweep removes it entirely.
    h.clock.advance(week());
    h.controller.rotate_if_due().await?;

    let health = h.controller.get_key_health();
    assert!(health
        .keys
        .iter()
        .all(|k| k.state != KeyState::Expired));
    // Active + its retiring predecessor + pre-generated standby.
    assert_eq!(health.total_keys, 3);
    Ok(())
}

#[tokio::test]
async fn test_expired_token_distinguished_from_forged() -> Result<(), anyhow::Error> {
    let h = harness(config());
    h.controller.bootstrap().await?;

    let token = h.issuer.issue(claims("alice"), Duration::from_secs(60))?;
    h.clock.advance(ChronoDuration::seconds(120));

    match h.validator.validate(&token, true) {
        Err(KrError::TokenExpired { verified_by, .. }) => {
            assert_eq!(
                Some(verified_by),
                h.controller.get_key_health().active_key_id
            );
        }
        other => panic!("expected TokenExpired, got {other:?}"),
    }

    // A token nobody here signed is a signature failure, not an expiry.
    let foreign = harness(config());
    foreign.controller.bootstrap().await?;
    let forged = foreign
        .issuer
        .issue(claims("alice"), Duration::from_secs(60))?;
    assert!(matches!(
        h.validator.validate(&forged, true),
        Err(KrError::SignatureInvalid)
    ));
    Ok(())
}

#[tokio::test]
async fn test_rotation_not_due_early() -> Result<(), anyhow::Error> {
    let h = harness(config());
    h.controller.bootstrap().await?;

    h.clock.advance(ChronoDuration::days(6));
    assert!(!h.controller.rotate_if_due().await?);
    assert_eq!(h.controller.get_key_health().total_keys, 2);
    Ok(())
}

#[tokio::test]
async fn test_health_snapshot_shape() -> Result<(), anyhow::Error> {
    let h = harness(config());
    h.controller.bootstrap().await?;

    let health = h.controller.get_key_health();
    assert_eq!(health.total_keys, health.keys.len());
    let active = health
        .keys
        .iter()
        .find(|k| Some(&k.key_id) == health.active_key_id.as_ref())
        .expect("active key listed");
    assert_eq!(active.state, KeyState::Active);
    assert!(active.activated_at.is_some());

    // The snapshot serializes without any private key material.
    let json = serde_json::to_string(&health)?;
    assert!(!json.contains("private"));
    assert!(!json.contains("pkcs8"));
    Ok(())
}

#[tokio::test]
async fn test_jwks_and_validator_agree_on_eligible_set() -> Result<(), anyhow::Error> {
    let h = harness(config());
    h.controller.bootstrap().await?;

    h.clock.advance(week());
    h.controller.rotate_if_due().await?;

    // During the overlap both keys appear in the JWKS.
    assert_eq!(h.exporter.export()?.keys.len(), 2);

    // After overlap and grace only the active key remains.
    h.clock
        .advance(ChronoDuration::days(1) + ChronoDuration::seconds(301));
    let jwks = h.exporter.export()?;
    assert_eq!(jwks.keys.len(), 1);
    assert_eq!(
        Some(&jwks.keys[0].kid),
        h.controller.get_key_health().active_key_id.as_ref()
    );
    Ok(())
}
