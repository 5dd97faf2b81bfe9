//! Rotation controller: the only mutation path into the key store.
//!
//! A `tokio::sync::Mutex` serializes rotation attempts, so the scheduled
//! path and administrative forced rotations never race: a second caller
//! waits on the lock and then observes the already-completed rotation.
//! Key generation is CPU work and runs while holding only the rotation
//! lock, never the store's lock, so issuance and validation are never
//! blocked behind generation.
//!
//! # Graceful Shutdown
//!
//! The scheduler task supports graceful shutdown via a cancellation token.
//! When the token is cancelled, the task stops waiting and exits cleanly
//! without starting a partial rotation.

use crate::config::RotationConfig;
use crate::crypto;
use crate::errors::KrError;
use crate::models::{KeyHealth, KeyRecord};
use crate::observability::metrics::{
    record_key_generation, record_key_rotation, record_keys_swept, set_key_rotation_last_success,
    set_retained_keys, set_signing_key_age_seconds,
};
use crate::repositories::ActiveKeyRepository;
use crate::store::{KeyStore, Promotion};
use chrono::{DateTime, Utc};
use common::clock::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Drives the key lifecycle: bootstrap, scheduled and forced rotation,
/// expiry sweeping, and standby pre-generation.
///
/// Construct one instance and pass it to whatever owns the application's
/// startup/shutdown sequence; the controller is never a global.
pub struct RotationController {
    store: Arc<KeyStore>,
    config: RotationConfig,
    clock: Arc<dyn Clock>,
    repository: Arc<dyn ActiveKeyRepository>,
    rotation_lock: tokio::sync::Mutex<()>,
}

impl RotationController {
    #[must_use]
    pub fn new(
        store: Arc<KeyStore>,
        config: RotationConfig,
        clock: Arc<dyn Clock>,
        repository: Arc<dyn ActiveKeyRepository>,
    ) -> Self {
        Self {
            store,
            config,
            clock,
            repository,
            rotation_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Generate and activate the first signing key if none exists.
    ///
    /// Must complete before any issuance, validation, or JWKS export.
    /// Failure to produce the initial key is fatal: the process cannot
    /// serve signing or validation without it.
    #[instrument(skip_all)]
    pub async fn bootstrap(&self) -> Result<(), KrError> {
        let _guard = self.rotation_lock.lock().await;

        if self.store.get_active().is_ok() {
            // Key already exists, no need to initialize
            return Ok(());
        }

        // The external store only holds the key id; material is never
        // persisted here, so a restart always starts from fresh material.
        match self.repository.load_active_key_id() {
            Ok(Some(previous)) => {
                info!(
                    previous_key_id = %previous,
                    "Previous active key id recorded; generating fresh key material"
                );
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Failed to load recorded active key id");
            }
        }

        let record = self.generate_record()?;
        self.store.insert_standby(record)?;
        let promotion = self.store.promote_standby(self.clock.now())?;
        self.record_active_key_id(&promotion.activated);

        info!(key_id = %promotion.activated, "Activated initial signing key");

        if self.config.pregenerate_standby {
            if let Err(e) = self.ensure_standby() {
                warn!(error = %e, "Failed to pre-generate standby key; will retry at rotation");
            }
        }

        set_retained_keys(self.store.key_count() as u64);
        Ok(())
    }

    /// Administrative/emergency rotation, outside the normal schedule.
    ///
    /// Idempotent under concurrency: the observed active key is captured
    /// before waiting on the rotation lock, and if a different key is
    /// already active once the lock is held, the call is a no-op returning
    /// `Ok(false)`. N concurrent callers therefore apply exactly one
    /// promotion.
    #[instrument(skip_all)]
    pub async fn force_rotate(&self) -> Result<bool, KrError> {
        let observed = self.store.get_active()?;

        let _guard = self.rotation_lock.lock().await;

        let active = self.store.get_active()?;
        if active.key_id != observed.key_id {
            // A rotation completed while this caller waited on the lock.
            info!(key_id = %active.key_id, "Forced rotation already satisfied by concurrent rotation");
            return Ok(false);
        }

        self.rotate_locked(self.clock.now())?;
        Ok(true)
    }

    /// Scheduled rotation: rotates only when the active key's age has
    /// reached the rotation interval.
    ///
    /// If the clock moved backward since activation the elapsed time reads
    /// negative and the rotation is simply not due; two rotations are never
    /// scheduled within the validation grace of each other.
    #[instrument(skip_all)]
    pub async fn rotate_if_due(&self) -> Result<bool, KrError> {
        let _guard = self.rotation_lock.lock().await;

        let now = self.clock.now();
        let active = self.store.get_active()?;
        let elapsed = now - activation_time(&active);

        if elapsed < self.config.rotation_interval() || elapsed < self.config.validation_grace() {
            return Ok(false);
        }

        self.rotate_locked(now)?;
        Ok(true)
    }

    /// Run the rotation schedule until the cancellation token fires.
    ///
    /// Sleeps until the next rotation deadline, capped at the configured
    /// poll interval so configuration changes and clock adjustments are
    /// picked up within a bounded delay. A deadline already in the past
    /// (e.g. the process was suspended) rotates immediately, once.
    pub async fn run_scheduler(self: Arc<Self>, cancel_token: CancellationToken) {
        info!(
            rotation_interval_seconds = self.config.rotation_interval_seconds,
            "Rotation scheduler started"
        );

        loop {
            let sleep_for = self.next_poll_interval();

            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {
                    match self.rotate_if_due().await {
                        Ok(true) => {}
                        Ok(false) => {}
                        Err(e) => {
                            error!(error = %e, "Scheduled rotation failed; active key remains in service");
                            // A past-due deadline with a persistent failure
                            // would otherwise spin; back off briefly.
                            tokio::select! {
                                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                                _ = cancel_token.cancelled() => break,
                            }
                        }
                    }
                }
                _ = cancel_token.cancelled() => {
                    break;
                }
            }
        }

        info!("Rotation scheduler received shutdown signal, exiting");
    }

    /// Administrative snapshot of the key set.
    pub fn get_key_health(&self) -> KeyHealth {
        self.store.health()
    }

    /// Time until the next schedule evaluation.
    fn next_poll_interval(&self) -> Duration {
        let max_poll = Duration::from_secs(self.config.max_poll_interval_seconds);

        let Ok(active) = self.store.get_active() else {
            // Scheduler running before bootstrap is a startup-ordering bug
            // in the embedding application; keep polling rather than spin.
            error!("Rotation scheduler running before bootstrap completed");
            return Duration::from_secs(1).min(max_poll);
        };

        let now = self.clock.now();
        // Clamp to zero if the clock moved backward since activation.
        let elapsed = (now - activation_time(&active)).max(chrono::Duration::zero());
        set_signing_key_age_seconds(elapsed.num_seconds() as f64);

        let remaining = (self.config.rotation_interval() - elapsed).max(chrono::Duration::zero());
        remaining.to_std().unwrap_or(Duration::ZERO).min(max_poll)
    }

    /// Perform one rotation. Caller must hold the rotation lock.
    fn rotate_locked(&self, now: DateTime<Utc>) -> Result<Promotion, KrError> {
        // Generation happens before the store's lock is taken; only the
        // final insert/promote steps are inside it.
        if !self.store.has_standby() {
            let record = match self.generate_record() {
                Ok(record) => record,
                Err(e) => {
                    record_key_rotation("error");
                    error!(error = %e, "Rotation aborted: could not generate a key to promote");
                    return Err(e);
                }
            };
            self.store.insert_standby(record)?;
        }

        let promotion = match self.store.promote_standby(now) {
            Ok(promotion) => promotion,
            Err(e) => {
                record_key_rotation("error");
                error!(error = %e, "Rotation failed; previous active key remains in service");
                return Err(e);
            }
        };
        self.record_active_key_id(&promotion.activated);

        let swept = self.store.sweep_expired(now);
        record_keys_swept(swept.removed.len() as u64);

        // Failure to pre-generate the next standby does not roll back the
        // promotion; generation is retried on the next schedule tick.
        if self.config.pregenerate_standby {
            if let Err(e) = self.ensure_standby() {
                warn!(error = %e, "Failed to pre-generate next standby key; will retry");
            }
        }

        record_key_rotation("success");
        set_key_rotation_last_success(now.timestamp() as f64);
        set_retained_keys(self.store.key_count() as u64);

        info!(
            activated_key_id = %promotion.activated,
            retired_key_id = promotion.retired.as_deref().unwrap_or("none"),
            swept = swept.removed.len(),
            "Rotated signing key"
        );

        Ok(promotion)
    }

    /// Generate a fresh standby record.
    fn generate_record(&self) -> Result<KeyRecord, KrError> {
        match crypto::generate_signing_key() {
            Ok((public_key_pem, private_key_pkcs8)) => {
                record_key_generation("success");
                Ok(KeyRecord::new_standby(
                    crypto::generate_key_id(),
                    public_key_pem,
                    private_key_pkcs8,
                    self.clock.now(),
                ))
            }
            Err(e) => {
                record_key_generation("error");
                Err(e)
            }
        }
    }

    /// Generate and insert a standby key if none exists.
    fn ensure_standby(&self) -> Result<(), KrError> {
        if self.store.has_standby() {
            return Ok(());
        }
        let record = self.generate_record()?;
        let key_id = record.key_id.clone();
        self.store.insert_standby(record)?;
        info!(key_id = %key_id, "Pre-generated standby key");
        Ok(())
    }

    /// Best-effort write of the active key id to the external store.
    fn record_active_key_id(&self, key_id: &str) {
        if let Err(e) = self.repository.store_active_key_id(key_id) {
            warn!(key_id = %key_id, error = %e, "Failed to record active key id");
        }
    }
}

/// Schedule reference point for a key: activation time, falling back to
/// creation time for keys activated before that field existed.
fn activation_time(key: &KeyRecord) -> DateTime<Utc> {
    key.activated_at.unwrap_or(key.created_at)
}
