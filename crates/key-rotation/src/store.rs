//! In-memory signing key registry.
//!
//! A single `RwLock` guards the whole registry: every mutation takes the
//! write lock, so a promotion is atomic with respect to concurrent readers.
//! Readers copy a consistent snapshot under the read lock and never observe
//! a half-applied promotion.
//!
//! The store enforces the lifecycle invariants; the rotation controller is
//! the only component that calls the mutating operations.

use crate::config::RotationConfig;
use crate::errors::KrError;
use crate::models::{KeyHealth, KeyMetadata, KeyRecord, KeyState};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

struct StoreInner {
    keys: HashMap<String, KeyRecord>,
    active_key_id: Option<String>,
    standby_key_id: Option<String>,
}

/// Outcome of a successful promotion.
#[derive(Debug, Clone)]
pub struct Promotion {
    /// Key id that is now active.
    pub activated: String,
    /// Key id that moved to retiring (absent at bootstrap).
    pub retired: Option<String>,
}

/// Outcome of a sweep pass.
#[derive(Debug, Clone, Default)]
pub struct SweepOutcome {
    /// Key ids transitioned from retiring to expired during this pass.
    pub expired: Vec<String>,
    /// Key ids removed from the store during this pass.
    pub removed: Vec<String>,
}

/// Mutation-guarded registry of all known signing keys.
pub struct KeyStore {
    inner: RwLock<StoreInner>,
    overlap: chrono::Duration,
    validation_grace: chrono::Duration,
    max_retained_keys: usize,
}

impl KeyStore {
    #[must_use]
    pub fn new(config: &RotationConfig) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                keys: HashMap::new(),
                active_key_id: None,
                standby_key_id: None,
            }),
            overlap: config.overlap(),
            validation_grace: config.validation_grace(),
            max_retained_keys: config.max_retained_keys,
        }
    }

    /// The current active key.
    ///
    /// Fails with `NoActiveKey` only before bootstrap has activated the
    /// first key.
    pub fn get_active(&self) -> Result<KeyRecord, KrError> {
        let inner = self.read();
        inner
            .active_key_id
            .as_ref()
            .and_then(|id| inner.keys.get(id))
            .cloned()
            .ok_or(KrError::NoActiveKey)
    }

    /// Snapshot of every key currently eligible to validate tokens: the
    /// active key plus retiring keys inside their grace window.
    pub fn eligible_for_validation(&self, now: DateTime<Utc>) -> Vec<KeyRecord> {
        let inner = self.read();
        let mut eligible: Vec<KeyRecord> = inner
            .keys
            .values()
            .filter(|k| k.is_eligible_for_validation(now, self.validation_grace))
            .cloned()
            .collect();
        // Most recently created first, so the active key leads the scan.
        eligible.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        eligible
    }

    /// Register a freshly generated standby key.
    ///
    /// At most one unconsumed standby may exist at a time.
    pub fn insert_standby(&self, record: KeyRecord) -> Result<(), KrError> {
        if record.state != KeyState::Standby {
            return Err(KrError::Crypto(format!(
                "Cannot insert key {} as standby: state is {}",
                record.key_id,
                record.state.as_str()
            )));
        }

        let mut inner = self.write();
        if let Some(existing) = &inner.standby_key_id {
            return Err(KrError::StandbyAlreadyExists {
                key_id: existing.clone(),
            });
        }

        inner.standby_key_id = Some(record.key_id.clone());
        inner.keys.insert(record.key_id.clone(), record);
        Ok(())
    }

    /// Atomically promote the standby key to active.
    ///
    /// The previous active key (if any) becomes retiring with
    /// `expires_at = now + overlap`. Fails with `NoStandbyKey` before any
    /// state is touched, so a failed promotion leaves the previous active
    /// key operating.
    pub fn promote_standby(&self, now: DateTime<Utc>) -> Result<Promotion, KrError> {
        let mut inner = self.write();

        let standby_id = inner.standby_key_id.clone().ok_or(KrError::NoStandbyKey)?;
        if !inner.keys.contains_key(&standby_id) {
            // Registry and pointer out of sync; refuse rather than promote
            // a phantom key.
            return Err(KrError::NoStandbyKey);
        }

        // Demote the previous active key.
        let previous_active = inner.active_key_id.clone();
        if let Some(prev_id) = &previous_active {
            if let Some(prev) = inner.keys.get_mut(prev_id) {
                prev.state = KeyState::Retiring;
                prev.retiring_since = Some(now);
                prev.expires_at = Some(now + self.overlap);
            }
        }

        // Activate the standby.
        if let Some(standby) = inner.keys.get_mut(&standby_id) {
            standby.state = KeyState::Active;
            standby.activated_at = Some(now);
        }
        inner.active_key_id = Some(standby_id.clone());
        inner.standby_key_id = None;

        Ok(Promotion {
            activated: standby_id,
            retired: previous_active,
        })
    }

    /// Expire retiring keys past their grace window, drop expired keys, and
    /// enforce the retention bound.
    ///
    /// The retention bound force-expires the oldest keys beyond
    /// `max_retained_keys`, but never the current active key.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> SweepOutcome {
        let mut inner = self.write();
        let mut outcome = SweepOutcome::default();

        // Retiring keys whose grace window has fully elapsed become expired.
        for key in inner.keys.values_mut() {
            if key.state == KeyState::Retiring {
                if let Some(expires_at) = key.expires_at {
                    if expires_at + self.validation_grace <= now {
                        key.state = KeyState::Expired;
                        outcome.expired.push(key.key_id.clone());
                    }
                }
            }
        }

        // Removal is the terminal event in a key's lifecycle.
        let expired_ids: Vec<String> = inner
            .keys
            .values()
            .filter(|k| k.state == KeyState::Expired)
            .map(|k| k.key_id.clone())
            .collect();
        for id in expired_ids {
            inner.keys.remove(&id);
            outcome.removed.push(id);
        }

        // Retention bound: force-expire the oldest non-active keys beyond
        // the limit.
        while inner.keys.len() > self.max_retained_keys {
            let active_id = inner.active_key_id.clone();
            let oldest = inner
                .keys
                .values()
                .filter(|k| Some(&k.key_id) != active_id.as_ref())
                .min_by_key(|k| k.created_at)
                .map(|k| k.key_id.clone());

            let Some(victim) = oldest else {
                break;
            };
            if inner.standby_key_id.as_ref() == Some(&victim) {
                inner.standby_key_id = None;
            }
            inner.keys.remove(&victim);
            outcome.removed.push(victim);
        }

        outcome
    }

    /// Administrative snapshot; never includes private material.
    pub fn health(&self) -> KeyHealth {
        let inner = self.read();
        let mut keys: Vec<KeyMetadata> = inner.keys.values().map(KeyMetadata::from).collect();
        keys.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        KeyHealth {
            active_key_id: inner.active_key_id.clone(),
            standby_key_id: inner.standby_key_id.clone(),
            total_keys: inner.keys.len(),
            keys,
        }
    }

    /// Number of keys currently retained.
    pub fn key_count(&self) -> usize {
        self.read().keys.len()
    }

    /// Whether an unconsumed standby key exists.
    pub fn has_standby(&self) -> bool {
        self.read().standby_key_id.is_some()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
