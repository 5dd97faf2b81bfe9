use chrono::{DateTime, Utc};
use common::secret::{ExposeSecret, SecretBox};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a signing key.
///
/// Transitions only move forward: `Standby -> Active -> Retiring -> Expired`,
/// after which the sweep removes the key from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyState {
    Standby,
    Active,
    Retiring,
    Expired,
}

impl KeyState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyState::Standby => "standby",
            KeyState::Active => "active",
            KeyState::Retiring => "retiring",
            KeyState::Expired => "expired",
        }
    }
}

/// One generated keypair plus its lifecycle metadata.
///
/// The private material is wrapped in `SecretBox` so it cannot leak through
/// `Debug` or tracing. Debug and Clone are manually implemented: `SecretBox`
/// requires explicit cloning and redacted formatting.
pub struct KeyRecord {
    /// Opaque unique identifier; immutable once created. Public (appears in
    /// token headers and the JWKS).
    pub key_id: String,
    /// Public key in PEM format.
    pub public_key_pem: String,
    /// Private key in PKCS#8 format. Use `.expose_secret()` to access the
    /// actual bytes; only the issuer's signing path may do so.
    pub private_key_pkcs8: SecretBox<Vec<u8>>,
    /// Fixed signing algorithm tag (`EdDSA`).
    pub algorithm: String,
    /// Timestamp of generation; immutable.
    pub created_at: DateTime<Utc>,
    /// Timestamp of promotion to active. With pre-generation enabled a key
    /// is created one rotation before it activates, so the schedule is
    /// measured from this instant rather than `created_at`.
    pub activated_at: Option<DateTime<Utc>>,
    pub state: KeyState,
    /// Set only on the transition into `Retiring`.
    pub retiring_since: Option<DateTime<Utc>>,
    /// `retiring_since + overlap`; set only on the transition into `Retiring`.
    pub expires_at: Option<DateTime<Utc>>,
}

impl KeyRecord {
    /// Build a fresh standby record from newly generated material.
    #[must_use]
    pub fn new_standby(
        key_id: String,
        public_key_pem: String,
        private_key_pkcs8: Vec<u8>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key_id,
            public_key_pem,
            private_key_pkcs8: SecretBox::new(Box::new(private_key_pkcs8)),
            algorithm: crate::crypto::SIGNING_ALGORITHM.to_string(),
            created_at,
            activated_at: None,
            state: KeyState::Standby,
            retiring_since: None,
            expires_at: None,
        }
    }

    /// Whether this key may still be used to validate tokens at `now`.
    ///
    /// The active key is always eligible; a retiring key is eligible until
    /// `expires_at + grace`. Standby and expired keys never validate.
    #[must_use]
    pub fn is_eligible_for_validation(&self, now: DateTime<Utc>, grace: chrono::Duration) -> bool {
        match self.state {
            KeyState::Active => true,
            KeyState::Retiring => self
                .expires_at
                .map(|expires_at| now < expires_at + grace)
                .unwrap_or(false),
            KeyState::Standby | KeyState::Expired => false,
        }
    }
}

impl Clone for KeyRecord {
    fn clone(&self) -> Self {
        Self {
            key_id: self.key_id.clone(),
            public_key_pem: self.public_key_pem.clone(),
            private_key_pkcs8: SecretBox::new(Box::new(
                self.private_key_pkcs8.expose_secret().clone(),
            )),
            algorithm: self.algorithm.clone(),
            created_at: self.created_at,
            activated_at: self.activated_at,
            state: self.state,
            retiring_since: self.retiring_since,
            expires_at: self.expires_at,
        }
    }
}

impl fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRecord")
            .field("key_id", &self.key_id)
            .field("public_key_pem", &self.public_key_pem)
            .field("private_key_pkcs8", &"[REDACTED]")
            .field("algorithm", &self.algorithm)
            .field("created_at", &self.created_at)
            .field("activated_at", &self.activated_at)
            .field("state", &self.state)
            .field("retiring_since", &self.retiring_since)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// JWKS response (RFC 7517)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<JsonWebKey>,
}

/// JSON Web Key (RFC 7517)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKey {
    pub kid: String,
    pub kty: String,
    pub crv: String,
    pub x: String,
    #[serde(rename = "use")]
    pub use_: String,
    pub alg: String,
}

/// Administrative snapshot of key health.
#[derive(Debug, Clone, Serialize)]
pub struct KeyHealth {
    pub active_key_id: Option<String>,
    pub standby_key_id: Option<String>,
    pub total_keys: usize,
    pub keys: Vec<KeyMetadata>,
}

/// Per-key metadata for the health snapshot. Never carries private material.
#[derive(Debug, Clone, Serialize)]
pub struct KeyMetadata {
    pub key_id: String,
    pub state: KeyState,
    pub algorithm: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retiring_since: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&KeyRecord> for KeyMetadata {
    fn from(record: &KeyRecord) -> Self {
        Self {
            key_id: record.key_id.clone(),
            state: record.state,
            algorithm: record.algorithm.clone(),
            created_at: record.created_at,
            activated_at: record.activated_at,
            retiring_since: record.retiring_since,
            expires_at: record.expires_at,
        }
    }
}
