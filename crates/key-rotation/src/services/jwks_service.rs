//! JWKS export for external validators.
//!
//! The document contains exactly the keys that validation currently
//! accepts, so a consumer that refreshes at least once per overlap window
//! never sees a token it cannot verify. Private material never appears
//! here; only the public coordinate leaves the store.

use crate::errors::KrError;
use crate::models::{JsonWebKey, Jwks};
use crate::observability::metrics::{record_jwks_export, set_eligible_signing_keys};
use crate::store::KeyStore;
use common::clock::Clock;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Publishes the validation-eligible key set as an RFC 7517 document.
pub struct JwksExporter {
    store: Arc<KeyStore>,
    clock: Arc<dyn Clock>,
}

impl JwksExporter {
    #[must_use]
    pub fn new(store: Arc<KeyStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Export every validation-eligible public key.
    ///
    /// Returns [`KrError::NoActiveKey`] before bootstrap; an empty key set
    /// would otherwise poison downstream validator caches.
    #[instrument(skip_all)]
    pub fn export(&self) -> Result<Jwks, KrError> {
        let eligible = self.store.eligible_for_validation(self.clock.now());
        set_eligible_signing_keys(eligible.len() as u64);
        if eligible.is_empty() {
            record_jwks_export("error");
            return Err(KrError::NoActiveKey);
        }

        let keys: Vec<JsonWebKey> = eligible
            .into_iter()
            .map(|key| JsonWebKey {
                kid: key.key_id,
                kty: "OKP".to_string(),
                crv: "Ed25519".to_string(),
                x: pem_body(&key.public_key_pem),
                use_: "sig".to_string(),
                alg: "EdDSA".to_string(),
            })
            .collect();

        debug!(key_count = keys.len(), "Exported JWKS");
        record_jwks_export("success");
        Ok(Jwks { keys })
    }
}

/// Strip the PEM armor, leaving the base64 key bytes.
fn pem_body(pem: &str) -> String {
    pem.lines()
        .filter(|line| !line.starts_with("-----"))
        .collect::<Vec<_>>()
        .join("")
}
