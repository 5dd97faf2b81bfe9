//! Token issuance and validation against the rotating key set.
//!
//! Issuance always signs with the single active key. Validation accepts
//! signatures from any eligible key (active, or retiring within its grace
//! window), which is what makes rotation non-disruptive: tokens signed
//! moments before a rotation stay valid for the full overlap period.
//!
//! Signature verification and expiry enforcement are separate steps so the
//! caller can tell a forged token apart from a genuinely expired one, and
//! so introspection-style callers can inspect expired-but-authentic tokens.

use crate::crypto;
use crate::errors::KrError;
use crate::observability::metrics::{record_token_issuance, record_token_validation};
use crate::observability::ErrorCategory;
use crate::store::KeyStore;
use common::clock::Clock;
use common::secret::ExposeSecret;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Signs tokens with the current active key.
pub struct TokenIssuer {
    store: Arc<KeyStore>,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(store: Arc<KeyStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Issue a signed token carrying the given claims plus `iat`/`exp`.
    ///
    /// The signing key's id is embedded in the token header so validators
    /// can try the right key first. Returns [`KrError::NoActiveKey`] if
    /// called before bootstrap, which is a startup-ordering bug in the
    /// embedding application.
    #[instrument(skip_all)]
    pub fn issue(
        &self,
        claims: Map<String, Value>,
        lifetime: std::time::Duration,
    ) -> Result<String, KrError> {
        let start = Instant::now();
        let result = self.issue_inner(claims, lifetime);
        match &result {
            Ok(_) => record_token_issuance("success", start.elapsed()),
            Err(e) => {
                warn!(error = %e, "Token issuance failed");
                record_token_issuance("error", start.elapsed());
            }
        }
        result
    }

    fn issue_inner(
        &self,
        mut claims: Map<String, Value>,
        lifetime: std::time::Duration,
    ) -> Result<String, KrError> {
        let active = self.store.get_active()?;

        let now = self.clock.now().timestamp();
        let lifetime_secs = i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX);
        claims.insert("iat".to_string(), Value::from(now));
        claims.insert("exp".to_string(), Value::from(now.saturating_add(lifetime_secs)));

        let token = crypto::sign_jwt(
            &claims,
            active.private_key_pkcs8.expose_secret(),
            &active.key_id,
        )?;

        debug!(key_id = %active.key_id, "Issued token");
        Ok(token)
    }
}

/// Verifies tokens against every eligible key.
pub struct TokenValidator {
    store: Arc<KeyStore>,
    clock: Arc<dyn Clock>,
}

impl TokenValidator {
    #[must_use]
    pub fn new(store: Arc<KeyStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Validate a token's signature and, when `check_expiry` is set, its
    /// `exp` claim. Returns the verified claims on success.
    ///
    /// Errors distinguish the failure mode: [`KrError::SignatureInvalid`]
    /// when no eligible key verifies the token, [`KrError::TokenExpired`]
    /// when the signature is authentic but the token has lapsed.
    #[instrument(skip_all)]
    pub fn validate(&self, token: &str, check_expiry: bool) -> Result<Map<String, Value>, KrError> {
        let result = self.validate_inner(token, check_expiry);
        match &result {
            Ok(_) => record_token_validation("success", None),
            Err(e) => record_token_validation("error", Some(ErrorCategory::from(e).as_str())),
        }
        result
    }

    fn validate_inner(
        &self,
        token: &str,
        check_expiry: bool,
    ) -> Result<Map<String, Value>, KrError> {
        if token.len() > crypto::MAX_JWT_SIZE_BYTES {
            return Err(KrError::InvalidToken(format!(
                "token exceeds maximum size of {} bytes",
                crypto::MAX_JWT_SIZE_BYTES
            )));
        }

        let now = self.clock.now();
        let eligible = self.store.eligible_for_validation(now);
        if eligible.is_empty() {
            // Validation before bootstrap is a startup-ordering bug.
            return Err(KrError::NoActiveKey);
        }

        // The `kid` header is a routing hint only: try the named key first,
        // then fall back to the full eligible set. A forged or stale header
        // therefore degrades to the normal multi-key check, never to a
        // different trust decision.
        let hinted = crypto::extract_jwt_kid(token);
        let ordered = eligible.iter().filter(|k| {
            hinted
                .as_deref()
                .is_some_and(|kid| kid == k.key_id)
        });
        let rest = eligible.iter().filter(|k| {
            !hinted
                .as_deref()
                .is_some_and(|kid| kid == k.key_id)
        });

        for key in ordered.chain(rest) {
            let claims = match crypto::verify_jwt_signature(token, &key.public_key_pem) {
                Ok(claims) => claims,
                Err(_) => continue,
            };

            if check_expiry {
                match claims.get("exp").and_then(Value::as_i64) {
                    Some(exp) if exp <= now.timestamp() => {
                        debug!(key_id = %key.key_id, "Token signature valid but expired");
                        return Err(KrError::TokenExpired {
                            expired_at: exp,
                            verified_by: key.key_id.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        return Err(KrError::InvalidToken("missing exp claim".to_string()));
                    }
                }
            }

            debug!(key_id = %key.key_id, "Token validated");
            return Ok(claims);
        }

        Err(KrError::SignatureInvalid)
    }
}
