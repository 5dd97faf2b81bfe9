//! Observability for the key rotation subsystem.
//!
//! # Privacy by Default
//!
//! All instrumentation uses `#[instrument(skip_all)]` and explicit safe
//! field allow-listing. Fields are categorized as:
//! - **SAFE**: key ids, key states, outcome enums
//! - **NEVER**: private key material, token contents, claim values
//!
//! The subsystem emits counters/gauges through the `metrics` facade only;
//! it never owns a metrics backend.

pub mod metrics;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with JSON structured logging.
///
/// Intended for binaries embedding this library; call once at startup.
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "key_rotation=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Error categories for metrics labels (bounded cardinality).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// No usable key (pre-bootstrap ordering bugs)
    NotFound,
    /// Signature verified but the token's own expiry has passed
    Expired,
    /// No eligible key verified the signature
    Signature,
    /// Internal errors (crypto failures, malformed input)
    Internal,
}

impl ErrorCategory {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Expired => "expired",
            ErrorCategory::Signature => "signature",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl From<&crate::errors::KrError> for ErrorCategory {
    fn from(err: &crate::errors::KrError) -> Self {
        use crate::errors::KrError;
        match err {
            KrError::NoActiveKey | KrError::NoStandbyKey => ErrorCategory::NotFound,
            KrError::TokenExpired { .. } => ErrorCategory::Expired,
            KrError::SignatureInvalid => ErrorCategory::Signature,
            KrError::Crypto(_)
            | KrError::InvalidToken(_)
            | KrError::StandbyAlreadyExists { .. } => ErrorCategory::Internal,
        }
    }
}
