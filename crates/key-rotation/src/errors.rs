use thiserror::Error;

/// Errors surfaced by the key rotation subsystem.
///
/// The validation variants are deliberately split: `SignatureInvalid` means
/// no eligible key verified the token, while `TokenExpired` means some
/// eligible key verified the signature and the token's own `exp` claim has
/// passed. Callers reject the token either way when expiry enforcement is
/// on, but the distinction matters for diagnostics.
#[derive(Debug, Error)]
pub enum KrError {
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("No active signing key (bootstrap has not run)")]
    NoActiveKey,

    #[error("No standby key available for promotion")]
    NoStandbyKey,

    #[error("A standby key already exists: {key_id}")]
    StandbyAlreadyExists { key_id: String },

    #[error("Token signature did not verify against any eligible key")]
    SignatureInvalid,

    #[error("Token expired at {expired_at} (signature verified by key {verified_by})")]
    TokenExpired { expired_at: i64, verified_by: String },

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}
