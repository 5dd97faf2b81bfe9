use crate::errors::KrError;
use base64::{engine::general_purpose, Engine as _};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::{
    rand::SystemRandom,
    signature::{Ed25519KeyPair, KeyPair},
};
use serde_json::{Map, Value};
use tracing::instrument;
use uuid::Uuid;

/// Maximum allowed JWT size in bytes (4KB).
///
/// Tokens larger than this are rejected before any base64 decoding or
/// signature work. Typical tokens here are 300-500 bytes; the cap leaves
/// headroom for claim growth while bounding the work an oversized token
/// can force on the validator.
pub const MAX_JWT_SIZE_BYTES: usize = 4096;

/// Algorithm tag carried by every key this subsystem generates.
pub const SIGNING_ALGORITHM: &str = "EdDSA";

/// Generate a fresh random key identifier.
///
/// Key ids are public (they appear in token headers and in the JWKS), so a
/// random v4 UUID is sufficient; uniqueness is what matters.
#[must_use]
pub fn generate_key_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate an EdDSA (Ed25519) keypair using a CSPRNG.
///
/// Returns (public_key_pem, private_key_pkcs8).
#[instrument(skip_all)]
pub fn generate_signing_key() -> Result<(String, Vec<u8>), KrError> {
    let rng = SystemRandom::new();

    // Generate Ed25519 keypair in PKCS8 format
    let pkcs8_bytes = Ed25519KeyPair::generate_pkcs8(&rng)
        .map_err(|e| KrError::Crypto(format!("Keypair generation failed: {}", e)))?;

    let key_pair = Ed25519KeyPair::from_pkcs8(pkcs8_bytes.as_ref())
        .map_err(|e| KrError::Crypto(format!("Keypair parsing failed: {}", e)))?;

    let public_key_bytes = key_pair.public_key().as_ref();

    // Public key in PEM format (base64 encoded)
    let public_key_pem = format!(
        "-----BEGIN PUBLIC KEY-----\n{}\n-----END PUBLIC KEY-----",
        general_purpose::STANDARD.encode(public_key_bytes)
    );

    Ok((public_key_pem, pkcs8_bytes.as_ref().to_vec()))
}

/// Sign a claim set with an EdDSA private key, embedding `kid` in the header.
///
/// The claim set is opaque to this layer; temporal claims are the issuer's
/// responsibility.
#[instrument(skip_all)]
pub fn sign_jwt(
    claims: &Map<String, Value>,
    private_key_pkcs8: &[u8],
    key_id: &str,
) -> Result<String, KrError> {
    // Validate the private key format before handing it to jsonwebtoken
    let _key_pair = Ed25519KeyPair::from_pkcs8(private_key_pkcs8)
        .map_err(|e| KrError::Crypto(format!("Invalid private key format: {}", e)))?;

    let encoding_key = EncodingKey::from_ed_der(private_key_pkcs8);

    let mut header = Header::new(Algorithm::EdDSA);
    header.typ = Some("JWT".to_string());
    header.kid = Some(key_id.to_string());

    let token = encode(&header, claims, &encoding_key)
        .map_err(|e| KrError::Crypto(format!("JWT signing operation failed: {}", e)))?;

    Ok(token)
}

/// Extract the `kid` (key ID) from a JWT header without verifying the signature.
///
/// Used by the validator to try the token's named key before scanning the
/// rest of the eligible set.
///
/// Returns `None` if:
/// - Token is oversized or malformed (not valid JWT format)
/// - Header doesn't contain a `kid` field
/// - `kid` field is not a string
///
/// SECURITY NOTE: This function does NOT validate the token. It only extracts
/// the `kid` claim for key lookup. The token MUST still be verified against
/// the eligible key set.
#[instrument(skip_all)]
pub fn extract_jwt_kid(token: &str) -> Option<String> {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    if token.len() > MAX_JWT_SIZE_BYTES {
        return None;
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    let header_bytes = URL_SAFE_NO_PAD.decode(parts.first()?).ok()?;
    let header: Value = serde_json::from_slice(&header_bytes).ok()?;

    header.get("kid")?.as_str().map(|s| s.to_string())
}

/// Verify a JWT's signature with an EdDSA public key, without enforcing
/// temporal claims.
///
/// Expiry is deliberately NOT checked here: the validator enforces it
/// separately so it can report "signature valid but expired" distinctly
/// from "signature invalid for every eligible key".
///
/// The size check runs before any parsing or cryptographic operations.
#[instrument(skip_all)]
pub fn verify_jwt_signature(
    token: &str,
    public_key_pem: &str,
) -> Result<Map<String, Value>, KrError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "crypto",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(KrError::InvalidToken(
            "Token exceeds maximum allowed size".to_string(),
        ));
    }

    // Extract base64 from PEM format
    let public_key_b64 = public_key_pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect::<String>();

    let public_key_bytes = general_purpose::STANDARD
        .decode(&public_key_b64)
        .map_err(|e| {
            tracing::debug!(target: "crypto", error = %e, "Invalid public key encoding");
            KrError::Crypto("Invalid public key encoding".to_string())
        })?;

    let decoding_key = DecodingKey::from_ed_der(&public_key_bytes);

    let mut validation = Validation::new(Algorithm::EdDSA);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = std::collections::HashSet::new();

    let token_data =
        decode::<Map<String, Value>>(token, &decoding_key, &validation).map_err(|e| {
            tracing::debug!(target: "crypto", error = %e, "Token signature verification failed");
            KrError::SignatureInvalid
        })?;

    Ok(token_data.claims)
}
