//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate with Keyloft-specific
//! guidance. Use these types for all sensitive values like private key
//! material, tokens, and API keys.
//!
//! # Compile-Time Safety
//!
//! The key insight is that `SecretBox<T>` and `SecretString` implement `Debug`
//! with redaction, so any code that derives `Debug` on a struct containing secrets
//! will automatically get safe logging behavior. This makes it **impossible** to
//! accidentally log secrets via `{:?}` or tracing.
//!
//! # Memory Safety
//!
//! Secrets are automatically zeroized when dropped, preventing sensitive
//! data from lingering in memory after use.
//!
//! # Example
//!
//! ```rust
//! use common::secret::SecretBox;
//! use secrecy::ExposeSecret;
//!
//! #[derive(Debug)]
//! struct SigningMaterial {
//!     key_id: String,
//!     private_key: SecretBox<Vec<u8>>,  // Safe: Debug shows "[REDACTED]"
//! }
//!
//! let material = SigningMaterial {
//!     key_id: "2f1c...".to_string(),
//!     private_key: SecretBox::new(Box::new(vec![0u8; 32])),
//! };
//!
//! // This is safe - the private key is redacted
//! println!("{:?}", material);
//!
//! // To access the actual bytes, you must explicitly call expose_secret()
//! let raw: &[u8] = material.private_key.expose_secret();
//! # let _ = raw;
//! ```
//!
//! # Keyloft Usage Guidelines
//!
//! Use `SecretBox<Vec<u8>>` for:
//! - Private signing key material (PKCS#8 documents)
//! - Binary encryption keys
//!
//! Use `SecretString` for:
//! - Bearer tokens held longer than a single call
//! - API keys and credentials for external collaborators
//!
//! # Serde Integration
//!
//! With the `serde` feature enabled, secrets can be deserialized from JSON,
//! e.g. credentials for the external store that records the active key id:
//!
//! ```rust
//! use serde::Deserialize;
//! use common::secret::SecretString;
//!
//! #[derive(Debug, Deserialize)]
//! struct SecretStoreConfig {
//!     endpoint: String,
//!     access_token: SecretString,
//! }
//!
//! let json = r#"{"endpoint": "https://vault.internal:8200", "access_token": "s.kv9x"}"#;
//! let config: SecretStoreConfig = serde_json::from_str(json).unwrap();
//!
//! // Debug output is safe
//! println!("{:?}", config);
//! // endpoint is visible, access_token is redacted
//! ```

// Re-export the main types from secrecy
pub use secrecy::{ExposeSecret, SecretBox, SecretString};
