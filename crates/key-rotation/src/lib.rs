//! Keyloft Key Rotation Library
//!
//! This library manages the lifecycle of JWT signing keys: generation,
//! atomic rotation, overlap-window validation, and public key (JWKS)
//! export. It keeps token issuance and validation working across key
//! rotations without service interruption.
//!
//! # Modules
//!
//! - `config` - Rotation configuration
//! - `crypto` - Cryptographic operations (key generation, JWT signing)
//! - `errors` - Error types
//! - `models` - Key records and wire models
//! - `repositories` - External key-id recording
//! - `services` - Rotation control, token issuance/validation, JWKS export
//! - `store` - Concurrency-safe in-memory key set

pub mod config;
pub mod crypto;
pub mod errors;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod services;
pub mod store;
