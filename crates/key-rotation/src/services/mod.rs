//! Service layer: rotation control, token issuance/validation, JWKS export.

pub mod jwks_service;
pub mod rotation_service;
pub mod token_service;
