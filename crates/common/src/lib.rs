//! Common utilities shared across Keyloft components.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for the injectable wall-clock abstraction
pub mod clock;
