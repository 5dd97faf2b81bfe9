//! Persistence seams toward external collaborators.
//!
//! The subsystem keeps all key material in memory; the only thing that
//! crosses this boundary is the active key id, recorded in an external
//! key/value store so restarts can be correlated with the key history.

mod active_key;

pub use active_key::{ActiveKeyRepository, InMemoryActiveKeyRepository};
