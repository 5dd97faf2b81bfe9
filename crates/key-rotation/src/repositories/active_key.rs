use crate::errors::KrError;
use std::sync::{Mutex, PoisonError};

/// Opaque key/value seam for recording the currently active key id.
///
/// Backed by whatever secret/key store the embedding application provides.
/// Writes are best-effort from the rotation controller's perspective: a
/// failed write is logged and never blocks a rotation. Private key material
/// never crosses this boundary.
pub trait ActiveKeyRepository: Send + Sync {
    /// The key id recorded by a previous process lifetime, if any.
    fn load_active_key_id(&self) -> Result<Option<String>, KrError>;

    /// Record the key id that just became active.
    fn store_active_key_id(&self, key_id: &str) -> Result<(), KrError>;
}

/// In-memory implementation for tests and embedders without an external
/// store.
#[derive(Default)]
pub struct InMemoryActiveKeyRepository {
    recorded: Mutex<Option<String>>,
}

impl InMemoryActiveKeyRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed a recorded key id, as if a previous process had run.
    #[must_use]
    pub fn with_recorded(key_id: &str) -> Self {
        Self {
            recorded: Mutex::new(Some(key_id.to_string())),
        }
    }
}

impl ActiveKeyRepository for InMemoryActiveKeyRepository {
    fn load_active_key_id(&self) -> Result<Option<String>, KrError> {
        Ok(self
            .recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn store_active_key_id(&self, key_id: &str) -> Result<(), KrError> {
        *self.recorded.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(key_id.to_string());
        Ok(())
    }
}
