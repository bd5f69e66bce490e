use tracing::debug;

use crate::error::SessionStoreError;
use crate::storage::{MemorySessionStorage, SessionStorage};

/// Sole owner of the conversation session id.
///
/// The in-memory copy is authoritative for the running process. Storage is
/// written through on every change, so a failed write leaves the id usable
/// for this process but not persisted.
#[derive(Debug)]
pub struct SessionCorrelator {
    current: Option<String>,
    storage: Box<dyn SessionStorage>,
}

impl Default for SessionCorrelator {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl SessionCorrelator {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            current: None,
            storage: Box::new(MemorySessionStorage::default()),
        }
    }

    /// Use `storage`, seeding the current id from whatever it holds.
    pub fn open(storage: impl SessionStorage + 'static) -> Result<Self, SessionStoreError> {
        let current = storage.load()?;
        if let Some(session_id) = current.as_deref() {
            debug!(session_id, "restored persisted session id");
        }
        Ok(Self {
            current,
            storage: Box::new(storage),
        })
    }

    #[must_use]
    pub fn get(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn set(&mut self, session_id: &str) -> Result<(), SessionStoreError> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(SessionStoreError::BlankSessionId);
        }
        if self.current.as_deref() == Some(session_id) {
            return Ok(());
        }

        self.current = Some(session_id.to_owned());
        debug!(session_id, "storing session id");
        self.storage.store(session_id)
    }

    pub fn clear(&mut self) -> Result<(), SessionStoreError> {
        self.current = None;
        self.storage.remove()
    }

    /// Session id for an outgoing request: an explicit, non-blank id wins,
    /// then the stored id, then none.
    #[must_use]
    pub fn resolve(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .or(self.get())
            .map(ToOwned::to_owned)
    }
}
