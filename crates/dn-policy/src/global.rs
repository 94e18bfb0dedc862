//! Node-global default policy accessors.
//!
//! The global default policy lives in a small external key-value store
//! owned by the node configuration layer; the engine reads and writes it
//! through this trait only.

use thiserror::Error;

/// Failure talking to the global-policy backing store.
#[derive(Debug, Error)]
pub enum GlobalPolicyError {
    /// The backing store could not be read or written.
    #[error("global policy store unavailable")]
    Unavailable,
}

/// Access to the node-global default policy text.
pub trait GlobalPolicyStore: Send + Sync {
    /// Reads the global policy text; empty string when none is set.
    ///
    /// ## Errors
    ///
    /// Returns [`GlobalPolicyError::Unavailable`] when the store cannot be
    /// read.
    fn read_global(&self) -> Result<String, GlobalPolicyError>;

    /// Replaces the global policy text.
    ///
    /// ## Errors
    ///
    /// Returns [`GlobalPolicyError::Unavailable`] when the store cannot be
    /// written.
    fn write_global(&self, text: &str) -> Result<(), GlobalPolicyError>;
}

/// File-backed store: one text file holding the policy line.
#[derive(Debug, Clone)]
pub struct FileGlobalPolicyStore {
    path: std::path::PathBuf,
}

impl FileGlobalPolicyStore {
    /// Creates a store over `path`.
    #[must_use]
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl GlobalPolicyStore for FileGlobalPolicyStore {
    fn read_global(&self) -> Result<String, GlobalPolicyError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(text.trim().to_string()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(_) => Err(GlobalPolicyError::Unavailable),
        }
    }

    fn write_global(&self, text: &str) -> Result<(), GlobalPolicyError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|_| GlobalPolicyError::Unavailable)?;
        }
        std::fs::write(&self.path, text.trim()).map_err(|_| GlobalPolicyError::Unavailable)
    }
}

/// In-memory store for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryGlobalPolicyStore {
    text: parking_lot::RwLock<String>,
}

impl MemoryGlobalPolicyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with policy text.
    #[must_use]
    pub fn with_policy(text: &str) -> Self {
        Self {
            text: parking_lot::RwLock::new(text.to_string()),
        }
    }
}

impl GlobalPolicyStore for MemoryGlobalPolicyStore {
    fn read_global(&self) -> Result<String, GlobalPolicyError> {
        Ok(self.text.read().clone())
    }

    fn write_global(&self, text: &str) -> Result<(), GlobalPolicyError> {
        *self.text.write() = text.to_string();
        Ok(())
    }
}
