//! Media storage port - where uploaded post images live.

use async_trait::async_trait;

/// Storage backend for uploaded files.
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Store `data` under `key`, or under a derived key when `key` is taken.
    /// Returns the key actually used.
    async fn save(&self, key: &str, data: &[u8]) -> Result<String, StorageError>;

    /// Read a stored file. `Ok(None)` when the key is unknown or unsafe.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Remove a stored file. Missing files are not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Public URL for a key.
    fn url(&self, key: &str) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("I/O failure: {0}")]
    Io(String),
}
