//! `SessionStorage` trait: session-scoped key/value blobs.
//!
//! Models the browser's session storage: string values under string keys,
//! living for one session. The wizard writes one sanitized JSON snapshot
//! here on every mutation and reads it back once at construction.

use async_trait::async_trait;

use crate::error::StorageError;

/// Backend-agnostic session storage.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing anything already there.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}
