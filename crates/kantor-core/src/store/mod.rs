//! Durable key/value storage for the session credential.
//!
//! This module provides the `CredentialStore` trait and its backends:
//! - `FileStore`: JSON document in the cache directory
//! - `KeychainStore`: OS keychain via keyring
//! - `MemoryStore`: process-local map, lost on exit
//!
//! Stores hold opaque strings and apply no policy. The session controller
//! is the only component that writes to them.

pub mod file;
pub mod keychain;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use file::FileStore;
pub use keychain::KeychainStore;
pub use memory::MemoryStore;

/// Key under which the bearer token is persisted
pub const TOKEN_KEY: &str = "@currency_exchange_token";

/// Key under which the serialized user profile is persisted
pub const USER_KEY: &str = "@currency_exchange_user";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage document is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Keychain access failed: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Asynchronous key/value persistence surviving process restarts.
///
/// Removing a key that is not present is not an error.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn remove(&self, keys: &[&str]) -> Result<(), StorageError>;
}
