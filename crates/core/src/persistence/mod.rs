//! Local Persistence
//!
//! Best-effort snapshots of the cart in client-side storage so it survives
//! restarts and network outages.

use std::{
    collections::HashMap,
    io,
    sync::{Arc, Mutex, PoisonError},
};

use jiff::Timestamp;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cart::{CartAction, CartState, reduce};

pub mod schema;

/// Storage key the cart snapshot lives under.
pub const CART_STORAGE_KEY: &str = "cart";

/// Client storage and snapshot failures.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store failed.
    #[error("storage I/O error")]
    Io(#[from] io::Error),

    /// The cart could not be encoded.
    #[error("failed to serialize cart snapshot")]
    Serialize(#[source] serde_json::Error),

    /// The stored payload is not a cart snapshot.
    #[error("failed to parse cart snapshot")]
    Deserialize(#[source] serde_json::Error),

    /// Written by a newer build.
    #[error("unsupported cart snapshot schema version {0}")]
    UnsupportedVersion(u64),

    /// Parsed, but breaks a cart invariant. Also used for unusable keys.
    #[error("invalid cart snapshot: {0}")]
    Invalid(String),
}

/// Durable key/value storage on the client, in the spirit of `localStorage`.
pub trait ClientStorage: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-local storage, mostly useful for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        entries.insert(key.to_string(), value.to_string());

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        entries.remove(key);

        Ok(())
    }
}

/// Local Persistence Adapter
#[derive(Clone)]
pub struct LocalPersistence {
    storage: Arc<dyn ClientStorage>,
    key: String,
}

impl std::fmt::Debug for LocalPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPersistence")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl LocalPersistence {
    /// Persist under the default [`CART_STORAGE_KEY`].
    #[must_use]
    pub fn new(storage: Arc<dyn ClientStorage>) -> Self {
        Self::with_key(storage, CART_STORAGE_KEY)
    }

    /// Persist under a custom key, e.g. one per storefront.
    #[must_use]
    pub fn with_key(storage: Arc<dyn ClientStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Snapshot `state`. Failures are logged and swallowed.
    pub fn save(&self, state: &CartState) {
        if let Err(error) = self.try_save(state, Timestamp::now()) {
            warn!(key = %self.key, %error, "failed to persist cart snapshot");
        }
    }

    /// Snapshot `state`, stamping it with `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing the snapshot fails.
    pub fn try_save(&self, state: &CartState, updated_at: Timestamp) -> Result<(), StorageError> {
        let raw = schema::encode(state, updated_at)?;

        self.storage.set(&self.key, &raw)
    }

    /// Load the last snapshot, or an empty cart if there is none or it
    /// cannot be used.
    pub fn load(&self) -> CartState {
        match self.try_load() {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!(key = %self.key, "no stored cart snapshot");
                CartState::default()
            }
            Err(error) => {
                warn!(key = %self.key, %error, "discarding unusable cart snapshot");
                CartState::default()
            }
        }
    }

    /// Load the last snapshot, reporting why it could not be used.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or decoding the snapshot fails.
    pub fn try_load(&self) -> Result<Option<CartState>, StorageError> {
        let Some(raw) = self.storage.get(&self.key)? else {
            return Ok(None);
        };

        let snapshot = schema::decode(&raw)?;

        Ok(Some(reduce(
            &CartState::default(),
            CartAction::ReplaceWithSnapshot(snapshot),
        )))
    }

    /// Remove the stored snapshot. Failures are logged and swallowed.
    pub fn clear(&self) {
        if let Err(error) = self.storage.remove(&self.key) {
            warn!(key = %self.key, %error, "failed to remove cart snapshot");
        }
    }
}
