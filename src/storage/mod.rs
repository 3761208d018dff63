//! Persistent key-value storage backends for credentials and session data.
//!
//! This module provides:
//! - `SlotStorage`: the trait the credential and session layers persist through
//! - `FileStorage`: a JSON-file backend for platforms without a keychain
//! - `KeyringStorage`: OS-level secure storage via keyring
//! - `MemoryStorage`: an in-process backend for tests and ephemeral sessions
//!
//! Backends are injected as `Arc<dyn SlotStorage>` so callers can swap the
//! physical store without touching the lifecycle code above it.

pub mod file;
pub mod keychain;

pub use file::FileStorage;
pub use keychain::KeyringStorage;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;

/// A durable string-keyed slot store.
///
/// Operations are short blocking I/O and may be called from async contexts.
/// Deleting an absent key is not an error on any backend.
pub trait SlotStorage: Send + Sync {
    /// Read a slot, `None` if it has never been written or was deleted.
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Write a slot, replacing any previous value.
    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a slot.
    fn delete(&self, key: &str) -> Result<()>;
}

/// In-memory slot store. Sessions backed by it last exactly as long as the
/// process; it is also the substrate the test suite runs against.
#[derive(Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SlotStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}
