//! Redundant persistent storage for the bearer token.
//!
//! The token lives in two slots (primary plus backup) so a partial write
//! failure in either slot does not log the user out across a restart.
//! Writes are verified by reading the primary slot back; reads fall back to
//! the backup slot and repair the primary from it. Nothing in here returns
//! an error: failures degrade to `false` / `None` and are logged.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};

use crate::storage::SlotStorage;

/// Primary token slot. Key strings are stable across app versions so an
/// upgrade never drops a live session.
pub(crate) const TOKEN_KEY: &str = "auth_token";

/// Backup token slot.
pub(crate) const TOKEN_BACKUP_KEY: &str = "auth_token_backup";

/// Attempt ceiling for writes and removals. Reads are never retried.
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Fixed delay between attempts. Deliberately not exponential: storage
/// hiccups here are brief filesystem/keychain stalls, and the caller is a
/// foreground login flow.
const RETRY_DELAY_MS: u64 = 100;

/// Durable, redundant storage for the bearer token.
///
/// Cheap to clone; clones share the underlying storage handle.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn SlotStorage>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn SlotStorage>) -> Self {
        Self { storage }
    }

    /// Write the token to both slots and verify the primary read-back,
    /// retrying up to the attempt budget.
    ///
    /// Returns `true` only for a verified write. `false` means the token may
    /// not survive a restart; it does not mean the login failed, and callers
    /// should proceed with the in-memory session regardless.
    pub async fn set_token(&self, token: &str) -> bool {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            match self.write_and_verify(token) {
                Ok(true) => return true,
                Ok(false) => {
                    warn!(attempt, "token write verification mismatch");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "token write failed");
                }
            }
            if attempt < MAX_WRITE_ATTEMPTS {
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
            }
        }
        warn!("token not durably stored after {} attempts", MAX_WRITE_ATTEMPTS);
        false
    }

    fn write_and_verify(&self, token: &str) -> Result<bool> {
        self.storage.write(TOKEN_KEY, token)?;
        self.storage.write(TOKEN_BACKUP_KEY, token)?;
        let read_back = self.storage.read(TOKEN_KEY)?;
        Ok(read_back.as_deref() == Some(token))
    }

    /// Current token, if any.
    ///
    /// Falls back to the backup slot when the primary is empty and repairs
    /// the primary from it. Any storage error means `None`.
    pub async fn get_token(&self) -> Option<String> {
        match self.read_with_fallback() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "token read failed");
                None
            }
        }
    }

    fn read_with_fallback(&self) -> Result<Option<String>> {
        if let Some(token) = self.storage.read(TOKEN_KEY)? {
            return Ok(Some(token));
        }
        if let Some(token) = self.storage.read(TOKEN_BACKUP_KEY)? {
            debug!("primary token slot empty, restoring from backup");
            if let Err(e) = self.storage.write(TOKEN_KEY, &token) {
                warn!(error = %e, "failed to repair primary token slot");
            }
            return Ok(Some(token));
        }
        Ok(None)
    }

    /// Delete both token slots.
    ///
    /// A failed delete of either slot retries both together up to the
    /// attempt budget; after that the slots may be left inconsistent and a
    /// later `get_token` can still find a value. Callers treat removal as
    /// best-effort.
    pub async fn remove_token(&self) {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let primary = self.storage.delete(TOKEN_KEY);
            let backup = self.storage.delete(TOKEN_BACKUP_KEY);
            match (&primary, &backup) {
                (Ok(()), Ok(())) => return,
                _ => {
                    warn!(
                        attempt,
                        primary_ok = primary.is_ok(),
                        backup_ok = backup.is_ok(),
                        "token slot removal failed"
                    );
                }
            }
            if attempt < MAX_WRITE_ATTEMPTS {
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
            }
        }
        warn!("giving up on token slot removal after {} attempts", MAX_WRITE_ATTEMPTS);
    }
}
