//! Core library for Courtbook - a sports-facility booking client.
//!
//! The UI layers (mobile app, web admin) sit on top of three components:
//!
//! - [`auth::CredentialStore`]: redundant persistent storage of the bearer
//!   token, with write-verify-retry and backup-slot fallback
//! - [`api::ApiClient`]: the request gateway; reads the token from the
//!   store and attaches it to every outbound request
//! - [`auth::SessionManager`]: the login/logout state machine, owner of the
//!   persisted user profile and the forced-logout path
//!
//! Wiring for a typical client:
//!
//! ```no_run
//! use std::sync::Arc;
//! use courtbook_core::{
//!     ApiClient, Config, CredentialStore, FileStorage, SessionManager, TokenExpiryHook,
//! };
//!
//! # async fn wire() -> anyhow::Result<()> {
//! let storage: Arc<dyn courtbook_core::SlotStorage> =
//!     Arc::new(FileStorage::new(Config::storage_path()?));
//! let credentials = CredentialStore::new(storage.clone());
//! let api = Arc::new(ApiClient::new(credentials.clone())?);
//!
//! let session = Arc::new(SessionManager::new(api, credentials, storage));
//! session.restore().await;
//!
//! let expiry = TokenExpiryHook::new();
//! session.register_expiry(&expiry);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod storage;

pub use api::{ApiClient, ApiError, AuthApi, LoginResponse};
pub use auth::{CredentialStore, SessionError, SessionManager, SessionState, TokenExpiryHook};
pub use config::Config;
pub use models::UserProfile;
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, SlotStorage};
