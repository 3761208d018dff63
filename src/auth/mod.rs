//! Authentication module: credential storage and the session lifecycle.
//!
//! This module provides:
//! - `CredentialStore`: redundant persistent storage for the bearer token
//! - `SessionManager`: the anonymous/authenticated state machine
//! - `TokenExpiryHook`: the single registration point for forced logout
//!
//! Tokens are opaque bearer strings; nothing here decodes or validates them
//! client-side.

pub mod credentials;
pub mod expiry;
pub mod session;

pub use credentials::CredentialStore;
pub use expiry::{ExpiryHandler, TokenExpiryHook};
pub use session::{SessionError, SessionManager, SessionState};
