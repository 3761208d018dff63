//! REST API gateway for the Courtbook backend.
//!
//! `ApiClient` attaches the stored bearer token to every outbound request;
//! it never decides that a token is expired. Code that observes a 401
//! response is expected to notify the `TokenExpiryHook` in `crate::auth`.

pub mod client;
pub mod error;

pub use client::{ApiClient, AuthApi, LoginResponse, DEFAULT_BASE_URL};
pub use error::ApiError;
