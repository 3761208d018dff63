//! Domain records shared across the client.

pub mod user;

pub use user::{StoredProfile, UserProfile};
