use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user account as the server describes it.
///
/// Only `id` and `email` are assumed; everything else the server sends
/// (display name, owned facilities, roles, ...) rides along in `extra`
/// untouched, so the client never has to chase server-side schema changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Persisted form of a profile, stamped with when it was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredProfile {
    pub profile: UserProfile,
    pub stored_at: DateTime<Utc>,
}

impl StoredProfile {
    pub fn new(profile: UserProfile) -> Self {
        Self {
            profile,
            stored_at: Utc::now(),
        }
    }
}
