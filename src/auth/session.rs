//! Session state machine: the authoritative in-process view of who is
//! logged in.
//!
//! `SessionManager` is the only writer of session state transitions. It
//! persists the resolved profile separately from the token; the two are not
//! kept transactionally consistent, and restoration treats anything short
//! of both being readable as an anonymous start.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::{debug, warn};

use crate::api::{ApiError, AuthApi};
use crate::models::{StoredProfile, UserProfile};
use crate::storage::SlotStorage;

use super::credentials::CredentialStore;
use super::expiry::{ExpiryHandler, TokenExpiryHook};

/// Storage slot for the serialized profile. Stable across app versions.
const PROFILE_KEY: &str = "user_profile";

/// Storage slot for the bare user id, kept separately for layers that only
/// need the id without parsing the whole profile.
const USER_ID_KEY: &str = "user_id";

/// Coarse session state. `ExpiringOut` is transient: it is observable while
/// logout teardown is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Process started, persisted state not read yet.
    Uninitialized,
    /// No valid token held.
    Anonymous,
    /// Token and profile held.
    Authenticated(UserProfile),
    /// Expiry signal received or logout requested; teardown in progress.
    ExpiringOut,
}

#[derive(Error, Debug)]
pub enum SessionError {
    /// The server answered the login without both a token and a profile.
    #[error("Login response was missing a token or user profile")]
    LoginRejected,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Failed to persist user profile: {0}")]
    ProfileStorage(#[source] anyhow::Error),
}

/// Owns the login/logout state machine and the persisted profile.
pub struct SessionManager {
    api: Arc<dyn AuthApi>,
    credentials: CredentialStore,
    storage: Arc<dyn SlotStorage>,
    state: RwLock<SessionState>,
}

impl SessionManager {
    /// `credentials` and `storage` normally share the same backend; they are
    /// separate parameters because token and profile persistence are
    /// independent (and independently allowed to fail).
    pub fn new(
        api: Arc<dyn AuthApi>,
        credentials: CredentialStore,
        storage: Arc<dyn SlotStorage>,
    ) -> Self {
        Self {
            api,
            credentials,
            storage,
            state: RwLock::new(SessionState::Uninitialized),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> SessionState {
        self.read_state().clone()
    }

    /// True until [`restore`](Self::restore) has resolved the startup read.
    pub fn is_loading(&self) -> bool {
        matches!(*self.read_state(), SessionState::Uninitialized)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.read_state(), SessionState::Authenticated(_))
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        match &*self.read_state() {
            SessionState::Authenticated(profile) => Some(profile.clone()),
            _ => None,
        }
    }

    /// Restore a persisted session on startup.
    ///
    /// Resolves to `Authenticated` only when both a token and a readable
    /// profile are present; anything else, including every kind of storage
    /// failure, silently resolves to `Anonymous`.
    pub async fn restore(&self) {
        let token = self.credentials.get_token().await;
        let profile = self.load_stored_profile();
        let next = match (token, profile) {
            (Some(_), Some(profile)) => {
                debug!(user = %profile.id, "restored persisted session");
                SessionState::Authenticated(profile)
            }
            _ => SessionState::Anonymous,
        };
        *self.write_state() = next;
    }

    /// Authenticate against the server and establish a session.
    ///
    /// Network and server errors propagate; a success response missing the
    /// token or the profile is [`SessionError::LoginRejected`]. Either way
    /// the state stays `Anonymous` on failure. Persistence of the token and
    /// profile is best-effort: a failed write means the session will not
    /// survive a restart, not that the login failed.
    pub async fn login(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<UserProfile, SessionError> {
        let response = self.api.login(identifier, secret).await?;
        let (profile, token) = match (response.user, response.token) {
            (Some(user), Some(token)) => (user, token),
            _ => {
                warn!("login response missing user or token");
                return Err(SessionError::LoginRejected);
            }
        };

        if !self.credentials.set_token(&token).await {
            warn!("token not durably stored; session will not survive a restart");
        }
        if let Err(e) = self.persist_profile(&profile) {
            warn!(error = %e, "failed to persist user profile");
        }

        *self.write_state() = SessionState::Authenticated(profile.clone());
        Ok(profile)
    }

    /// End the session.
    ///
    /// The server is notified best-effort; local teardown (credential slots,
    /// profile slots, in-memory state) runs unconditionally afterwards. A
    /// failed notification is surfaced to the caller once teardown is done,
    /// so the UI can report it against an already-clean local state.
    pub async fn logout(&self) -> Result<(), SessionError> {
        *self.write_state() = SessionState::ExpiringOut;

        let notified = self.api.logout().await;
        if let Err(e) = &notified {
            warn!(error = %e, "logout notification failed, tearing down anyway");
        }
        self.teardown().await;

        notified.map_err(SessionError::from)
    }

    async fn teardown(&self) {
        self.credentials.remove_token().await;
        if let Err(e) = self.storage.delete(PROFILE_KEY) {
            warn!(error = %e, "failed to delete stored profile");
        }
        if let Err(e) = self.storage.delete(USER_ID_KEY) {
            warn!(error = %e, "failed to delete stored user id");
        }
        *self.write_state() = SessionState::Anonymous;
    }

    /// Persist and re-cache the profile. Never touches the token and never
    /// changes the coarse state.
    pub async fn update_profile(&self, profile: UserProfile) -> Result<(), SessionError> {
        self.persist_profile(&profile)
            .map_err(SessionError::ProfileStorage)?;

        let mut state = self.write_state();
        if matches!(*state, SessionState::Authenticated(_)) {
            *state = SessionState::Authenticated(profile);
        }
        Ok(())
    }

    /// Handler to register on a [`TokenExpiryHook`]: forces a logout,
    /// discarding the notification error.
    pub fn expiry_handler(self: &Arc<Self>) -> ExpiryHandler {
        let manager = Arc::clone(self);
        Box::new(move || {
            let manager = Arc::clone(&manager);
            Box::pin(async move {
                debug!("token expiry signalled, forcing logout");
                if let Err(e) = manager.logout().await {
                    debug!(error = %e, "forced logout completed; server notification failed");
                }
            })
        })
    }

    /// Register this manager's forced-logout handler on `hook`, replacing
    /// any previous registration.
    pub fn register_expiry(self: &Arc<Self>, hook: &TokenExpiryHook) {
        hook.set(self.expiry_handler());
    }

    fn load_stored_profile(&self) -> Option<UserProfile> {
        let raw = match self.storage.read(PROFILE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "failed to read stored profile");
                return None;
            }
        };
        match serde_json::from_str::<StoredProfile>(&raw) {
            Ok(stored) => Some(stored.profile),
            Err(e) => {
                warn!(error = %e, "stored profile is not parseable");
                None
            }
        }
    }

    fn persist_profile(&self, profile: &UserProfile) -> anyhow::Result<()> {
        let stored = StoredProfile::new(profile.clone());
        let raw = serde_json::to_string(&stored)?;
        self.storage.write(PROFILE_KEY, &raw)?;
        self.storage.write(USER_ID_KEY, &profile.id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::api::LoginResponse;
    use crate::storage::MemoryStorage;

    struct MockApi {
        login_response: Mutex<Option<LoginResponse>>,
        login_fails: AtomicBool,
        logout_fails: AtomicBool,
        login_calls: AtomicU32,
        logout_calls: AtomicU32,
    }

    impl MockApi {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                login_response: Mutex::new(None),
                login_fails: AtomicBool::new(false),
                logout_fails: AtomicBool::new(false),
                login_calls: AtomicU32::new(0),
                logout_calls: AtomicU32::new(0),
            })
        }

        fn respond_with(&self, user: Option<UserProfile>, token: Option<&str>) {
            *self.login_response.lock().unwrap() = Some(LoginResponse {
                user,
                token: token.map(String::from),
            });
        }
    }

    #[async_trait]
    impl AuthApi for MockApi {
        async fn login(&self, _identifier: &str, _secret: &str) -> Result<LoginResponse, ApiError> {
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            if self.login_fails.load(Ordering::SeqCst) {
                return Err(ApiError::Server("login exploded".to_string()));
            }
            Ok(self
                .login_response
                .lock()
                .unwrap()
                .clone()
                .expect("test did not script a login response"))
        }

        async fn logout(&self) -> Result<(), ApiError> {
            self.logout_calls.fetch_add(1, Ordering::SeqCst);
            if self.logout_fails.load(Ordering::SeqCst) {
                return Err(ApiError::Server("logout exploded".to_string()));
            }
            Ok(())
        }
    }

    fn profile(id: &str, email: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            email: email.to_string(),
            extra: serde_json::Map::new(),
        }
    }

    fn manager_over(
        api: Arc<MockApi>,
        storage: Arc<MemoryStorage>,
    ) -> Arc<SessionManager> {
        let credentials = CredentialStore::new(storage.clone());
        Arc::new(SessionManager::new(api, credentials, storage))
    }

    #[tokio::test]
    async fn starts_uninitialized_until_restored() {
        let manager = manager_over(MockApi::new(), Arc::new(MemoryStorage::new()));
        assert!(manager.is_loading());
        assert_eq!(manager.state(), SessionState::Uninitialized);

        manager.restore().await;
        assert!(!manager.is_loading());
        assert_eq!(manager.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn login_establishes_and_persists_the_session() {
        let api = MockApi::new();
        api.respond_with(Some(profile("42", "a@b.com")), Some("abc123"));
        let storage = Arc::new(MemoryStorage::new());
        let manager = manager_over(api, storage.clone());
        manager.restore().await;

        let user = manager.login("a@b.com", "secret").await.unwrap();
        assert_eq!(user.id, "42");
        assert!(manager.is_authenticated());
        assert_eq!(manager.current_user().unwrap().email, "a@b.com");

        // Token and profile were persisted separately
        let credentials = CredentialStore::new(storage.clone());
        assert_eq!(credentials.get_token().await.as_deref(), Some("abc123"));
        assert_eq!(storage.read("user_id").unwrap().as_deref(), Some("42"));
        assert!(storage.read("user_profile").unwrap().is_some());
    }

    #[tokio::test]
    async fn login_without_token_is_rejected() {
        let api = MockApi::new();
        api.respond_with(Some(profile("42", "a@b.com")), None);
        let storage = Arc::new(MemoryStorage::new());
        let manager = manager_over(api, storage.clone());
        manager.restore().await;

        let err = manager.login("a@b.com", "secret").await.unwrap_err();
        assert!(matches!(err, SessionError::LoginRejected));
        assert_eq!(manager.state(), SessionState::Anonymous);
        assert_eq!(storage.read("auth_token").unwrap(), None);
    }

    #[tokio::test]
    async fn login_without_user_is_rejected() {
        let api = MockApi::new();
        api.respond_with(None, Some("abc123"));
        let manager = manager_over(api, Arc::new(MemoryStorage::new()));
        manager.restore().await;

        let err = manager.login("a@b.com", "secret").await.unwrap_err();
        assert!(matches!(err, SessionError::LoginRejected));
        assert_eq!(manager.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn login_surfaces_server_errors() {
        let api = MockApi::new();
        api.login_fails.store(true, Ordering::SeqCst);
        let manager = manager_over(api, Arc::new(MemoryStorage::new()));
        manager.restore().await;

        let err = manager.login("a@b.com", "secret").await.unwrap_err();
        assert!(matches!(err, SessionError::Api(_)));
        assert_eq!(manager.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn logout_notifies_and_tears_down() {
        let api = MockApi::new();
        api.respond_with(Some(profile("42", "a@b.com")), Some("abc123"));
        let storage = Arc::new(MemoryStorage::new());
        let manager = manager_over(api.clone(), storage.clone());
        manager.restore().await;
        manager.login("a@b.com", "secret").await.unwrap();

        manager.logout().await.unwrap();
        assert_eq!(api.logout_calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(), SessionState::Anonymous);
        assert_eq!(storage.read("auth_token").unwrap(), None);
        assert_eq!(storage.read("auth_token_backup").unwrap(), None);
        assert_eq!(storage.read("user_profile").unwrap(), None);
        assert_eq!(storage.read("user_id").unwrap(), None);
    }

    #[tokio::test]
    async fn teardown_runs_even_when_notification_fails() {
        let api = MockApi::new();
        api.respond_with(Some(profile("42", "a@b.com")), Some("abc123"));
        let storage = Arc::new(MemoryStorage::new());
        let manager = manager_over(api.clone(), storage.clone());
        manager.restore().await;
        manager.login("a@b.com", "secret").await.unwrap();

        api.logout_fails.store(true, Ordering::SeqCst);
        let err = manager.logout().await.unwrap_err();
        assert!(matches!(err, SessionError::Api(_)));

        // Local state is clean despite the surfaced error
        assert_eq!(manager.state(), SessionState::Anonymous);
        assert_eq!(storage.read("auth_token").unwrap(), None);
        assert_eq!(storage.read("user_profile").unwrap(), None);
    }

    #[tokio::test]
    async fn expiry_signal_forces_logout() {
        let api = MockApi::new();
        api.respond_with(Some(profile("42", "a@b.com")), Some("abc123"));
        let storage = Arc::new(MemoryStorage::new());
        let manager = manager_over(api.clone(), storage.clone());
        manager.restore().await;
        manager.login("a@b.com", "secret").await.unwrap();

        // Even a rejected server notification must not keep the user
        // logged in locally
        api.logout_fails.store(true, Ordering::SeqCst);

        let hook = TokenExpiryHook::new();
        manager.register_expiry(&hook);
        hook.notify().await;

        assert_eq!(manager.state(), SessionState::Anonymous);
        assert_eq!(storage.read("auth_token").unwrap(), None);
    }

    #[tokio::test]
    async fn restore_requires_both_token_and_profile() {
        // Token only
        let storage = Arc::new(MemoryStorage::new());
        CredentialStore::new(storage.clone()).set_token("abc123").await;
        let manager = manager_over(MockApi::new(), storage);
        manager.restore().await;
        assert_eq!(manager.state(), SessionState::Anonymous);

        // Profile only
        let storage = Arc::new(MemoryStorage::new());
        let stored = StoredProfile::new(profile("42", "a@b.com"));
        storage
            .write("user_profile", &serde_json::to_string(&stored).unwrap())
            .unwrap();
        let manager = manager_over(MockApi::new(), storage);
        manager.restore().await;
        assert_eq!(manager.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn restore_treats_a_corrupt_profile_as_anonymous() {
        let storage = Arc::new(MemoryStorage::new());
        CredentialStore::new(storage.clone()).set_token("abc123").await;
        storage.write("user_profile", "not json at all").unwrap();

        let manager = manager_over(MockApi::new(), storage);
        manager.restore().await;
        assert_eq!(manager.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn update_profile_leaves_the_token_alone() {
        let api = MockApi::new();
        api.respond_with(Some(profile("42", "a@b.com")), Some("abc123"));
        let storage = Arc::new(MemoryStorage::new());
        let manager = manager_over(api, storage.clone());
        manager.restore().await;
        manager.login("a@b.com", "secret").await.unwrap();

        manager
            .update_profile(profile("42", "new@b.com"))
            .await
            .unwrap();

        assert!(manager.is_authenticated());
        assert_eq!(manager.current_user().unwrap().email, "new@b.com");
        let credentials = CredentialStore::new(storage);
        assert_eq!(credentials.get_token().await.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn session_survives_a_simulated_restart() {
        let storage = Arc::new(MemoryStorage::new());

        // First run: log in
        let api = MockApi::new();
        api.respond_with(Some(profile("42", "a@b.com")), Some("abc123"));
        let manager = manager_over(api.clone(), storage.clone());
        manager.restore().await;
        manager.login("a@b.com", "secret").await.unwrap();
        assert_eq!(api.login_calls.load(Ordering::SeqCst), 1);

        // "Restart": a fresh manager over the same storage, no network
        let second_api = MockApi::new();
        let restarted = manager_over(second_api.clone(), storage);
        restarted.restore().await;

        assert!(restarted.is_authenticated());
        assert_eq!(restarted.current_user().unwrap().id, "42");
        assert_eq!(second_api.login_calls.load(Ordering::SeqCst), 0);
    }
}
