//! Registration point for the server-driven "token expired" signal.

use std::sync::{Mutex, MutexGuard};

use futures::future::BoxFuture;

/// Handler invoked when the server rejects the held token.
pub type ExpiryHandler = Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Holds at most one expiry handler; registering again replaces the previous
/// one. Whatever code first observes an authorization failure (typically a
/// response-status inspector) calls [`notify`](Self::notify), which is the
/// sole trigger for a forced logout.
#[derive(Default)]
pub struct TokenExpiryHook {
    handler: Mutex<Option<ExpiryHandler>>,
}

impl TokenExpiryHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous registration.
    pub fn set(&self, handler: ExpiryHandler) {
        *self.lock() = Some(handler);
    }

    /// Drop the current registration, if any.
    pub fn clear(&self) {
        *self.lock() = None;
    }

    /// Invoke the registered handler and wait for it. No-op when nothing is
    /// registered.
    pub async fn notify(&self) {
        let invocation = self.lock().as_ref().map(|handler| handler());
        if let Some(invocation) = invocation {
            invocation.await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ExpiryHandler>> {
        self.handler.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
