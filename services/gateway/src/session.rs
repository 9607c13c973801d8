//! Authentication session state and auth-change notifications.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::debug;

/// Authenticated user as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Authentication session issued by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds at issue time
    #[serde(default)]
    pub expires_in: i64,
    /// Expiry as unix seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// Fill in `expires_at` from `expires_in` when the platform omitted it
    pub fn with_resolved_expiry(mut self) -> Self {
        if self.expires_at.is_none() && self.expires_in > 0 {
            self.expires_at = Some(Utc::now().timestamp() + self.expires_in);
        }
        self
    }

    /// True when the session expires within `margin`
    pub fn expires_within(&self, margin: Duration) -> bool {
        match self.expires_at {
            Some(at) => at - Utc::now().timestamp() <= margin.as_secs() as i64,
            None => false,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

/// Session transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChangeEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Listener invoked on every session transition
pub type AuthListener = Arc<dyn Fn(AuthChangeEvent, Option<&Session>) + Send + Sync>;

type Listeners = Mutex<BTreeMap<u64, AuthListener>>;

/// Wrap a closure as an [`AuthListener`]
pub fn listener<F>(f: F) -> AuthListener
where
    F: Fn(AuthChangeEvent, Option<&Session>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Current session plus the listeners observing it
pub struct SessionStore {
    current: RwLock<Option<Session>>,
    listeners: Arc<Listeners>,
    next_id: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
            listeners: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Snapshot of the current session
    pub fn current(&self) -> Option<Session> {
        self.current.read().clone()
    }

    /// Replace the session and notify listeners
    pub fn set(&self, event: AuthChangeEvent, session: Option<Session>) {
        *self.current.write() = session.clone();
        self.emit(event, session.as_ref());
    }

    /// Register a listener; it is called once right away with the current session
    pub fn subscribe(&self, listener: AuthListener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().insert(id, listener.clone());

        debug!(subscription_id = id, "Auth listener registered");

        let current = self.current();
        listener(AuthChangeEvent::InitialSession, current.as_ref());

        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn emit(&self, event: AuthChangeEvent, session: Option<&Session>) {
        // Listeners may subscribe or unsubscribe from inside the callback
        let listeners: Vec<AuthListener> = self.listeners.lock().values().cloned().collect();
        debug!(?event, listeners = listeners.len(), "Auth state changed");
        for listener in listeners {
            listener(event, session);
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by a subscription; dropping it also unsubscribes
pub struct Subscription {
    id: u64,
    listeners: Weak<Listeners>,
}

impl Subscription {
    /// Stop receiving events
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
