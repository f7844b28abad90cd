//! Per-window session isolation.
//!
//! A `Window` owns two storages: a transient one that lives exactly as long as the
//! window (holds the window session id) and a persistent one shared with every other
//! window on the host. Persistent keys are namespaced by the window id so tokens of
//! concurrently open windows never overwrite each other.

mod kv;
mod namespaced;
mod window;

use std::sync::Arc;

pub use kv::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use namespaced::{namespaced_key, NamespacedStore};
pub use window::{is_new_window_session, window_session_id, WindowSessionId, WINDOW_INITIALIZED_KEY, WINDOW_SESSION_KEY};

/// Logical key of the bearer token in persistent storage.
pub const TOKEN_KEY: &str = "token";

#[derive(Clone)]
pub struct Window {
    transient: Option<Arc<dyn KeyValueStore>>,
    persistent: Option<Arc<dyn KeyValueStore>>,
}

impl Window {
    /// A fresh window over shared persistent storage.
    pub fn open(persistent: Arc<dyn KeyValueStore>) -> Self {
        Self { transient: Some(Arc::new(MemoryStore::new())), persistent: Some(persistent) }
    }

    pub fn with_stores(transient: Option<Arc<dyn KeyValueStore>>, persistent: Option<Arc<dyn KeyValueStore>>) -> Self {
        Self { transient, persistent }
    }

    /// No window-scoped storage: session features disabled, persistent keys unqualified.
    pub fn headless(persistent: Option<Arc<dyn KeyValueStore>>) -> Self {
        Self { transient: None, persistent }
    }

    pub fn session_id(&self) -> Option<WindowSessionId> {
        window_session_id(self.transient.as_deref())
    }

    pub fn is_new_window_session(&self) -> bool {
        is_new_window_session(self.transient.as_deref())
    }

    pub fn store(&self) -> NamespacedStore {
        NamespacedStore::new(self.transient.clone(), self.persistent.clone())
    }
}
