use std::sync::Arc;

use tracing::{debug, error};

use super::kv::KeyValueStore;
use super::window::{window_session_id, WindowSessionId};

/// `"{base}_{window}"`, or the bare base key when no window id exists.
pub fn namespaced_key(base: &str, window: Option<&WindowSessionId>) -> String {
    match window {
        Some(id) => format!("{}_{}", base, id),
        None => base.to_string(),
    }
}

/// Persistent key-value access scoped to one window.
///
/// Every call resolves the window id first so that concurrently open windows writing
/// the same logical key land on different physical keys. Without a window id the
/// store degrades to shared, unqualified keys. All operations swallow backend
/// failures: they are logged and reported as `false` / `None`.
#[derive(Clone)]
pub struct NamespacedStore {
    window: Option<Arc<dyn KeyValueStore>>,
    backend: Option<Arc<dyn KeyValueStore>>,
}

impl NamespacedStore {
    pub fn new(window: Option<Arc<dyn KeyValueStore>>, backend: Option<Arc<dyn KeyValueStore>>) -> Self {
        Self { window, backend }
    }

    pub fn window_session_id(&self) -> Option<WindowSessionId> {
        window_session_id(self.window.as_deref())
    }

    pub fn key_for(&self, key: &str) -> String {
        namespaced_key(key, self.window_session_id().as_ref())
    }

    pub fn set_item(&self, key: &str, value: &str) -> bool {
        let Some(backend) = &self.backend else {
            debug!(target: "session", key, "no persistent storage; set skipped");
            return false;
        };
        let full = self.key_for(key);
        match backend.set(&full, value) {
            Ok(()) => true,
            Err(e) => {
                error!(target: "session", key = %full, "error storing session item: {}", e);
                false
            }
        }
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        let backend = self.backend.as_ref()?;
        let full = self.key_for(key);
        match backend.get(&full) {
            Ok(v) => v,
            Err(e) => {
                error!(target: "session", key = %full, "error retrieving session item: {}", e);
                None
            }
        }
    }

    pub fn remove_item(&self, key: &str) -> bool {
        let Some(backend) = &self.backend else { return false; };
        let full = self.key_for(key);
        match backend.remove(&full) {
            Ok(()) => true,
            Err(e) => {
                error!(target: "session", key = %full, "error removing session item: {}", e);
                false
            }
        }
    }
}
