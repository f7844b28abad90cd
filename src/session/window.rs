use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::kv::KeyValueStore;

/// Window-scoped storage key holding the window session id.
pub const WINDOW_SESSION_KEY: &str = "app_window_session_id";
/// Window-scoped marker set the first time a window is asked whether it is new.
pub const WINDOW_INITIALIZED_KEY: &str = "__window_session_initialized";

static LOCAL_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowSessionId(String);

impl WindowSessionId {
    /// New id: base36 wall-clock millis followed by a base36 random suffix.
    /// Unique enough for concurrent windows; not a secret.
    pub fn generate() -> Self {
        let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let mut buf = [0u8; 8];
        let _ = getrandom::getrandom(&mut buf);
        // mix in a process-local sequence so two windows in one process never
        // collide even if the random source is unavailable
        let seq = LOCAL_SEQ.fetch_add(1, Ordering::Relaxed);
        let suffix = u64::from_le_bytes(buf) ^ seq.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        WindowSessionId(format!("{}{}", to_base36(millis), to_base36(suffix)))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<String> for WindowSessionId {
    fn from(s: String) -> Self { WindowSessionId(s) }
}

impl Display for WindowSessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(&self.0) }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 { return "0".to_string(); }
    let mut out = Vec::with_capacity(13);
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Get or create the session id of the window owning `storage`.
///
/// `None` storage means there is no window (headless context) and session isolation
/// is disabled. Storage failures are logged and also yield `None`.
pub fn window_session_id(storage: Option<&dyn KeyValueStore>) -> Option<WindowSessionId> {
    let storage = storage?;
    match storage.get(WINDOW_SESSION_KEY) {
        Ok(Some(existing)) if !existing.is_empty() => Some(WindowSessionId(existing)),
        Ok(_) => {
            let id = WindowSessionId::generate();
            if let Err(e) = storage.set(WINDOW_SESSION_KEY, id.as_str()) {
                error!(target: "session", "error writing window session id: {}", e);
                return None;
            }
            debug!(target: "session", window = %id, "window session created");
            Some(id)
        }
        Err(e) => {
            error!(target: "session", "error accessing window storage: {}", e);
            None
        }
    }
}

/// True exactly once per window: the first call marks the window as initialized.
pub fn is_new_window_session(storage: Option<&dyn KeyValueStore>) -> bool {
    let Some(storage) = storage else { return false; };
    match storage.get(WINDOW_INITIALIZED_KEY) {
        Ok(Some(v)) if v == "true" => false,
        Ok(_) => {
            if let Err(e) = storage.set(WINDOW_INITIALIZED_KEY, "true") {
                error!(target: "session", "error marking window initialized: {}", e);
            }
            true
        }
        Err(e) => {
            error!(target: "session", "error accessing window storage: {}", e);
            false
        }
    }
}
