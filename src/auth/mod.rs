//! Authentication state machine.
//! `state` holds the pure reducer; `manager` drives it from network calls and the
//! window-namespaced token store.

mod manager;
mod state;

pub use manager::{AuthManager, STORAGE_FAILURE_MESSAGE};
pub use state::{reduce, AuthAction, AuthPhase, AuthState};
