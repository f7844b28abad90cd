use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::state::{reduce, AuthAction, AuthState};
use crate::api::ApiClient;
use crate::error::AppResult;
use crate::model::{AuthGrant, Role, User};
use crate::session::{NamespacedStore, TOKEN_KEY};

/// Shown when the token could not be persisted after a successful login/register.
pub const STORAGE_FAILURE_MESSAGE: &str = "Unable to save your session. Please check your browser storage settings.";

/// Owns the authentication state of one window.
///
/// State only changes through `reduce`, driven by the operations below. Each
/// operation returns after its final transition has been committed, so callers can
/// navigate immediately on return.
pub struct AuthManager {
    api: ApiClient,
    store: NamespacedStore,
    state: watch::Sender<AuthState>,
    restore_started: AtomicBool,
    in_flight: AtomicBool,
}

/// Held for one login/register attempt. Clears the in-flight flag when it goes
/// away; if the attempt never reached `complete` (its future was dropped) the
/// pending `Loading` transition is resolved as an anonymous failure.
struct InFlight<'a> {
    auth: &'a AuthManager,
    op: &'static str,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(mut self) { self.settled = true; }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(target: "auth", op = self.op, "attempt abandoned before completion");
            self.auth.dispatch(AuthAction::Failure(None));
        }
        self.auth.in_flight.store(false, Ordering::SeqCst);
    }
}

impl AuthManager {
    pub fn new(api: ApiClient, store: NamespacedStore) -> Self {
        let (state, _rx) = watch::channel(AuthState::default());
        Self { api, store, state, restore_started: AtomicBool::new(false), in_flight: AtomicBool::new(false) }
    }

    pub fn state(&self) -> AuthState { self.state.borrow().clone() }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> { self.state.subscribe() }

    pub fn api(&self) -> &ApiClient { &self.api }

    pub fn current_user(&self) -> Option<User> { self.state.borrow().user.clone() }

    fn dispatch(&self, action: AuthAction) {
        debug!(target: "auth", ?action, "dispatch");
        self.state.send_modify(|s| *s = reduce(s, action));
    }

    /// Check for a stored token and resolve the initial loading state. Runs at most
    /// once per manager; later (or concurrent) calls return immediately.
    pub async fn restore_session(&self) {
        if self.restore_started.swap(true, Ordering::SeqCst) {
            debug!(target: "auth", "session restore already started");
            return;
        }
        if self.store.window_session_id().is_none() {
            info!(target: "auth", "no window session available; restoring with shared keys");
        }
        let Some(token) = self.store.get_item(TOKEN_KEY).filter(|t| !t.is_empty()) else {
            self.dispatch(AuthAction::Failure(None));
            return;
        };
        match self.api.current_user(&token).await {
            Ok(user) => {
                info!(target: "auth", user = %user.email, "session restored");
                self.dispatch(AuthAction::LoginSuccess(user));
            }
            Err(e) => {
                warn!(target: "auth", "error loading user: {}", e);
                self.store.remove_item(TOKEN_KEY);
                self.dispatch(AuthAction::Failure(None));
            }
        }
    }

    fn begin(&self, op: &'static str) -> Option<InFlight<'_>> {
        if self.in_flight.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            warn!(target: "auth", op, "rejected: another login/register is in flight");
            return None;
        }
        self.dispatch(AuthAction::Loading);
        Some(InFlight { auth: self, op, settled: false })
    }

    fn complete(&self, guard: InFlight<'_>, result: AppResult<AuthGrant>, on_success: fn(User) -> AuthAction) -> bool {
        let op = guard.op;
        let ok = self.apply(op, result, on_success);
        guard.settle();
        ok
    }

    fn apply(&self, op: &str, result: AppResult<AuthGrant>, on_success: fn(User) -> AuthAction) -> bool {
        match result {
            Ok(grant) => {
                if !self.store.set_item(TOKEN_KEY, &grant.token) {
                    warn!(target: "auth", op, "token could not be persisted");
                    self.dispatch(AuthAction::Failure(Some(STORAGE_FAILURE_MESSAGE.to_string())));
                    return false;
                }
                info!(target: "auth", op, user = %grant.user.email, role = %grant.user.role, "authenticated");
                self.dispatch(on_success(grant.user));
                true
            }
            Err(e) => {
                warn!(target: "auth", op, "{} error: {}", op, e);
                self.dispatch(AuthAction::Failure(Some(e.user_message())));
                false
            }
        }
    }

    /// Returns `true` once authenticated and the token is stored. A call made while
    /// another login/register is pending returns `false` without touching state.
    /// Dropping the returned future mid-request leaves the window anonymous.
    pub async fn login(&self, email: &str, password: &str) -> bool {
        let Some(guard) = self.begin("login") else { return false; };
        let result = self.api.login(email, password).await;
        self.complete(guard, result, AuthAction::LoginSuccess)
    }

    pub async fn register(&self, email: &str, password: &str, role: Role) -> bool {
        let Some(guard) = self.begin("register") else { return false; };
        let result = self.api.register(email, password, role).await;
        self.complete(guard, result, AuthAction::RegisterSuccess)
    }

    pub fn logout(&self) {
        if !self.store.remove_item(TOKEN_KEY) {
            debug!(target: "auth", "token removal skipped or failed");
        }
        self.dispatch(AuthAction::Logout);
    }

    pub fn clear_error(&self) {
        self.dispatch(AuthAction::ClearError);
    }
}
