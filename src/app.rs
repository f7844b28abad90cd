//!
//! textdash app
//! -------------
//! Composition root for one window: configuration, window-scoped storage, the API
//! client, the auth manager and the notification list. Front ends create one `App`
//! per window and call `mount` once before anything else.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::info;

use crate::api::ApiClient;
use crate::auth::{AuthManager, AuthState};
use crate::config::ClientConfig;
use crate::error::{AppError, AppResult};
use crate::model::Role;
use crate::notify::{ChannelStatus, NotificationChannel, NotificationList};
use crate::session::Window;
use crate::views::{guard, Route, RouteDecision};

pub struct App {
    config: ClientConfig,
    window: Window,
    auth: Arc<AuthManager>,
    notifications: NotificationList,
    channel: Mutex<Option<NotificationChannel>>,
    /// Runtime the push channel is spawned on; captured at construction when one
    /// is current, otherwise looked up when the channel opens.
    runtime: Option<Handle>,
}

impl App {
    pub fn new(config: ClientConfig, window: Window) -> AppResult<Self> {
        let store = window.store();
        let api = ApiClient::new(&config, store.clone())?;
        let auth = Arc::new(AuthManager::new(api, store));
        Ok(Self {
            config,
            window,
            auth,
            notifications: NotificationList::new(),
            channel: Mutex::new(None),
            runtime: Handle::try_current().ok(),
        })
    }

    /// Spawn background work (the notification channel) on `handle`.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn config(&self) -> &ClientConfig { &self.config }
    pub fn window(&self) -> &Window { &self.window }
    pub fn auth(&self) -> &Arc<AuthManager> { &self.auth }
    pub fn api(&self) -> &ApiClient { self.auth.api() }
    pub fn notifications(&self) -> &NotificationList { &self.notifications }
    pub fn state(&self) -> AuthState { self.auth.state() }

    /// Resolve the initial auth state from this window's stored token.
    pub async fn mount(&self) -> AuthState {
        if self.window.is_new_window_session() {
            info!(target: "app", window = ?self.window.session_id().map(|w| w.to_string()), "new window session");
        }
        self.auth.restore_session().await;
        self.auth.state()
    }

    pub fn guard(&self, route: Route) -> RouteDecision { guard(route, &self.auth.state()) }

    /// Where to go after a login attempt: the dashboard on success, nowhere on failure.
    pub async fn login(&self, email: &str, password: &str) -> Option<Route> {
        self.auth.login(email, password).await.then_some(Route::Dashboard)
    }

    pub async fn register(&self, email: &str, password: &str, role: Role) -> Option<Route> {
        self.auth.register(email, password, role).await.then_some(Route::Dashboard)
    }

    pub fn logout(&self) -> Route {
        self.close_notifications();
        self.auth.logout();
        Route::Login
    }

    /// Open the push channel for the current user, replacing any open one. Returns
    /// `Ok(false)` without connecting when nobody is signed in, and an error when no
    /// runtime is available to drive the connection.
    pub fn open_notifications(&self) -> AppResult<bool> {
        if !self.auth.state().is_authenticated {
            return Ok(false);
        }
        let handle = match &self.runtime {
            Some(h) => h.clone(),
            None => Handle::try_current()
                .map_err(|e| AppError::runtime("no_runtime", format!("notification channel needs a Tokio runtime: {}", e)))?,
        };
        let channel = NotificationChannel::open_on(
            &handle,
            &self.config,
            self.window.session_id(),
            self.api().token(),
            self.notifications.clone(),
        );
        *self.channel.lock() = Some(channel);
        Ok(true)
    }

    pub fn close_notifications(&self) {
        if self.channel.lock().take().is_some() {
            info!(target: "app", "notification channel closed");
        }
    }

    pub fn notification_status(&self) -> Option<ChannelStatus> {
        self.channel.lock().as_ref().map(NotificationChannel::status)
    }

    pub fn clear_notifications(&self) { self.notifications.clear(); }
}
