//!
//! textdash views
//! ---------------
//! Headless page logic: which route may render for a given auth state, form
//! validation, and the data-backed panels of the dashboard. Nothing here renders;
//! front ends (the terminal REPL) decide how to show the results.

mod admin;
mod feed;
mod forms;

use std::fmt::{Display, Formatter};

pub use admin::{DashboardStats, UserDirectory, LOAD_USERS_FAILED, UPDATE_ROLE_FAILED};
pub use feed::{SubmissionFeed, LOAD_SUBMISSIONS_FAILED};
pub use forms::{is_valid_email, LoginForm, RegisterForm, TextSubmissionForm};

use crate::auth::AuthState;
use crate::model::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    Register,
    Dashboard,
    TextSubmission,
    Admin,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Dashboard => "/dashboard",
            Route::TextSubmission => "/text-submission",
            Route::Admin => "/admin",
        }
    }

    pub fn from_path(path: &str) -> Option<Route> {
        let p = path.trim_end_matches('/');
        Some(match p {
            "" => Route::Home,
            "/login" => Route::Login,
            "/register" => Route::Register,
            "/dashboard" => Route::Dashboard,
            "/text-submission" => Route::TextSubmission,
            "/admin" => Route::Admin,
            _ => return None,
        })
    }

    /// Routes that require an authenticated user.
    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Dashboard | Route::TextSubmission | Route::Admin)
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.path()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Auth state not resolved yet; show a placeholder.
    Loading,
    Render,
    Redirect(Route),
}

pub fn can_submit_text(role: Option<Role>) -> bool {
    matches!(role, Some(Role::Developer) | Some(Role::Admin))
}

pub fn is_admin(role: Option<Role>) -> bool { role == Some(Role::Admin) }

/// Decide what a route shows for `state`.
///
/// Public pages render while auth is still loading; protected pages wait. An
/// authenticated user whose role is insufficient is sent back to the dashboard.
pub fn guard(route: Route, state: &AuthState) -> RouteDecision {
    let authed = state.is_authenticated && state.user.is_some();
    match route {
        Route::Home => RouteDecision::Render,
        Route::Login | Route::Register => {
            if !state.loading && authed {
                RouteDecision::Redirect(Route::Dashboard)
            } else {
                RouteDecision::Render
            }
        }
        protected => {
            if state.loading {
                return RouteDecision::Loading;
            }
            if !authed {
                return RouteDecision::Redirect(Route::Login);
            }
            let role = state.role();
            let allowed = match protected {
                Route::TextSubmission => can_submit_text(role),
                Route::Admin => is_admin(role),
                _ => true,
            };
            if allowed { RouteDecision::Render } else { RouteDecision::Redirect(Route::Dashboard) }
        }
    }
}
