use serde::Serialize;

use crate::model::User;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthState {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self { user: None, is_authenticated: false, loading: true, error: None }
    }
}

/// Coarse phase derived from an `AuthState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Loading,
    Authenticated,
    /// Resolved, not authenticated, `error` set.
    AnonymousError,
    /// Resolved, not authenticated, no error.
    AnonymousClean,
}

impl AuthState {
    pub fn phase(&self) -> AuthPhase {
        if self.loading {
            AuthPhase::Loading
        } else if self.is_authenticated {
            AuthPhase::Authenticated
        } else if self.error.is_some() {
            AuthPhase::AnonymousError
        } else {
            AuthPhase::AnonymousClean
        }
    }

    pub fn role(&self) -> Option<crate::model::Role> {
        self.user.as_ref().map(|u| u.role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthAction {
    LoginSuccess(User),
    RegisterSuccess(User),
    /// Restore rejected, login failed or register failed. `None` means
    /// "not authenticated" without a user-facing message.
    Failure(Option<String>),
    Logout,
    ClearError,
    Loading,
}

/// Pure transition function; the only way an `AuthState` changes.
pub fn reduce(state: &AuthState, action: AuthAction) -> AuthState {
    match action {
        AuthAction::LoginSuccess(user) | AuthAction::RegisterSuccess(user) => AuthState {
            user: Some(user),
            is_authenticated: true,
            loading: false,
            error: None,
        },
        AuthAction::Failure(error) => AuthState { user: None, is_authenticated: false, loading: false, error },
        AuthAction::Logout => AuthState { user: None, is_authenticated: false, loading: false, error: None },
        AuthAction::ClearError => AuthState { error: None, ..state.clone() },
        AuthAction::Loading => AuthState { loading: true, ..state.clone() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    fn user() -> User {
        User { id: "1".into(), email: "a@b.com".into(), role: Role::Developer }
    }

    #[test]
    fn initial_state_is_loading() {
        let s = AuthState::default();
        assert_eq!(s.phase(), AuthPhase::Loading);
        assert!(s.user.is_none());
    }

    #[test]
    fn success_authenticates() {
        let s = reduce(&AuthState::default(), AuthAction::LoginSuccess(user()));
        assert_eq!(s.phase(), AuthPhase::Authenticated);
        assert_eq!(s.role(), Some(Role::Developer));
        let s = reduce(&AuthState::default(), AuthAction::RegisterSuccess(user()));
        assert!(s.is_authenticated && s.user.is_some() && s.error.is_none());
    }

    #[test]
    fn failure_clears_user_and_sets_error() {
        let authed = reduce(&AuthState::default(), AuthAction::LoginSuccess(user()));
        let s = reduce(&authed, AuthAction::Failure(Some("bad creds".into())));
        assert_eq!(s.phase(), AuthPhase::AnonymousError);
        assert!(s.user.is_none());
        let s = reduce(&authed, AuthAction::Failure(None));
        assert_eq!(s.phase(), AuthPhase::AnonymousClean);
    }

    #[test]
    fn clear_error_only_touches_error() {
        let failed = reduce(&AuthState::default(), AuthAction::Failure(Some("x".into())));
        let cleared = reduce(&failed, AuthAction::ClearError);
        assert_eq!(cleared, AuthState { error: None, ..failed.clone() });

        let authed = reduce(&AuthState::default(), AuthAction::LoginSuccess(user()));
        assert_eq!(reduce(&authed, AuthAction::ClearError), authed);
    }

    #[test]
    fn loading_keeps_everything_else() {
        let authed = reduce(&AuthState::default(), AuthAction::LoginSuccess(user()));
        let s = reduce(&authed, AuthAction::Loading);
        assert!(s.loading && s.is_authenticated);
        assert_eq!(s.user, authed.user);
    }

    #[test]
    fn logout_is_clean() {
        let authed = reduce(&AuthState::default(), AuthAction::LoginSuccess(user()));
        let s = reduce(&authed, AuthAction::Logout);
        assert_eq!(s, AuthState { user: None, is_authenticated: false, loading: false, error: None });
    }
}
