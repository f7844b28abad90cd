use tracing::{info, warn};

use crate::api::ApiClient;
use crate::auth::AuthState;
use crate::error::{AppError, AppResult};
use crate::model::{Role, Statistics, User};

use super::is_admin;

pub const LOAD_USERS_FAILED: &str = "Failed to load users. Please try again.";
pub const UPDATE_ROLE_FAILED: &str = "Failed to update user role. Please try again.";

fn require_admin(state: &AuthState) -> AppResult<()> {
    if is_admin(state.role()) {
        Ok(())
    } else {
        Err(AppError::authorization("forbidden", "Admin access required"))
    }
}

/// Admin user management panel.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    pub users: Vec<User>,
    pub error: Option<String>,
}

impl UserDirectory {
    pub async fn load(&mut self, api: &ApiClient, state: &AuthState) -> AppResult<()> {
        require_admin(state)?;
        match api.users().await {
            Ok(users) => {
                self.users = users;
                self.error = None;
                Ok(())
            }
            Err(e) => {
                warn!(target: "views", "error fetching users: {}", e);
                self.error = Some(LOAD_USERS_FAILED.to_string());
                Err(e)
            }
        }
    }

    /// Change a user's role. The local row is updated only once the backend
    /// confirmed the change; on failure the directory is left as it was.
    pub async fn change_role(&mut self, api: &ApiClient, state: &AuthState, user_id: &str, role: Role) -> AppResult<()> {
        require_admin(state)?;
        match api.update_user_role(user_id, role).await {
            Ok(updated) => {
                let confirmed = if updated.id == user_id { updated.role } else { role };
                if let Some(row) = self.users.iter_mut().find(|u| u.id == user_id) {
                    row.role = confirmed;
                }
                self.error = None;
                info!(target: "views", user_id, role = %confirmed, "user role updated");
                Ok(())
            }
            Err(e) => {
                warn!(target: "views", user_id, "error updating user role: {}", e);
                self.error = Some(UPDATE_ROLE_FAILED.to_string());
                Err(e)
            }
        }
    }
}

/// Admin statistics panel.
#[derive(Debug, Clone, Default)]
pub struct DashboardStats {
    pub stats: Option<Statistics>,
}

impl DashboardStats {
    pub async fn load(&mut self, api: &ApiClient, state: &AuthState) -> AppResult<Statistics> {
        require_admin(state)?;
        let stats = api.statistics().await?;
        self.stats = Some(stats);
        Ok(stats)
    }
}
