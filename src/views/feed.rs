use tracing::warn;

use crate::api::ApiClient;
use crate::auth::AuthState;
use crate::error::{AppError, AppResult};
use crate::model::Submission;

use super::can_submit_text;

pub const LOAD_SUBMISSIONS_FAILED: &str = "Failed to load submissions";

/// Submissions panel of the dashboard, visible to developers and admins.
#[derive(Debug, Clone, Default)]
pub struct SubmissionFeed {
    pub submissions: Vec<Submission>,
    /// Local, panel-scoped error; never written to the auth state.
    pub error: Option<String>,
}

impl SubmissionFeed {
    pub async fn load(&mut self, api: &ApiClient, state: &AuthState) -> AppResult<()> {
        if !can_submit_text(state.role()) {
            return Err(AppError::authorization("forbidden", "Submissions are visible to developers and admins only"));
        }
        match api.submissions().await {
            Ok(list) => {
                self.submissions = list;
                self.error = None;
                Ok(())
            }
            Err(e) => {
                warn!(target: "views", "error fetching submissions: {}", e);
                self.error = Some(LOAD_SUBMISSIONS_FAILED.to_string());
                Err(e)
            }
        }
    }

    /// Show a freshly accepted submission without refetching.
    pub fn prepend(&mut self, submission: Submission) { self.submissions.insert(0, submission); }

    pub fn is_empty(&self) -> bool { self.submissions.is_empty() }
}
