//! Local form validation. Failures are returned as `AppError::Validation` and never
//! reach the network or the auth state.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::api::ApiClient;
use crate::error::{AppError, AppResult};
use crate::model::{Role, Submission, User};

static EMAIL_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.as_ref().map(|re| re.is_match(email.trim())).unwrap_or(false)
}

fn check_email(email: &str) -> AppResult<()> {
    if email.trim().is_empty() {
        return Err(AppError::validation("empty_email", "Email is required"));
    }
    if !is_valid_email(email) {
        return Err(AppError::validation("invalid_email", "Please enter a valid email address"));
    }
    Ok(())
}

fn check_password(password: &str) -> AppResult<()> {
    if password.is_empty() {
        return Err(AppError::validation("empty_password", "Password is required"));
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }

    pub fn validate(&self) -> AppResult<()> {
        check_email(&self.email)?;
        check_password(&self.password)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub role: Role,
}

impl RegisterForm {
    pub fn validate(&self) -> AppResult<()> {
        check_email(&self.email)?;
        check_password(&self.password)?;
        if self.password != self.confirm_password {
            return Err(AppError::validation("password_mismatch", "Passwords do not match"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TextSubmissionForm {
    pub text: String,
}

impl TextSubmissionForm {
    pub fn new(text: impl Into<String>) -> Self { Self { text: text.into() } }

    pub fn validate(&self) -> AppResult<()> {
        if self.text.trim().is_empty() {
            return Err(AppError::validation("empty_text", "Please enter some text"));
        }
        Ok(())
    }

    /// Validate, check the role, then send. The text is cleared only after the
    /// backend accepted it.
    pub async fn submit(&mut self, api: &ApiClient, user: Option<&User>) -> AppResult<Submission> {
        self.validate()?;
        if !user.map(User::can_submit_text).unwrap_or(false) {
            return Err(AppError::authorization("forbidden", "Only developers and admins can submit text"));
        }
        let submission = api.submit_text(&self.text).await?;
        self.text.clear();
        Ok(submission)
    }
}
