//! Wire-level domain types exchanged with the dashboard backend.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Developer,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Developer, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Developer => "developer",
            Role::Admin => "admin",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Role {
    type Err = AppError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "developer" => Ok(Role::Developer),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::validation("invalid_role".to_string(), format!("unknown role '{}'", other))),
        }
    }
}

/// Backend ids arrive as strings (`_id` from document stores) or numbers.
fn deserialize_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!("unsupported id: {}", other))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(alias = "_id", deserialize_with = "deserialize_id", default)]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

impl User {
    pub fn is_admin(&self) -> bool { self.role == Role::Admin }
    pub fn can_submit_text(&self) -> bool { matches!(self.role, Role::Developer | Role::Admin) }
}

/// Successful login/register result.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    pub token: String,
    pub user: User,
}

impl AuthGrant {
    /// Accepts `{token, user: {...}}` as well as a flat `{token, id, email, role}`.
    pub fn from_value(v: Value) -> AppResult<Self> {
        let token = v.get("token").and_then(|t| t.as_str()).unwrap_or("").to_string();
        if token.is_empty() {
            return Err(AppError::decode("missing_token", "authentication response did not include a token"));
        }
        let user_v = match v.get("user") {
            Some(u) if u.is_object() => u.clone(),
            _ => v,
        };
        let user: User = serde_json::from_value(user_v)?;
        Ok(Self { token, user })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmissionAuthor {
    Id(String),
    Profile {
        #[serde(alias = "_id", default)]
        id: Option<String>,
        #[serde(default)]
        email: Option<String>,
    },
    #[default]
    Unknown,
}

impl SubmissionAuthor {
    /// Email when the backend populated the author, otherwise the raw id.
    pub fn label(&self) -> String {
        match self {
            SubmissionAuthor::Id(id) => id.clone(),
            SubmissionAuthor::Profile { email: Some(e), .. } => e.clone(),
            SubmissionAuthor::Profile { id: Some(id), .. } => id.clone(),
            _ => "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(alias = "_id", deserialize_with = "deserialize_id", default)]
    pub id: String,
    pub text: String,
    #[serde(rename = "userId", default)]
    pub author: SubmissionAuthor,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    #[serde(default)]
    pub total_users: u64,
    #[serde(default)]
    pub text_submissions: u64,
    #[serde(default)]
    pub active_sessions: u64,
}
