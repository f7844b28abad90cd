//! Unified client error model and mapping helpers.
//! Every failure that crosses the network, storage or form boundary is normalized
//! into one `AppError` carrying a stable code and a single human-readable message.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Generic message shown when the backend could not be reached.
pub const SERVER_ERROR_MESSAGE: &str = "Server error. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Client-side form validation; never reaches the network.
    Validation { code: String, message: String },
    /// Bad credentials or an expired/invalid token.
    Auth { code: String, message: String },
    /// Transport failure (connect, timeout, TLS, body read).
    Network { code: String, message: String },
    /// Non-2xx response reported by the backend.
    Server { code: String, status: u16, message: String },
    /// Persistent or window-scoped storage unavailable.
    Storage { code: String, message: String },
    /// Role insufficient for a view or action.
    Authorization { code: String, message: String },
    /// A 2xx response whose body did not have the expected shape.
    Decode { code: String, message: String },
    /// Called from a context that cannot run background work (no async runtime).
    Runtime { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Validation { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Network { code, .. }
            | AppError::Server { code, .. }
            | AppError::Storage { code, .. }
            | AppError::Authorization { code, .. }
            | AppError::Decode { code, .. }
            | AppError::Runtime { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Validation { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Network { message, .. }
            | AppError::Server { message, .. }
            | AppError::Storage { message, .. }
            | AppError::Authorization { message, .. }
            | AppError::Decode { message, .. }
            | AppError::Runtime { message, .. } => message.as_str(),
        }
    }

    pub fn validation<S: Into<String>>(code: S, msg: S) -> Self { AppError::Validation { code: code.into(), message: msg.into() } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn network<S: Into<String>>(code: S, msg: S) -> Self { AppError::Network { code: code.into(), message: msg.into() } }
    pub fn storage<S: Into<String>>(code: S, msg: S) -> Self { AppError::Storage { code: code.into(), message: msg.into() } }
    pub fn authorization<S: Into<String>>(code: S, msg: S) -> Self { AppError::Authorization { code: code.into(), message: msg.into() } }
    pub fn decode<S: Into<String>>(code: S, msg: S) -> Self { AppError::Decode { code: code.into(), message: msg.into() } }
    pub fn runtime<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Runtime { code: code.into(), message: msg.into() } }

    /// Server-reported failure. 401/403 are kept as `Server` so callers still see the
    /// status; use `is_auth` to classify.
    pub fn server<S: Into<String>>(status: u16, msg: S) -> Self {
        AppError::Server { code: format!("http_{}", status), status, message: msg.into() }
    }

    pub fn is_network(&self) -> bool { matches!(self, AppError::Network { .. }) }

    pub fn is_auth(&self) -> bool {
        match self {
            AppError::Auth { .. } => true,
            AppError::Server { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }

    /// HTTP status when the error came from the backend.
    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message suitable for showing to the user. Transport failures collapse to a
    /// generic retry hint; everything else surfaces its own message.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network { .. } => SERVER_ERROR_MESSAGE.to_string(),
            other => other.message().to_string(),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::decode("decode_error".to_string(), err.to_string())
        } else if err.is_timeout() {
            AppError::network("timeout".to_string(), err.to_string())
        } else {
            AppError::network("network_error".to_string(), err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::decode("decode_error".to_string(), err.to_string())
    }
}

impl From<crate::session::StorageError> for AppError {
    fn from(err: crate::session::StorageError) -> Self {
        AppError::storage(err.code().to_string(), err.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
