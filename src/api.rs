//!
//! textdash API client
//! --------------------
//! Thin HTTP wrapper over the dashboard backend. Every request carries the current
//! window's bearer token when one is stored; every response is normalized into either
//! a JSON value or an `AppError`:
//! - non-2xx -> `AppError::Server` with the backend's `message` (or `Error {status}: {reason}`)
//! - transport failure -> `AppError::Network` (`timeout` or `network_error`)
//!
//! Requests are never retried here.

use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{AppError, AppResult};
use crate::model::{AuthGrant, Role, Statistics, Submission, User};
use crate::session::{NamespacedStore, TOKEN_KEY};

#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    client: reqwest::Client,
    store: NamespacedStore,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, store: NamespacedStore) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { base: config.api_url.clone(), client, store })
    }

    pub fn base(&self) -> &Url { &self.base }

    /// Bearer token of the current window, if any.
    pub fn token(&self) -> Option<String> {
        self.store.get_item(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    fn url(&self, path: &str) -> AppResult<Url> {
        // concatenate rather than join so a base path prefix (e.g. /backend) survives
        let raw = format!("{}/{}", self.base.as_str().trim_end_matches('/'), path.trim_start_matches('/'));
        Url::parse(&raw).map_err(|e| AppError::validation("invalid_url".to_string(), format!("invalid request URL '{}': {}", raw, e)))
    }

    /// Authenticated request using the stored token.
    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> AppResult<Value> {
        let token = self.token();
        self.send(method, path, body, token.as_deref()).await
    }

    /// Request with an explicit bearer token (or none).
    pub async fn send(&self, method: Method, path: &str, body: Option<&Value>, token: Option<&str>) -> AppResult<Value> {
        let url = self.url(path)?;
        let mut req = self.client.request(method.clone(), url);
        if let Some(t) = token {
            let hv = HeaderValue::from_str(&format!("Bearer {}", t))
                .map_err(|_| AppError::auth("invalid_token", "stored token is not a valid header value"))?;
            req = req.header(AUTHORIZATION, hv);
        }
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req.send().await.map_err(|e| {
            warn!(target: "api", %method, path, "network error: {}", e);
            AppError::from(e)
        })?;
        let status = resp.status();
        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.to_ascii_lowercase().contains("json"))
            .unwrap_or(false);
        let text = resp.text().await.map_err(AppError::from)?;
        debug!(target: "api", %method, path, status = status.as_u16(), bytes = text.len(), "response");

        let parsed = parse_body(&text, is_json);
        if !status.is_success() {
            let body = parsed.unwrap_or(Value::Null);
            return Err(AppError::server(status.as_u16(), server_message(status, &body)));
        }
        parsed
    }

    async fn call<T: DeserializeOwned>(&self, method: Method, path: &str, body: Option<&Value>, key: &str) -> AppResult<T> {
        let v = self.request(method, path, body).await?;
        extract(v, key)
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthGrant> {
        let body = json!({"email": email, "password": password});
        let v = self.send(Method::POST, "/api/auth/login", Some(&body), None).await?;
        AuthGrant::from_value(v)
    }

    pub async fn register(&self, email: &str, password: &str, role: Role) -> AppResult<AuthGrant> {
        let body = json!({"email": email, "password": password, "role": role});
        let v = self.send(Method::POST, "/api/auth/register", Some(&body), None).await?;
        AuthGrant::from_value(v)
    }

    /// "Who am I" for an explicit token.
    pub async fn current_user(&self, token: &str) -> AppResult<User> {
        let v = self.send(Method::GET, "/api/auth/user", None, Some(token)).await?;
        extract(v, "user")
    }

    pub async fn submit_text(&self, text: &str) -> AppResult<Submission> {
        self.call(Method::POST, "/api/text/submit", Some(&json!({"text": text})), "submission").await
    }

    pub async fn submissions(&self) -> AppResult<Vec<Submission>> {
        self.call(Method::GET, "/api/text/submissions", None, "submissions").await
    }

    pub async fn users(&self) -> AppResult<Vec<User>> {
        self.call(Method::GET, "/api/users", None, "users").await
    }

    pub async fn update_user_role(&self, user_id: &str, role: Role) -> AppResult<User> {
        let path = format!("/api/users/{}/role", urlencoding::encode(user_id));
        self.call(Method::PUT, &path, Some(&json!({"role": role})), "user").await
    }

    pub async fn statistics(&self) -> AppResult<Statistics> {
        self.call(Method::GET, "/api/users/statistics", None, "statistics").await
    }
}

fn parse_body(text: &str, is_json: bool) -> AppResult<Value> {
    if text.trim().is_empty() { return Ok(Value::Null); }
    if is_json {
        return serde_json::from_str(text).map_err(AppError::from);
    }
    Ok(Value::String(text.to_string()))
}

fn server_message(status: StatusCode, body: &Value) -> String {
    if let Some(m) = body.get("message").and_then(|m| m.as_str()).filter(|m| !m.is_empty()) {
        return m.to_string();
    }
    format!("Error {}: {}", status.as_u16(), status.canonical_reason().unwrap_or("Unknown"))
}

/// Decode either `{key: T}` or a bare `T`.
fn extract<T: DeserializeOwned>(v: Value, key: &str) -> AppResult<T> {
    if let Some(inner) = v.get(key) {
        if let Ok(t) = serde_json::from_value::<T>(inner.clone()) { return Ok(t); }
    }
    serde_json::from_value(v).map_err(AppError::from)
}
