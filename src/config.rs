//! Client configuration from environment variables.
//!
//! Recognized variables:
//! - `TEXTDASH_API_URL`: backend base URL (default `http://127.0.0.1:5000`)
//! - `TEXTDASH_SOCKET_URL`: push channel URL (default: API URL with ws/wss scheme)
//! - `TEXTDASH_DATA_DIR`: directory of the CLI's persistent store (default `.textdash`)
//! - `TEXTDASH_REQUEST_TIMEOUT_MS`: per-request timeout (default 15000)
//! - `TEXTDASH_RECONNECT_INITIAL_MS`, `TEXTDASH_RECONNECT_MAX_MS`, `TEXTDASH_RECONNECT_ATTEMPTS`

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";

/// Backoff applied by the notification channel between reconnect attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: u32,
    /// Consecutive failed attempts before giving up; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { initial: Duration::from_millis(500), max: Duration::from_secs(10), multiplier: 2, max_attempts: None }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based), or `None` when exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if let Some(limit) = self.max_attempts {
            if attempt > limit { return None; }
        }
        let factor = self.multiplier.max(1).saturating_pow(attempt.saturating_sub(1));
        Some(self.initial.saturating_mul(factor).min(self.max))
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: Url,
    pub socket_url: Url,
    pub data_dir: PathBuf,
    pub request_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    /// Config for a backend at `api_url`; the socket URL follows the same origin.
    pub fn new(api_url: &str) -> AppResult<Self> {
        let api = parse_url(api_url)?;
        let socket = socket_url_from_api(&api)?;
        Ok(Self {
            api_url: api,
            socket_url: socket,
            data_dir: PathBuf::from(".textdash"),
            request_timeout: Duration::from_millis(15_000),
            reconnect: ReconnectPolicy::default(),
        })
    }

    /// Point at another backend; the socket URL is derived from it again.
    pub fn with_api_url(mut self, api_url: &str) -> AppResult<Self> {
        self.api_url = parse_url(api_url)?;
        self.socket_url = socket_url_from_api(&self.api_url)?;
        Ok(self)
    }

    pub fn with_socket_url(mut self, socket_url: &str) -> AppResult<Self> {
        self.socket_url = parse_url(socket_url)?;
        Ok(self)
    }

    pub fn from_env() -> AppResult<Self> {
        let api = var("TEXTDASH_API_URL").unwrap_or_else(|| {
            info!(target: "config", "TEXTDASH_API_URL not set, using default: {}", DEFAULT_API_URL);
            DEFAULT_API_URL.to_string()
        });
        let mut cfg = Self::new(&api)?;
        if let Some(sock) = var("TEXTDASH_SOCKET_URL") {
            cfg = cfg.with_socket_url(&sock)?;
        }
        if let Some(dir) = var("TEXTDASH_DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        cfg.request_timeout = Duration::from_millis(try_load("TEXTDASH_REQUEST_TIMEOUT_MS", 15_000u64));
        let defaults = ReconnectPolicy::default();
        cfg.reconnect = ReconnectPolicy {
            initial: Duration::from_millis(try_load("TEXTDASH_RECONNECT_INITIAL_MS", defaults.initial.as_millis() as u64)),
            max: Duration::from_millis(try_load("TEXTDASH_RECONNECT_MAX_MS", defaults.max.as_millis() as u64)),
            multiplier: defaults.multiplier,
            max_attempts: var("TEXTDASH_RECONNECT_ATTEMPTS").and_then(|s| match s.parse::<u32>() {
                Ok(n) => Some(n),
                Err(e) => { warn!(target: "config", "Invalid TEXTDASH_RECONNECT_ATTEMPTS value: {}", e); None }
            }),
        };
        Ok(cfg)
    }

    /// Persistent store file used by the CLI.
    pub fn storage_path(&self) -> PathBuf { self.data_dir.join("storage.json") }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn try_load<T: FromStr + Display + Copy>(key: &str, default: T) -> T
where
    T::Err: Display,
{
    match var(key) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!(target: "config", "Invalid {} value: {}, using default {}", key, e, default);
            default
        }),
    }
}

fn parse_url(raw: &str) -> AppResult<Url> {
    Url::parse(raw).map_err(|e| AppError::validation("invalid_url".to_string(), format!("invalid URL '{}': {}", raw, e)))
}

/// Convert http(s)://host[:port][/path] -> ws(s)://host[:port][/path]
pub fn socket_url_from_api(api: &Url) -> AppResult<Url> {
    let mut ws = api.clone();
    let scheme = match api.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    ws.set_scheme(scheme)
        .map_err(|_| AppError::validation("invalid_url".to_string(), format!("cannot derive socket URL from '{}'", api)))?;
    Ok(ws)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_url_follows_api_origin() {
        let cfg = ClientConfig::new("https://dash.example.com:8443").unwrap();
        assert_eq!(cfg.socket_url.as_str(), "wss://dash.example.com:8443/");
        let cfg = ClientConfig::new("http://127.0.0.1:5000").unwrap();
        assert_eq!(cfg.socket_url.as_str(), "ws://127.0.0.1:5000/");
        let cfg = cfg.with_socket_url("ws://push.local:9000/socket").unwrap();
        assert_eq!(cfg.socket_url.as_str(), "ws://push.local:9000/socket");
    }

    #[test]
    fn invalid_url_is_validation_error() {
        let err = ClientConfig::new("not a url").unwrap_err();
        assert_eq!(err.code_str(), "invalid_url");
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = ReconnectPolicy::default();
        assert_eq!(p.delay_for(1), Some(Duration::from_millis(500)));
        assert_eq!(p.delay_for(2), Some(Duration::from_millis(1000)));
        assert_eq!(p.delay_for(3), Some(Duration::from_millis(2000)));
        assert_eq!(p.delay_for(10), Some(Duration::from_secs(10)));
        assert_eq!(p.delay_for(200), Some(Duration::from_secs(10)));
    }

    #[test]
    fn backoff_respects_attempt_limit() {
        let p = ReconnectPolicy { max_attempts: Some(2), ..ReconnectPolicy::default() };
        assert!(p.delay_for(2).is_some());
        assert!(p.delay_for(3).is_none());
    }
}
