//!
//! textdash notification channel
//! ------------------------------
//! Long-lived WebSocket subscription to the backend's `newSubmission` event. Each
//! event is normalized into a `Notification` and prepended to an in-memory list
//! (newest first). Nothing is persisted, deduplicated or acknowledged.
//!
//! Accepted frames:
//! - `{"event": "newSubmission", "data": {...}}` (also `type` / `payload`)
//! - `["newSubmission", {...}]`, optionally behind a numeric packet prefix (`42[...]`)
//!
//! Reconnects follow the configured `ReconnectPolicy`; the attempt counter resets
//! after every successful connect.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use parking_lot::RwLock;
use reqwest::Url;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, ReconnectPolicy};
use crate::error::{AppError, AppResult};
use crate::model::Role;
use crate::session::WindowSessionId;

pub const NEW_SUBMISSION_EVENT: &str = "newSubmission";
/// Header correlating the socket with the window session.
pub const WINDOW_SESSION_HEADER: &str = "x-window-session";

fn deserialize_opt_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionEvent {
    #[serde(default)]
    pub submitted_text: String,
    #[serde(default)]
    pub submission_time: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub username: Option<String>,
    pub user_id: Option<String>,
    pub kind: String,
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl Notification {
    /// Normalize an event; an absent or unparsable submission time falls back to
    /// `received_at`.
    pub fn from_event(ev: SubmissionEvent, received_at: DateTime<Utc>) -> Self {
        let timestamp = ev
            .submission_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(received_at);
        Self {
            message: ev.submitted_text,
            timestamp,
            username: ev.username,
            user_id: ev.user_id,
            kind: NEW_SUBMISSION_EVENT.to_string(),
            email: ev.email,
            role: ev.role.and_then(|r| r.parse().ok()),
        }
    }
}

/// Extract a `newSubmission` payload from a text frame, ignoring anything else.
pub fn parse_frame(text: &str) -> Option<SubmissionEvent> {
    let body = text.trim_start_matches(|c: char| c.is_ascii_digit());
    let v: Value = serde_json::from_str(body).ok()?;
    let data = match &v {
        Value::Array(items) => {
            if items.first().and_then(|e| e.as_str()) != Some(NEW_SUBMISSION_EVENT) { return None; }
            items.get(1)?.clone()
        }
        Value::Object(map) => {
            let name = map.get("event").or_else(|| map.get("type")).and_then(|e| e.as_str());
            if name != Some(NEW_SUBMISSION_EVENT) { return None; }
            map.get("data").or_else(|| map.get("payload"))?.clone()
        }
        _ => return None,
    };
    match serde_json::from_value(data) {
        Ok(ev) => Some(ev),
        Err(e) => {
            debug!(target: "notify", "malformed {} payload: {}", NEW_SUBMISSION_EVENT, e);
            None
        }
    }
}

/// Shared, newest-first notification list. Clones observe the same list.
#[derive(Clone)]
pub struct NotificationList {
    entries: Arc<RwLock<Entries>>,
    version: Arc<watch::Sender<u64>>,
}

#[derive(Default)]
struct Entries {
    items: Vec<Notification>,
    /// Total pushes ever made; never reset by `clear`.
    pushed: u64,
}

impl Default for NotificationList {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(0u64);
        Self { entries: Arc::new(RwLock::new(Entries::default())), version: Arc::new(tx) }
    }
}

impl NotificationList {
    pub fn new() -> Self { Self::default() }

    pub fn push(&self, n: Notification) {
        {
            let mut e = self.entries.write();
            e.items.insert(0, n);
            e.pushed += 1;
        }
        self.version.send_modify(|v| *v += 1);
    }

    pub fn clear(&self) {
        self.entries.write().items.clear();
        self.version.send_modify(|v| *v += 1);
    }

    pub fn snapshot(&self) -> Vec<Notification> { self.entries.read().items.clone() }
    pub fn len(&self) -> usize { self.entries.read().items.len() }
    pub fn is_empty(&self) -> bool { self.entries.read().items.is_empty() }

    /// Notifications pushed after `cursor` that are still listed, newest first,
    /// and the cursor to pass next time. Start from `0`.
    pub fn pushed_since(&self, cursor: u64) -> (u64, Vec<Notification>) {
        let e = self.entries.read();
        let fresh = e.pushed.saturating_sub(cursor).min(e.items.len() as u64) as usize;
        (e.pushed, e.items[..fresh].to_vec())
    }

    /// Receiver bumped on every change.
    pub fn subscribe(&self) -> watch::Receiver<u64> { self.version.subscribe() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// Reconnect attempts exhausted.
    Closed,
}

/// One open push connection. Dropping the handle closes it.
#[derive(Debug)]
pub struct NotificationChannel {
    task: JoinHandle<()>,
    status: watch::Receiver<ChannelStatus>,
}

impl NotificationChannel {
    /// Open on the ambient Tokio runtime. Fails instead of panicking when called
    /// outside one.
    pub fn open(config: &ClientConfig, window: Option<WindowSessionId>, token: Option<String>, list: NotificationList) -> AppResult<Self> {
        let handle = Handle::try_current()
            .map_err(|e| AppError::runtime("no_runtime", format!("notification channel needs a Tokio runtime: {}", e)))?;
        Ok(Self::open_on(&handle, config, window, token, list))
    }

    pub fn open_on(
        handle: &Handle,
        config: &ClientConfig,
        window: Option<WindowSessionId>,
        token: Option<String>,
        list: NotificationList,
    ) -> Self {
        let (status_tx, status) = watch::channel(ChannelStatus::Connecting);
        let url = config.socket_url.clone();
        let policy = config.reconnect.clone();
        let task = handle.spawn(run_channel(url, window, token, list, policy, status_tx));
        Self { task, status }
    }

    pub fn status(&self) -> ChannelStatus { *self.status.borrow() }

    pub fn watch_status(&self) -> watch::Receiver<ChannelStatus> { self.status.clone() }

    pub fn close(self) {}
}

impl Drop for NotificationChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_channel(
    url: Url,
    window: Option<WindowSessionId>,
    token: Option<String>,
    list: NotificationList,
    policy: ReconnectPolicy,
    status: watch::Sender<ChannelStatus>,
) {
    let mut attempt = 0u32;
    loop {
        match connect_once(&url, window.as_ref(), token.as_deref()).await {
            Ok(mut stream) => {
                attempt = 0;
                status.send_replace(ChannelStatus::Connected);
                info!(target: "notify", %url, "notification channel connected");
                while let Some(msg) = stream.next().await {
                    match msg {
                        Ok(Message::Text(text)) => {
                            if let Some(ev) = parse_frame(&text) {
                                list.push(Notification::from_event(ev, Utc::now()));
                            }
                        }
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            warn!(target: "notify", "socket error: {}", e);
                            break;
                        }
                    }
                }
                info!(target: "notify", "notification channel disconnected");
            }
            Err(e) => warn!(target: "notify", %url, "connect failed: {}", e),
        }
        attempt += 1;
        let Some(delay) = policy.delay_for(attempt) else {
            warn!(target: "notify", attempts = attempt - 1, "giving up on notification channel");
            status.send_replace(ChannelStatus::Closed);
            return;
        };
        status.send_replace(ChannelStatus::Reconnecting { attempt });
        debug!(target: "notify", attempt, delay_ms = delay.as_millis() as u64, "reconnecting");
        tokio::time::sleep(delay).await;
    }
}

async fn connect_once(
    url: &Url,
    window: Option<&WindowSessionId>,
    token: Option<&str>,
) -> AppResult<tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>> {
    let ws_err = |e: &dyn std::fmt::Display| AppError::network("socket_error".to_string(), e.to_string());
    let mut req = url.as_str().into_client_request().map_err(|e| ws_err(&e))?;
    if let Some(w) = window {
        req.headers_mut().insert(WINDOW_SESSION_HEADER, HeaderValue::from_str(w.as_str()).map_err(|e| ws_err(&e))?);
    }
    if let Some(t) = token {
        req.headers_mut().insert("authorization", HeaderValue::from_str(&format!("Bearer {}", t)).map_err(|e| ws_err(&e))?);
    }
    let (stream, _resp) = tokio_tungstenite::connect_async(req).await.map_err(|e| ws_err(&e))?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_both_envelopes() {
        let obj = r#"{"event":"newSubmission","data":{"submittedText":"hi","submissionTime":"2024-03-01T10:00:00Z","username":"dev","userId":"u1","email":"dev@x.com","role":"developer"}}"#;
        let ev = parse_frame(obj).unwrap();
        assert_eq!(ev.submitted_text, "hi");
        assert_eq!(ev.user_id.as_deref(), Some("u1"));

        let arr = r#"42["newSubmission",{"submittedText":"yo","userId":5}]"#;
        let ev = parse_frame(arr).unwrap();
        assert_eq!(ev.submitted_text, "yo");
        assert_eq!(ev.user_id.as_deref(), Some("5"));
    }

    #[test]
    fn ignores_other_events_and_garbage() {
        assert!(parse_frame(r#"{"event":"userJoined","data":{}}"#).is_none());
        assert!(parse_frame(r#"["ping"]"#).is_none());
        assert!(parse_frame("not json").is_none());
        assert!(parse_frame("3").is_none());
    }

    #[test]
    fn normalization_maps_fields() {
        let received = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let ev = SubmissionEvent {
            submitted_text: "hello".into(),
            submission_time: Some("2024-03-01T10:00:00Z".into()),
            username: Some("dev".into()),
            user_id: Some("u1".into()),
            email: Some("dev@x.com".into()),
            role: Some("admin".into()),
        };
        let n = Notification::from_event(ev, received);
        assert_eq!(n.message, "hello");
        assert_eq!(n.kind, NEW_SUBMISSION_EVENT);
        assert_eq!(n.role, Some(Role::Admin));
        assert_eq!(n.timestamp, Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());

        let n = Notification::from_event(SubmissionEvent { submission_time: Some("yesterday".into()), ..Default::default() }, received);
        assert_eq!(n.timestamp, received);
        assert_eq!(n.role, None);
    }

    #[test]
    fn list_prepends_and_clears() {
        let list = NotificationList::new();
        let rx = list.subscribe();
        let at = Utc::now();
        for text in ["first", "second"] {
            list.push(Notification::from_event(SubmissionEvent { submitted_text: text.into(), ..Default::default() }, at));
        }
        let snap = list.snapshot();
        assert_eq!(snap.iter().map(|n| n.message.as_str()).collect::<Vec<_>>(), vec!["second", "first"]);
        assert_eq!(*rx.borrow(), 2);
        list.clear();
        assert!(list.is_empty());
        list.clear();
        assert_eq!(list.len(), 0);
        assert_eq!(*rx.borrow(), 4);
    }

    #[test]
    fn pushed_since_survives_clear_between_reads() {
        let list = NotificationList::new();
        let at = Utc::now();
        let push = |text: &str| list.push(Notification::from_event(SubmissionEvent { submitted_text: text.into(), ..Default::default() }, at));
        push("a");
        push("b");
        let (cursor, fresh) = list.pushed_since(0);
        assert_eq!(fresh.len(), 2);

        // cleared and refilled before the reader looked again: the list is shorter
        // than what was already shown, yet "c" is still new
        list.clear();
        push("c");
        let (cursor, fresh) = list.pushed_since(cursor);
        assert_eq!(fresh.iter().map(|n| n.message.as_str()).collect::<Vec<_>>(), vec!["c"]);

        let (_, fresh) = list.pushed_since(cursor);
        assert!(fresh.is_empty());
    }
}
