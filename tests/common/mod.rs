//! In-process stub of the dashboard backend (HTTP + WebSocket) on an ephemeral port.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use textdash::config::ClientConfig;
use textdash::session::{KeyValueStore, MemoryStore, Window};
use textdash::App;

#[derive(Clone)]
pub struct StubUser {
    pub id: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

impl StubUser {
    fn json(&self) -> Value {
        json!({"_id": self.id, "email": self.email, "role": self.role})
    }
}

pub struct StubState {
    pub users: Mutex<Vec<StubUser>>,
    pub tokens: Mutex<HashMap<String, String>>,
    pub submissions: Mutex<Vec<Value>>,
    pub events: broadcast::Sender<String>,
    /// (x-window-session, authorization) of every socket connection.
    pub socket_headers: Mutex<Vec<(Option<String>, Option<String>)>>,
    pub socket_connects: AtomicUsize,
    pub login_delay: Mutex<Option<Duration>>,
    next_token: AtomicUsize,
}

impl StubState {
    fn issue_token(&self, user_id: &str) -> String {
        let n = self.next_token.fetch_add(1, Ordering::SeqCst);
        let token = format!("tok-{}-{}", user_id, n);
        self.tokens.lock().insert(token.clone(), user_id.to_string());
        token
    }

    fn user_for(&self, headers: &HeaderMap) -> Option<StubUser> {
        let auth = headers.get("authorization")?.to_str().ok()?;
        let token = auth.strip_prefix("Bearer ")?;
        let id = self.tokens.lock().get(token).cloned()?;
        self.users.lock().iter().find(|u| u.id == id).cloned()
    }
}

pub struct Stub {
    pub addr: SocketAddr,
    pub state: Arc<StubState>,
}

impl Stub {
    pub fn api_url(&self) -> String { format!("http://{}", self.addr) }
    pub fn socket_url(&self) -> String { format!("ws://{}/ws", self.addr) }

    pub fn config(&self) -> ClientConfig {
        let mut cfg = ClientConfig::new(&self.api_url())
            .and_then(|c| c.with_socket_url(&self.socket_url()))
            .unwrap();
        cfg.reconnect.initial = Duration::from_millis(20);
        cfg.reconnect.max = Duration::from_millis(100);
        cfg
    }

    /// Push a raw text frame to every connected socket.
    pub fn emit(&self, frame: &str) {
        let _ = self.state.events.send(frame.to_string());
    }

    pub fn revoke_all_tokens(&self) { self.state.tokens.lock().clear(); }
}

/// A fresh window sharing `persistent` with other windows of the same "host".
pub fn window(persistent: &Arc<dyn KeyValueStore>) -> Window {
    Window::open(persistent.clone())
}

pub fn shared_storage() -> Arc<dyn KeyValueStore> { Arc::new(MemoryStore::new()) }

pub fn app(stub: &Stub, window: Window) -> App { App::new(stub.config(), window).unwrap() }

fn err(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"message": message}))).into_response()
}

async fn login(State(st): State<Arc<StubState>>, Json(body): Json<Value>) -> Response {
    let delay = *st.login_delay.lock();
    if let Some(d) = delay {
        tokio::time::sleep(d).await;
    }
    let email = body.get("email").and_then(Value::as_str).unwrap_or("");
    let password = body.get("password").and_then(Value::as_str).unwrap_or("");
    let user = st.users.lock().iter().find(|u| u.email == email && u.password == password).cloned();
    match user {
        Some(u) => {
            let token = st.issue_token(&u.id);
            Json(json!({"token": token, "user": u.json()})).into_response()
        }
        None => err(StatusCode::UNAUTHORIZED, "bad creds"),
    }
}

async fn register(State(st): State<Arc<StubState>>, Json(body): Json<Value>) -> Response {
    let email = body.get("email").and_then(Value::as_str).unwrap_or("").to_string();
    let password = body.get("password").and_then(Value::as_str).unwrap_or("").to_string();
    let role = body.get("role").and_then(Value::as_str).unwrap_or("user").to_string();
    let user = {
        let mut users = st.users.lock();
        if users.iter().any(|u| u.email == email) {
            return err(StatusCode::BAD_REQUEST, "User already exists");
        }
        let u = StubUser { id: (users.len() + 1).to_string(), email, password, role };
        users.push(u.clone());
        u
    };
    let token = st.issue_token(&user.id);
    (StatusCode::CREATED, Json(json!({"token": token, "user": user.json()}))).into_response()
}

async fn current_user(State(st): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    match st.user_for(&headers) {
        Some(u) => Json(json!({"user": u.json()})).into_response(),
        None => err(StatusCode::UNAUTHORIZED, "Invalid token"),
    }
}

async fn submit(State(st): State<Arc<StubState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let Some(u) = st.user_for(&headers) else { return err(StatusCode::UNAUTHORIZED, "Invalid token") };
    if u.role != "developer" && u.role != "admin" {
        return err(StatusCode::FORBIDDEN, "Access denied");
    }
    let text = body.get("text").and_then(Value::as_str).unwrap_or("").to_string();
    let id = format!("s{}", st.submissions.lock().len() + 1);
    let created = chrono::Utc::now().to_rfc3339();
    let submission = json!({"_id": id, "text": text, "userId": {"_id": u.id, "email": u.email}, "createdAt": created});
    st.submissions.lock().insert(0, submission.clone());
    let event = json!({"event": "newSubmission", "data": {
        "submittedText": text, "submissionTime": created, "username": u.email,
        "userId": u.id, "email": u.email, "role": u.role,
    }});
    let _ = st.events.send(event.to_string());
    (StatusCode::CREATED, Json(json!({"message": "Text submitted successfully", "submission": submission}))).into_response()
}

async fn submissions(State(st): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    match st.user_for(&headers) {
        Some(u) if u.role == "developer" || u.role == "admin" => Json(Value::Array(st.submissions.lock().clone())).into_response(),
        Some(_) => err(StatusCode::FORBIDDEN, "Access denied"),
        None => err(StatusCode::UNAUTHORIZED, "Invalid token"),
    }
}

fn require_admin(st: &StubState, headers: &HeaderMap) -> Result<StubUser, Response> {
    match st.user_for(headers) {
        Some(u) if u.role == "admin" => Ok(u),
        Some(_) => Err(err(StatusCode::FORBIDDEN, "Access denied")),
        None => Err(err(StatusCode::UNAUTHORIZED, "Invalid token")),
    }
}

async fn users(State(st): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    if let Err(r) = require_admin(&st, &headers) { return r; }
    let list: Vec<Value> = st.users.lock().iter().map(StubUser::json).collect();
    Json(list).into_response()
}

async fn update_role(State(st): State<Arc<StubState>>, headers: HeaderMap, Path(id): Path<String>, Json(body): Json<Value>) -> Response {
    if let Err(r) = require_admin(&st, &headers) { return r; }
    let role = body.get("role").and_then(Value::as_str).unwrap_or("").to_string();
    let mut users = st.users.lock();
    match users.iter_mut().find(|u| u.id == id) {
        Some(u) => {
            u.role = role;
            Json(json!({"message": "User role updated", "user": u.json()})).into_response()
        }
        None => err(StatusCode::NOT_FOUND, "User not found"),
    }
}

async fn statistics(State(st): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    if let Err(r) = require_admin(&st, &headers) { return r; }
    let stats = json!({
        "totalUsers": st.users.lock().len(),
        "textSubmissions": st.submissions.lock().len(),
        "activeSessions": st.tokens.lock().len(),
    });
    Json(stats).into_response()
}

async fn socket(State(st): State<Arc<StubState>>, headers: HeaderMap, ws: WebSocketUpgrade) -> Response {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    st.socket_headers.lock().push((header("x-window-session"), header("authorization")));
    st.socket_connects.fetch_add(1, Ordering::SeqCst);
    let rx = st.events.subscribe();
    ws.on_upgrade(move |socket| forward(socket, rx))
}

async fn forward(mut socket: WebSocket, mut rx: broadcast::Receiver<String>) {
    while let Ok(frame) = rx.recv().await {
        if socket.send(Message::Text(frame.into())).await.is_err() {
            break;
        }
    }
}

// Accepts the upgrade and hangs up straight away.
async fn socket_drop(State(st): State<Arc<StubState>>, ws: WebSocketUpgrade) -> Response {
    st.socket_connects.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(|mut socket: WebSocket| async move {
        let _ = socket.send(Message::Close(None)).await;
    })
}

pub async fn spawn_stub() -> Stub {
    let (events, _) = broadcast::channel(64);
    let seed = [
        ("1", "admin@example.com", "admin-pw", "admin"),
        ("2", "dev@example.com", "dev-pw", "developer"),
        ("3", "user@example.com", "user-pw", "user"),
    ];
    let state = Arc::new(StubState {
        users: Mutex::new(
            seed.iter()
                .map(|(id, email, pw, role)| StubUser { id: id.to_string(), email: email.to_string(), password: pw.to_string(), role: role.to_string() })
                .collect(),
        ),
        tokens: Mutex::new(HashMap::new()),
        submissions: Mutex::new(Vec::new()),
        events,
        socket_headers: Mutex::new(Vec::new()),
        socket_connects: AtomicUsize::new(0),
        login_delay: Mutex::new(None),
        next_token: AtomicUsize::new(1),
    });
    let router = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/user", get(current_user))
        .route("/api/text/submit", post(submit))
        .route("/api/text/submissions", get(submissions))
        .route("/api/users", get(users))
        .route("/api/users/statistics", get(statistics))
        .route("/api/users/{id}/role", put(update_role))
        .route("/ws", get(socket))
        .route("/ws-drop", get(socket_drop))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Stub { addr, state }
}

/// An address nothing listens on.
pub async fn dead_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Wait until `cond` holds, polling every 10ms, for at most `timeout`.
pub async fn wait_for<F: FnMut() -> bool>(timeout: Duration, mut cond: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() { return true; }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
