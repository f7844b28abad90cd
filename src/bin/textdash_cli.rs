//!
//! textdash CLI binary
//! --------------------
//! Interactive terminal front end for the text submission dashboard. Each process
//! is one window: it gets its own window session id, so several terminals can be
//! signed in as different users against the same data directory.

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use textdash::cli::outputformatter::print_value;
use textdash::cli::{Command, HELP};
use textdash::config::ClientConfig;
use textdash::session::{FileStore, KeyValueStore, MemoryStore, Window};
use textdash::views::{DashboardStats, LoginForm, RegisterForm, RouteDecision, SubmissionFeed, TextSubmissionForm, UserDirectory};
use textdash::App;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--api-url <url>] [--socket-url <url>] [--data-dir <path>]\n\nFlags:\n  --api-url <url>      Backend base URL (env TEXTDASH_API_URL, default http://127.0.0.1:5000)\n  --socket-url <url>   Notification socket URL (env TEXTDASH_SOCKET_URL, default: API URL with ws/wss)\n  --data-dir <path>    Directory holding the persistent store (env TEXTDASH_DATA_DIR, default .textdash)\n  -h, --help           Show this help\n\n{HELP}"
    );
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("invalid RUST_LOG filter")?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| "textdash".to_string());
    let mut api_url: Option<String> = None;
    let mut socket_url: Option<String> = None;
    let mut data_dir: Option<String> = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage(&program);
                return Ok(());
            }
            flag @ ("--api-url" | "--socket-url" | "--data-dir") => {
                let Some(v) = args.get(i + 1).cloned() else {
                    eprintln!("{} requires a value", flag);
                    print_usage(&program);
                    std::process::exit(2);
                };
                match flag {
                    "--api-url" => api_url = Some(v),
                    "--socket-url" => socket_url = Some(v),
                    _ => data_dir = Some(v),
                }
                i += 2;
            }
            unk => {
                eprintln!("Unrecognized argument: {}", unk);
                print_usage(&program);
                std::process::exit(2);
            }
        }
    }

    // flags override env; an explicit socket URL survives an --api-url override
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = api_url {
        config = config.with_api_url(&url)?;
        if let Ok(sock) = env::var("TEXTDASH_SOCKET_URL") {
            config = config.with_socket_url(&sock)?;
        }
    }
    if let Some(url) = socket_url {
        config = config.with_socket_url(&url)?;
    }
    if let Some(dir) = data_dir {
        config.data_dir = dir.into();
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    let window = open_window(&config);
    let app = App::new(config, window)?.with_runtime(rt.handle().clone());
    info!(target: "cli", api = %app.config().api_url, socket = %app.config().socket_url, "textdash starting");

    let state = rt.block_on(app.mount());
    match &state.user {
        Some(u) => println!("signed in as {} ({})", u.email, u.role),
        None => println!("not signed in"),
    }
    spawn_toasts(&rt, &app);
    run_repl(rt, app)
}

// One process is one window: window-scoped storage lives in memory, the
// persistent store is shared through the data directory.
fn open_window(config: &ClientConfig) -> Window {
    let transient: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    match FileStore::open(config.storage_path()) {
        Ok(store) => Window::with_stores(Some(transient), Some(Arc::new(store))),
        Err(e) => {
            warn!(target: "cli", path = %config.storage_path().display(), "persistent storage unavailable: {}", e);
            Window::with_stores(Some(transient), None)
        }
    }
}

fn spawn_toasts(rt: &tokio::runtime::Runtime, app: &App) {
    let list = app.notifications().clone();
    let mut rx = list.subscribe();
    rt.spawn(async move {
        let mut cursor = 0u64;
        while rx.changed().await.is_ok() {
            let (next, fresh) = list.pushed_since(cursor);
            cursor = next;
            for n in fresh.iter().rev() {
                println!("\n[new submission] {} by {}: {}", n.timestamp.format("%H:%M:%S"), n.username.as_deref().unwrap_or("unknown"), n.message);
            }
        }
    });
}

fn to_json<T: Serialize>(v: &T) -> Value {
    serde_json::to_value(v).unwrap_or(Value::Null)
}

struct Repl {
    app: App,
    rt: tokio::runtime::Runtime,
    feed: SubmissionFeed,
    users: UserDirectory,
    stats: DashboardStats,
}

fn run_repl(rt: tokio::runtime::Runtime, app: App) -> Result<()> {
    let mut rl = DefaultEditor::new().context("Failed to initialize line editor")?;
    let mut repl = Repl { rt, app, feed: SubmissionFeed::default(), users: UserDirectory::default(), stats: DashboardStats::default() };
    println!("textdash interpreter. Type 'help' for commands.");
    loop {
        let line = match rl.readline("> ") {
            Ok(l) => l,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("Failed to read input"),
        };
        let cmd = match Command::parse(&line) {
            Ok(Some(c)) => c,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{}", e.message());
                continue;
            }
        };
        if !cmd.is_sensitive() {
            let _ = rl.add_history_entry(line.as_str());
        }
        if cmd == Command::Quit { break; }
        repl.execute(cmd);
    }
    repl.app.close_notifications();
    Ok(())
}

impl Repl {
    fn execute(&mut self, cmd: Command) {
        if let Some(route) = cmd.route() {
            match self.app.guard(route) {
                RouteDecision::Render => {}
                RouteDecision::Loading => {
                    println!("still loading, try again in a moment");
                    return;
                }
                RouteDecision::Redirect(to) => {
                    println!("{} is not available; redirected to {}", route, to);
                    return;
                }
            }
        }
        let app = &self.app;
        match cmd {
            Command::Login { email, password } => {
                let form = LoginForm::new(email, password);
                if let Err(e) = form.validate() {
                    eprintln!("{}", e.message());
                    return;
                }
                match self.rt.block_on(app.login(&form.email, &form.password)) {
                    Some(route) => println!("signed in as {}; now at {}", form.email, route),
                    None => eprintln!("login failed: {}", app.state().error.unwrap_or_else(|| "another sign-in is in progress".to_string())),
                }
            }
            Command::Register { email, password, confirm, role } => {
                let form = RegisterForm { email, password, confirm_password: confirm, role };
                if let Err(e) = form.validate() {
                    eprintln!("{}", e.message());
                    return;
                }
                match self.rt.block_on(app.register(&form.email, &form.password, form.role)) {
                    Some(route) => println!("registered {} as {}; now at {}", form.email, form.role, route),
                    None => eprintln!("registration failed: {}", app.state().error.unwrap_or_else(|| "another sign-in is in progress".to_string())),
                }
            }
            Command::Logout => {
                let route = app.logout();
                self.feed = SubmissionFeed::default();
                self.users = UserDirectory::default();
                self.stats = DashboardStats::default();
                println!("signed out; now at {}", route);
            }
            Command::WhoAmI => print_value(&to_json(&app.state().user)),
            Command::Submit(text) => {
                let user = app.state().user;
                let mut form = TextSubmissionForm::new(text);
                match self.rt.block_on(form.submit(app.api(), user.as_ref())) {
                    Ok(s) => {
                        println!("submitted");
                        self.feed.prepend(s);
                    }
                    Err(e) => eprintln!("{}", e.user_message()),
                }
            }
            Command::Submissions => {
                let state = app.state();
                match self.rt.block_on(self.feed.load(app.api(), &state)) {
                    Ok(()) if self.feed.is_empty() => println!("no submissions yet"),
                    Ok(()) => print_value(&to_json(&self.feed.submissions)),
                    Err(e) => eprintln!("{}", self.feed.error.clone().unwrap_or_else(|| e.user_message())),
                }
            }
            Command::Users => {
                let state = app.state();
                match self.rt.block_on(self.users.load(app.api(), &state)) {
                    Ok(()) => print_value(&to_json(&self.users.users)),
                    Err(e) => eprintln!("{}", self.users.error.clone().unwrap_or_else(|| e.user_message())),
                }
            }
            Command::SetRole { user_id, role } => {
                let state = app.state();
                match self.rt.block_on(self.users.change_role(app.api(), &state, &user_id, role)) {
                    Ok(()) => println!("user {} is now {}", user_id, role),
                    Err(e) => eprintln!("{}", e.user_message()),
                }
            }
            Command::Stats => {
                let state = app.state();
                match self.rt.block_on(self.stats.load(app.api(), &state)) {
                    Ok(s) => print_value(&json!([s])),
                    Err(e) => eprintln!("{}", e.user_message()),
                }
            }
            Command::Notify(true) => match app.open_notifications() {
                Ok(true) => println!("notification channel opened ({})", app.config().socket_url),
                Ok(false) => println!("sign in first"),
                Err(e) => eprintln!("{}", e.user_message()),
            },
            Command::Notify(false) => {
                app.close_notifications();
                println!("notification channel closed");
            }
            Command::Notifications => {
                let items = app.notifications().snapshot();
                if items.is_empty() {
                    println!("no notifications");
                } else {
                    print_value(&to_json(&items));
                }
            }
            Command::Clear => {
                app.clear_notifications();
                println!("notifications cleared");
            }
            Command::Status => {
                let state = app.state();
                let status = json!({
                    "window": app.window().session_id().map(|w| w.to_string()),
                    "phase": format!("{:?}", state.phase()),
                    "user": state.user.as_ref().map(|u| u.email.clone()),
                    "role": state.role().map(|r| r.to_string()),
                    "error": state.error,
                    "api": app.config().api_url.to_string(),
                    "channel": app.notification_status().map(|s| format!("{:?}", s)),
                    "notifications": app.notifications().len(),
                });
                print_value(&status);
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => {}
        }
    }
}
