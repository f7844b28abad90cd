//! Terminal front end helpers: REPL command parsing and table output.

pub mod outputformatter;

use crate::error::{AppError, AppResult};
use crate::model::Role;
use crate::views::Route;

pub const HELP: &str = "Commands:
  login <email> <password>                 sign in
  register <email> <password> <confirm> [role]  create an account (role: user|developer|admin)
  logout                                   sign out of this window
  whoami                                   show the signed-in user
  submit <text...>                         submit text (developer|admin)
  submissions                              list submissions (developer|admin)
  users                                    list users (admin)
  role <user_id> <role>                    change a user's role (admin)
  stats                                    show dashboard statistics (admin)
  notify on|off                            open or close the notification channel
  notifications                            list received notifications
  clear                                    clear notifications
  status                                   show window, auth and channel status
  help                                     show this help
  quit | exit                              leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { email: String, password: String },
    Register { email: String, password: String, confirm: String, role: Role },
    Logout,
    WhoAmI,
    Submit(String),
    Submissions,
    Users,
    SetRole { user_id: String, role: Role },
    Stats,
    Notify(bool),
    Notifications,
    Clear,
    Status,
    Help,
    Quit,
}

impl Command {
    /// Parse one REPL line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> AppResult<Option<Command>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let args: Vec<&str> = rest.split_whitespace().collect();
        let cmd = match head.to_ascii_lowercase().as_str() {
            "login" => match args.as_slice() {
                [email, password] => Command::Login { email: email.to_string(), password: password.to_string() },
                _ => return Err(usage("login <email> <password>")),
            },
            "register" => match args.as_slice() {
                [email, password, confirm] => Command::Register {
                    email: email.to_string(),
                    password: password.to_string(),
                    confirm: confirm.to_string(),
                    role: Role::default(),
                },
                [email, password, confirm, role] => Command::Register {
                    email: email.to_string(),
                    password: password.to_string(),
                    confirm: confirm.to_string(),
                    role: role.parse()?,
                },
                _ => return Err(usage("register <email> <password> <confirm> [role]")),
            },
            "logout" => Command::Logout,
            "whoami" => Command::WhoAmI,
            "submit" => Command::Submit(rest.to_string()),
            "submissions" => Command::Submissions,
            "users" => Command::Users,
            "role" => match args.as_slice() {
                [id, role] => Command::SetRole { user_id: id.to_string(), role: role.parse()? },
                _ => return Err(usage("role <user_id> <role>")),
            },
            "stats" | "statistics" => Command::Stats,
            "notify" => match args.as_slice() {
                ["on"] => Command::Notify(true),
                ["off"] => Command::Notify(false),
                _ => return Err(usage("notify on|off")),
            },
            "notifications" => Command::Notifications,
            "clear" => Command::Clear,
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(AppError::validation("unknown_command".to_string(), format!("unknown command '{}'; type help", other))),
        };
        Ok(Some(cmd))
    }

    /// Carries a password; kept out of line-editor history.
    pub fn is_sensitive(&self) -> bool {
        matches!(self, Command::Login { .. } | Command::Register { .. })
    }

    /// Page the command belongs to; the route guard runs against it first.
    pub fn route(&self) -> Option<Route> {
        match self {
            Command::Login { .. } => Some(Route::Login),
            Command::Register { .. } => Some(Route::Register),
            Command::WhoAmI | Command::Notify(_) | Command::Notifications | Command::Clear => Some(Route::Dashboard),
            Command::Submit(_) | Command::Submissions => Some(Route::TextSubmission),
            Command::Users | Command::SetRole { .. } | Command::Stats => Some(Route::Admin),
            Command::Logout | Command::Status | Command::Help | Command::Quit => None,
        }
    }
}

fn usage(text: &str) -> AppError {
    AppError::validation("usage".to_string(), format!("usage: {}", text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("  ").unwrap(), None);
        assert_eq!(
            Command::parse("login a@b.com pw").unwrap(),
            Some(Command::Login { email: "a@b.com".into(), password: "pw".into() })
        );
        assert_eq!(
            Command::parse("register a@b.com pw pw developer").unwrap(),
            Some(Command::Register { email: "a@b.com".into(), password: "pw".into(), confirm: "pw".into(), role: Role::Developer })
        );
        assert_eq!(Command::parse("submit hello   world").unwrap(), Some(Command::Submit("hello   world".into())));
        assert_eq!(Command::parse("ROLE 42 admin").unwrap(), Some(Command::SetRole { user_id: "42".into(), role: Role::Admin }));
        assert_eq!(Command::parse("notify off").unwrap(), Some(Command::Notify(false)));
        assert_eq!(Command::parse("exit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(Command::parse("login only-email").unwrap_err().code_str(), "usage");
        assert_eq!(Command::parse("role 1 superuser").unwrap_err().code_str(), "invalid_role");
        assert_eq!(Command::parse("frobnicate").unwrap_err().code_str(), "unknown_command");
    }

    #[test]
    fn commands_map_to_routes() {
        assert_eq!(Command::Users.route(), Some(Route::Admin));
        assert_eq!(Command::Submissions.route(), Some(Route::TextSubmission));
        assert_eq!(Command::Notifications.route(), Some(Route::Dashboard));
        assert_eq!(Command::Status.route(), None);
        assert!(Command::parse("login a@b.com pw").unwrap().unwrap().is_sensitive());
        assert!(!Command::Users.is_sensitive());
    }
}
