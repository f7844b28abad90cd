use super::*;

#[test]
fn code_and_message_accessors() {
    let e = AppError::validation("password_mismatch", "Passwords do not match");
    assert_eq!(e.code_str(), "password_mismatch");
    assert_eq!(e.message(), "Passwords do not match");
    assert_eq!(e.to_string(), "password_mismatch: Passwords do not match");
}

#[test]
fn server_errors_carry_status() {
    let e = AppError::server(404, "not found");
    assert_eq!(e.status(), Some(404));
    assert_eq!(e.code_str(), "http_404");
    assert!(!e.is_network());
    assert!(!e.is_auth());
    assert!(AppError::server(401, "bad creds").is_auth());
    assert!(AppError::server(403, "forbidden").is_auth());
    assert!(AppError::auth("invalid_token", "expired").is_auth());
}

#[test]
fn network_errors_use_generic_user_message() {
    let e = AppError::network("network_error", "connection refused");
    assert!(e.is_network());
    assert_eq!(e.status(), None);
    assert_eq!(e.user_message(), SERVER_ERROR_MESSAGE);
    assert_eq!(AppError::server(400, "Email taken").user_message(), "Email taken");
}

#[test]
fn serializes_with_type_tag() {
    let v = serde_json::to_value(AppError::server(500, "boom")).unwrap();
    assert_eq!(v["type"], "server");
    assert_eq!(v["status"], 500);
    assert_eq!(v["message"], "boom");
}

#[test]
fn runtime_errors_keep_their_message() {
    let e = AppError::runtime("no_runtime", "notification channel needs a Tokio runtime");
    assert_eq!(e.code_str(), "no_runtime");
    assert!(!e.is_network());
    assert_eq!(e.user_message(), "notification channel needs a Tokio runtime");
    assert_eq!(serde_json::to_value(&e).unwrap()["type"], "runtime");
}
