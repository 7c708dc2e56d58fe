mod support;

use serde_json::json;
use support::{temp_dir, Daemon};

#[test]
fn health_reports_version_and_ai_state() {
    let mut daemon = Daemon::spawn();
    let result = daemon.request_ok("1", "health", json!({}));
    assert!(result
        .get("version")
        .and_then(|v| v.as_str())
        .map(|s| !s.is_empty())
        .unwrap_or(false));
    assert_eq!(result.get("aiConfigured"), Some(&json!(false)));
    assert_eq!(result.get("workspacePath"), Some(&json!(null)));
}

#[test]
fn unknown_method_is_rejected() {
    let mut daemon = Daemon::spawn();
    let error = daemon.request_err("1", "definitely.not.a.method", json!({}), "not_implemented");
    assert!(error
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .contains("definitely.not.a.method"));
}

#[test]
fn login_requires_a_workspace() {
    let mut daemon = Daemon::spawn();
    daemon.request_err(
        "1",
        "auth.login",
        json!({ "email": "admin", "password": "admin123" }),
        "no_workspace",
    );
}

#[test]
fn workspace_select_reports_path() {
    let workspace = temp_dir("forgeed-smoke");
    let mut daemon = Daemon::spawn();
    let result = daemon.request_ok(
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(
        result.get("workspacePath").and_then(|v| v.as_str()),
        Some(workspace.to_string_lossy().as_ref())
    );

    let health = daemon.request_ok("2", "health", json!({}));
    assert_eq!(
        health.get("workspacePath").and_then(|v| v.as_str()),
        Some(workspace.to_string_lossy().as_ref())
    );
}
