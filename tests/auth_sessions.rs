mod support;

use serde_json::json;
use support::{create_and_login_student, open_workspace_as_admin, temp_dir, Daemon};

#[test]
fn bootstrap_admin_can_log_in() {
    let workspace = temp_dir("forgeed-auth-bootstrap");
    let mut daemon = Daemon::spawn();
    daemon.request_ok(
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let result = daemon.request_ok(
        "2",
        "auth.login",
        json!({ "email": "admin", "password": "admin123" }),
    );
    assert_eq!(result.get("isAdmin"), Some(&json!(true)));
    assert_eq!(result.get("firstName"), Some(&json!("System")));
    assert!(result
        .get("token")
        .and_then(|v| v.as_str())
        .map(|t| !t.is_empty())
        .unwrap_or(false));
}

#[test]
fn bad_credentials_are_rejected() {
    let workspace = temp_dir("forgeed-auth-badcreds");
    let mut daemon = Daemon::spawn();
    daemon.request_ok(
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    daemon.request_err(
        "2",
        "auth.login",
        json!({ "email": "admin", "password": "wrong" }),
        "unauthorized",
    );
    daemon.request_err(
        "3",
        "auth.login",
        json!({ "email": "nobody@example.com", "password": "admin123" }),
        "unauthorized",
    );
}

#[test]
fn gated_methods_need_a_valid_session() {
    let workspace = temp_dir("forgeed-auth-gate");
    let mut daemon = Daemon::spawn();
    daemon.request_ok(
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    daemon.request_err("2", "dashboard.open", json!({}), "unauthorized");
    daemon.request_err(
        "3",
        "dashboard.open",
        json!({ "token": "not-a-real-token" }),
        "unauthorized",
    );
}

#[test]
fn logout_invalidates_the_token() {
    let workspace = temp_dir("forgeed-auth-logout");
    let mut daemon = Daemon::spawn();
    let token = open_workspace_as_admin(&mut daemon, &workspace);

    let result = daemon.request_ok("1", "auth.logout", json!({ "token": token }));
    assert_eq!(result.get("loggedOut"), Some(&json!(true)));

    daemon.request_err(
        "2",
        "admin.students.list",
        json!({ "token": token }),
        "unauthorized",
    );
}

#[test]
fn admin_surface_is_forbidden_for_students() {
    let workspace = temp_dir("forgeed-auth-forbidden");
    let mut daemon = Daemon::spawn();
    let admin_token = open_workspace_as_admin(&mut daemon, &workspace);
    let (_, student_token) =
        create_and_login_student(&mut daemon, &admin_token, "s1@example.com", json!({}));

    daemon.request_err(
        "1",
        "admin.students.list",
        json!({ "token": student_token }),
        "forbidden",
    );
    daemon.request_err(
        "2",
        "admin.courses.create",
        json!({ "token": student_token, "courseCode": "CS 101", "courseName": "Intro" }),
        "forbidden",
    );
}
