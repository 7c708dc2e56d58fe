mod support;

use serde_json::json;
use support::{create_and_login_student, open_workspace_as_admin, temp_dir, Daemon, MockCompletions};

#[test]
fn chat_stores_exchanges_and_counts_sessions() {
    let mock = MockCompletions::start(|body| {
        if body.contains("ForgeEd assistant") {
            "Gradient descent minimizes a loss function step by step.".to_string()
        } else {
            "ok".to_string()
        }
    });
    let workspace = temp_dir("forgeed-chat");
    let mut daemon = Daemon::spawn_with_mock(&mock);
    let admin_token = open_workspace_as_admin(&mut daemon, &workspace);
    let (_, token) = create_and_login_student(
        &mut daemon,
        &admin_token,
        "chat@example.com",
        json!({ "careerGoal": "ML Engineer" }),
    );

    let sent = daemon.request_ok(
        "c1",
        "chat.send",
        json!({ "token": token, "message": "What is gradient descent?" }),
    );
    assert_eq!(
        sent.get("response"),
        Some(&json!(
            "Gradient descent minimizes a loss function step by step."
        ))
    );

    let history = daemon.request_ok("h1", "chat.history", json!({ "token": token }));
    let messages = history
        .get("messages")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].get("message"),
        Some(&json!("What is gradient descent?"))
    );

    let dashboard = daemon.request_ok("d1", "dashboard.open", json!({ "token": token }));
    assert_eq!(
        dashboard
            .get("student")
            .and_then(|s| s.get("chatSessions")),
        Some(&json!(1))
    );

    daemon.request_err("c2", "chat.send", json!({ "token": token }), "bad_params");
}
