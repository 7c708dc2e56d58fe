mod support;

use serde_json::json;
use support::{create_and_login_student, open_workspace_as_admin, temp_dir, Daemon};

#[test]
fn daily_assessment_scores_and_upserts() {
    let workspace = temp_dir("forgeed-wellbeing");
    let mut daemon = Daemon::spawn();
    let admin_token = open_workspace_as_admin(&mut daemon, &workspace);
    let (_, token) =
        create_and_login_student(&mut daemon, &admin_token, "well@example.com", json!({}));

    // (80 + (100-40) + 70 + 75 + 65) / 5 = 70
    let first = daemon.request_ok(
        "w1",
        "wellbeing.submit",
        json!({
            "token": token,
            "happiness": 80,
            "stress": 40,
            "energy": 70,
            "motivation": 75,
            "sleepQuality": 65
        }),
    );
    assert_eq!(first.get("totalScore"), Some(&json!(70)));
    assert!(first
        .get("insight")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .contains("70"));

    // Same-day resubmission replaces the row instead of adding one.
    let second = daemon.request_ok(
        "w2",
        "wellbeing.submit",
        json!({
            "token": token,
            "happiness": 90,
            "stress": 30,
            "energy": 80,
            "motivation": 85,
            "sleepQuality": 75
        }),
    );
    assert_eq!(second.get("totalScore"), Some(&json!(80)));

    let history = daemon.request_ok("h1", "wellbeing.history", json!({ "token": token }));
    let assessments = history
        .get("assessments")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(assessments.len(), 1);
    assert_eq!(assessments[0].get("totalScore"), Some(&json!(80)));
    assert_eq!(assessments[0].get("happiness"), Some(&json!(90)));
}

#[test]
fn scores_outside_the_scale_are_rejected() {
    let workspace = temp_dir("forgeed-wellbeing-range");
    let mut daemon = Daemon::spawn();
    let admin_token = open_workspace_as_admin(&mut daemon, &workspace);
    let (_, token) =
        create_and_login_student(&mut daemon, &admin_token, "range@example.com", json!({}));

    let error = daemon.request_err(
        "w1",
        "wellbeing.submit",
        json!({
            "token": token,
            "happiness": 80,
            "stress": 120,
            "energy": 70,
            "motivation": 75,
            "sleepQuality": 65
        }),
        "bad_params",
    );
    assert!(error
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .contains("stress"));

    daemon.request_err(
        "w2",
        "wellbeing.submit",
        json!({ "token": token, "happiness": 80 }),
        "bad_params",
    );
}
