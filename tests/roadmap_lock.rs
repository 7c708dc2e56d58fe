mod support;

use chrono::{Duration, Local};
use serde_json::json;
use support::{create_and_login_student, open_workspace_as_admin, temp_dir, Daemon, MockCompletions};

fn plan_reply() -> String {
    let days: Vec<serde_json::Value> = (1..=10)
        .map(|d| {
            json!({
                "day": d,
                "topic": format!("Topic {}", d),
                // Day 2 ships without theory so first access generates it.
                "description": if d == 2 { String::new() } else { format!("Primer {}", d) }
            })
        })
        .collect();
    json!(days).to_string()
}

fn backdated(days: i64) -> String {
    (Local::now().date_naive() - Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

#[test]
fn days_unlock_with_account_age() {
    let mock = MockCompletions::start(|body| {
        if body.contains("curriculum designer") {
            plan_reply()
        } else if body.contains("study primer") {
            "Generated theory text.".to_string()
        } else {
            "ok".to_string()
        }
    });
    let workspace = temp_dir("forgeed-roadmap-lock");
    let mut daemon = Daemon::spawn_with_mock(&mock);
    let admin_token = open_workspace_as_admin(&mut daemon, &workspace);

    // Account created four days ago: days 1-5 are open.
    let (_, token) = create_and_login_student(
        &mut daemon,
        &admin_token,
        "lock@example.com",
        json!({ "careerGoal": "Data Scientist", "createdAt": backdated(4) }),
    );

    let generated = daemon.request_ok("rm", "roadmap.generate", json!({ "token": token }));
    assert_eq!(generated.get("days"), Some(&json!(10)));
    let calls_after_generate = mock.call_count();

    let overview = daemon.request_ok("ov", "roadmap.overview", json!({ "token": token }));
    assert_eq!(overview.get("currentDay"), Some(&json!(5)));
    let days = overview
        .get("days")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(days.len(), 10);
    assert_eq!(days[4].get("locked"), Some(&json!(false)));
    assert_eq!(days[5].get("locked"), Some(&json!(true)));

    let locked = daemon.request_err("d6", "roadmap.day", json!({ "token": token, "dayNumber": 6 }), "locked");
    assert_eq!(
        locked.get("details").and_then(|d| d.get("currentDay")),
        Some(&json!(5))
    );
    daemon.request_err(
        "d95",
        "roadmap.day",
        json!({ "token": token, "dayNumber": 95 }),
        "bad_params",
    );
    daemon.request_err(
        "c6",
        "roadmap.complete",
        json!({ "token": token, "dayNumber": 6 }),
        "locked",
    );

    // Day 3 already has its primer from the plan; no extra call.
    let day3 = daemon.request_ok("d3", "roadmap.day", json!({ "token": token, "dayNumber": 3 }));
    assert_eq!(day3.get("theory"), Some(&json!("Primer 3")));
    assert_eq!(mock.call_count(), calls_after_generate);

    // Day 2 generates on first access and serves the cached text after that.
    let day2 = daemon.request_ok("d2", "roadmap.day", json!({ "token": token, "dayNumber": 2 }));
    assert_eq!(day2.get("theory"), Some(&json!("Generated theory text.")));
    assert_eq!(mock.call_count(), calls_after_generate + 1);
    let day2_again = daemon.request_ok("d2b", "roadmap.day", json!({ "token": token, "dayNumber": 2 }));
    assert_eq!(day2_again.get("theory"), Some(&json!("Generated theory text.")));
    assert_eq!(mock.call_count(), calls_after_generate + 1);

    let completed = daemon.request_ok(
        "c3",
        "roadmap.complete",
        json!({ "token": token, "dayNumber": 3 }),
    );
    assert_eq!(completed.get("isCompleted"), Some(&json!(true)));
    assert_eq!(completed.get("completionRate"), Some(&json!(1)));

    let overview_after = daemon.request_ok("ov2", "roadmap.overview", json!({ "token": token }));
    let days_after = overview_after
        .get("days")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(days_after[2].get("isCompleted"), Some(&json!(true)));
}

#[test]
fn missing_roadmap_rows_are_not_found() {
    let workspace = temp_dir("forgeed-roadmap-missing");
    let mut daemon = Daemon::spawn();
    let admin_token = open_workspace_as_admin(&mut daemon, &workspace);
    let (_, token) =
        create_and_login_student(&mut daemon, &admin_token, "bare@example.com", json!({}));

    daemon.request_err(
        "d1",
        "roadmap.day",
        json!({ "token": token, "dayNumber": 1 }),
        "not_found",
    );
    daemon.request_err(
        "c1",
        "roadmap.complete",
        json!({ "token": token, "dayNumber": 1 }),
        "not_found",
    );
    daemon.request_err("g", "roadmap.generate", json!({ "token": token }), "service_unavailable");
}
