mod support;

use serde_json::json;
use support::{create_and_login_student, open_workspace_as_admin, temp_dir, Daemon};

#[test]
fn student_accounts_round_trip_through_the_admin_surface() {
    let workspace = temp_dir("forgeed-admin-students");
    let mut daemon = Daemon::spawn();
    let admin_token = open_workspace_as_admin(&mut daemon, &workspace);

    let (student_id, student_token) = create_and_login_student(
        &mut daemon,
        &admin_token,
        "jane@example.com",
        json!({ "gpa": 3.4, "careerGoal": "Data Scientist" }),
    );

    // Duplicate email is a conflict, not a silent overwrite.
    daemon.request_err(
        "dup",
        "admin.students.create",
        json!({
            "token": admin_token,
            "email": "jane@example.com",
            "password": "pw2",
            "firstName": "Jane",
            "lastName": "Doe"
        }),
        "conflict",
    );

    let listing = daemon.request_ok("list", "admin.students.list", json!({ "token": admin_token }));
    let students = listing
        .get("students")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(students.len(), 2);
    let jane = students
        .iter()
        .find(|s| s.get("email") == Some(&json!("jane@example.com")))
        .expect("created student listed");
    assert_eq!(jane.get("gpa"), Some(&json!(3.4)));
    assert_eq!(jane.get("careerGoal"), Some(&json!("Data Scientist")));
    assert_eq!(jane.get("isAdmin"), Some(&json!(false)));

    // Deleting removes the account, its rows, and any live session.
    let deleted = daemon.request_ok(
        "del",
        "admin.students.delete",
        json!({ "token": admin_token, "studentId": student_id }),
    );
    assert_eq!(deleted.get("deleted"), Some(&json!(true)));
    daemon.request_err(
        "del-again",
        "admin.students.delete",
        json!({ "token": admin_token, "studentId": student_id }),
        "not_found",
    );
    daemon.request_err(
        "stale-session",
        "dashboard.open",
        json!({ "token": student_token }),
        "unauthorized",
    );
    daemon.request_err(
        "stale-login",
        "auth.login",
        json!({ "email": "jane@example.com", "password": "pw" }),
        "unauthorized",
    );
}

#[test]
fn courses_catalog_and_enrollment() {
    let workspace = temp_dir("forgeed-admin-courses");
    let mut daemon = Daemon::spawn();
    let admin_token = open_workspace_as_admin(&mut daemon, &workspace);
    let (student_id, student_token) =
        create_and_login_student(&mut daemon, &admin_token, "sam@example.com", json!({}));

    let created = daemon.request_ok(
        "c1",
        "admin.courses.create",
        json!({
            "token": admin_token,
            "courseCode": "IS 6100",
            "courseName": "Machine Learning",
            "credits": 4,
            "instructor": "Dr. Ruiz"
        }),
    );
    let course_id = created
        .get("courseId")
        .and_then(|v| v.as_str())
        .expect("courseId")
        .to_string();
    daemon.request_err(
        "c1-dup",
        "admin.courses.create",
        json!({ "token": admin_token, "courseCode": "IS 6100", "courseName": "ML Again" }),
        "conflict",
    );

    for (i, code) in ["IS 6200", "IS 6300", "IS 6400", "IS 6500"].iter().enumerate() {
        daemon.request_ok(
            &format!("cat{}", i),
            "admin.catalog.add",
            json!({
                "token": admin_token,
                "courseCode": code,
                "courseName": format!("Elective {}", i),
                "description": "Catalog entry"
            }),
        );
    }

    daemon.request_ok(
        "enroll",
        "admin.enroll",
        json!({
            "token": admin_token,
            "studentId": student_id,
            "courseId": course_id,
            "progress": 40,
            "grade": "B+"
        }),
    );
    daemon.request_err(
        "enroll-dup",
        "admin.enroll",
        json!({ "token": admin_token, "studentId": student_id, "courseId": course_id }),
        "conflict",
    );

    let courses = daemon.request_ok("list", "courses.list", json!({ "token": student_token }));
    let enrolled = courses
        .get("enrolledCourses")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(enrolled.len(), 1);
    assert_eq!(enrolled[0].get("courseCode"), Some(&json!("IS 6100")));
    assert_eq!(enrolled[0].get("progress"), Some(&json!(40)));
    assert_eq!(enrolled[0].get("grade"), Some(&json!("B+")));

    // No completion backend: recommendations fall back to catalog order.
    let recommended = courses
        .get("recommendedCourses")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(recommended.len(), 3);
    for rec in &recommended {
        let code = rec.get("courseCode").and_then(|v| v.as_str()).unwrap_or("");
        assert!(["IS 6200", "IS 6300", "IS 6400", "IS 6500"].contains(&code));
    }

    let dashboard = daemon.request_ok("dash", "dashboard.open", json!({ "token": student_token }));
    assert_eq!(dashboard.get("enrolledCount"), Some(&json!(1)));
    let upcoming = dashboard
        .get("upcomingClasses")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(upcoming.len(), 1);
    assert_eq!(
        upcoming[0].get("courseName"),
        Some(&json!("Machine Learning"))
    );
}
