use rusqlite::OptionalExtension;
use serde_json::json;

use crate::insight::{self, InsightsInput};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::require_student;
use crate::ipc::types::{AppState, Request};

fn handle_dashboard_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match require_student(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student: Option<(String, String, f64, i64, i64, Option<String>, Option<String>)> =
        match conn
            .query_row(
                "SELECT first_name, last_name, gpa, completion_rate, chat_sessions,
                        career_goal, educational_background
                 FROM students WHERE id = ?",
                [&student_id],
                |r| {
                    Ok((
                        r.get(0)?,
                        r.get(1)?,
                        r.get(2)?,
                        r.get(3)?,
                        r.get(4)?,
                        r.get(5)?,
                        r.get(6)?,
                    ))
                },
            )
            .optional()
        {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
    let Some((first_name, last_name, gpa, completion_rate, chat_sessions, career_goal, background)) =
        student
    else {
        return err(&req.id, "not_found", "student not found", None);
    };

    let enrolled_count: i64 = match conn.query_row(
        "SELECT COUNT(*) FROM enrolled_courses WHERE student_id = ?",
        [&student_id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut stmt = match conn.prepare(
        "SELECT c.course_name, c.instructor, ec.progress, ec.grade
         FROM enrolled_courses ec
         JOIN courses c ON ec.course_id = c.id
         WHERE ec.student_id = ?
         ORDER BY ec.enrolled_at DESC
         LIMIT 3",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let upcoming = stmt
        .query_map([&student_id], |r| {
            let name: String = r.get(0)?;
            let instructor: Option<String> = r.get(1)?;
            let progress: i64 = r.get(2)?;
            let grade: Option<String> = r.get(3)?;
            Ok(json!({
                "courseName": name,
                "instructor": instructor,
                "progress": progress,
                "grade": grade
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    let upcoming = match upcoming {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let courses_info: Vec<String> = upcoming
        .iter()
        .map(|c| {
            format!(
                "{} ({}% complete, Grade: {})",
                c["courseName"].as_str().unwrap_or(""),
                c["progress"].as_i64().unwrap_or(0),
                c["grade"].as_str().unwrap_or("N/A")
            )
        })
        .collect();
    let career_goal = career_goal.unwrap_or_else(|| "Not specified".to_string());

    let insights = insight::dashboard_insights(
        state.client.as_deref(),
        &InsightsInput {
            gpa,
            completion_rate,
            courses_info: &courses_info.join(", "),
            career_goal: &career_goal,
        },
    );

    ok(
        &req.id,
        json!({
            "student": {
                "id": student_id,
                "firstName": first_name,
                "lastName": last_name,
                "gpa": gpa,
                "completionRate": completion_rate,
                "chatSessions": chat_sessions,
                "careerGoal": career_goal,
                "educationalBackground": background
            },
            "enrolledCount": enrolled_count,
            "upcomingClasses": upcoming,
            "insights": insights
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.open" => Some(handle_dashboard_open(state, req)),
        _ => None,
    }
}
