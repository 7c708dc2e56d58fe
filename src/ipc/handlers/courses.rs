use rusqlite::OptionalExtension;
use serde_json::json;

use crate::insight;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::require_student;
use crate::ipc::types::{AppState, Request};

struct CatalogCourse {
    id: String,
    course_code: String,
    course_name: String,
    credits: i64,
    description: Option<String>,
    semester: Option<String>,
    prerequisites: Option<String>,
}

fn catalog_json(c: &CatalogCourse) -> serde_json::Value {
    json!({
        "id": c.id,
        "courseCode": c.course_code,
        "courseName": c.course_name,
        "credits": c.credits,
        "description": c.description,
        "semester": c.semester,
        "prerequisites": c.prerequisites
    })
}

fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match require_student(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let mut enrolled_stmt = match conn.prepare(
        "SELECT c.course_code, c.course_name, c.credits, c.description, c.instructor,
                c.semester, ec.progress, ec.grade, ec.modules_completed, ec.pending_assignments
         FROM enrolled_courses ec
         JOIN courses c ON ec.course_id = c.id
         WHERE ec.student_id = ?
         ORDER BY ec.enrolled_at DESC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let enrolled = enrolled_stmt
        .query_map([&student_id], |r| {
            Ok(json!({
                "courseCode": r.get::<_, String>(0)?,
                "courseName": r.get::<_, String>(1)?,
                "credits": r.get::<_, i64>(2)?,
                "description": r.get::<_, Option<String>>(3)?,
                "instructor": r.get::<_, Option<String>>(4)?,
                "semester": r.get::<_, Option<String>>(5)?,
                "progress": r.get::<_, i64>(6)?,
                "grade": r.get::<_, Option<String>>(7)?,
                "modulesCompleted": r.get::<_, i64>(8)?,
                "pendingAssignments": r.get::<_, i64>(9)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    let enrolled = match enrolled {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let career_goal: Option<String> = match conn
        .query_row(
            "SELECT career_goal FROM students WHERE id = ?",
            [&student_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v.flatten(),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut catalog_stmt = match conn.prepare(
        "SELECT id, course_code, course_name, credits, description, semester, prerequisites
         FROM available_courses",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let catalog = catalog_stmt
        .query_map([], |r| {
            Ok(CatalogCourse {
                id: r.get(0)?,
                course_code: r.get(1)?,
                course_name: r.get(2)?,
                credits: r.get(3)?,
                description: r.get(4)?,
                semester: r.get(5)?,
                prerequisites: r.get(6)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    let catalog = match catalog {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let enrolled_codes: Vec<&str> = enrolled
        .iter()
        .filter_map(|c| c["courseCode"].as_str())
        .collect();
    let open_catalog: Vec<&CatalogCourse> = catalog
        .iter()
        .filter(|c| !enrolled_codes.contains(&c.course_code.as_str()))
        .collect();

    let catalog_lines: Vec<String> = open_catalog
        .iter()
        .map(|c| {
            format!(
                "{}: {} - {}",
                c.course_code,
                c.course_name,
                c.description.as_deref().unwrap_or("")
            )
        })
        .collect();

    let recommended: Vec<serde_json::Value> = match insight::course_recommendations(
        state.client.as_deref(),
        career_goal.as_deref().unwrap_or("Not specified"),
        &catalog_lines,
    ) {
        Some(codes) => open_catalog
            .iter()
            .filter(|c| codes.iter().any(|code| code == &c.course_code))
            .take(3)
            .map(|c| catalog_json(c))
            .collect(),
        // No client or unusable reply: first three open catalog entries.
        None => open_catalog.iter().take(3).map(|c| catalog_json(c)).collect(),
    };

    ok(
        &req.id,
        json!({
            "enrolledCourses": enrolled,
            "recommendedCourses": recommended
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.list" => Some(handle_courses_list(state, req)),
        _ => None,
    }
}
