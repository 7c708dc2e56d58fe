use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    now_string, opt_param_i64, opt_param_str, param_str, require_admin,
};
use crate::ipc::types::{AppState, Request};

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(resp) = require_admin(state, conn, req) {
        return resp;
    }

    let mut stmt = match conn.prepare(
        "SELECT id, email, first_name, last_name, gpa, completion_rate,
                career_goal, educational_background, is_admin, created_at
         FROM students
         ORDER BY created_at",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "email": r.get::<_, String>(1)?,
                "firstName": r.get::<_, String>(2)?,
                "lastName": r.get::<_, String>(3)?,
                "gpa": r.get::<_, f64>(4)?,
                "completionRate": r.get::<_, i64>(5)?,
                "careerGoal": r.get::<_, Option<String>>(6)?,
                "educationalBackground": r.get::<_, Option<String>>(7)?,
                "isAdmin": r.get::<_, i64>(8)? != 0,
                "createdAt": r.get::<_, String>(9)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(resp) = require_admin(state, conn, req) {
        return resp;
    }

    let email = match param_str(req, "email") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let password = match param_str(req, "password") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let first_name = match param_str(req, "firstName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let last_name = match param_str(req, "lastName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let gpa = req
        .params
        .get("gpa")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);
    let career_goal = opt_param_str(req, "careerGoal");
    let background = opt_param_str(req, "educationalBackground");
    let is_admin = req
        .params
        .get("isAdmin")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    // Backdating supported for imported accounts; roadmap unlocks key off it.
    let created_at = opt_param_str(req, "createdAt").unwrap_or_else(now_string);

    let student_id = Uuid::new_v4().to_string();
    let inserted = conn.execute(
        "INSERT INTO students(id, email, password, first_name, last_name, gpa,
                              career_goal, educational_background, is_admin, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &student_id,
            &email,
            &password,
            &first_name,
            &last_name,
            gpa,
            &career_goal,
            &background,
            is_admin as i64,
            &created_at,
        ),
    );
    match inserted {
        Ok(_) => ok(&req.id, json!({ "studentId": student_id })),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            err(&req.id, "conflict", "email already registered", None)
        }
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        ),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(resp) = require_admin(state, conn, req) {
        return resp;
    }
    let student_id = match param_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let exists: Option<String> = match conn
        .query_row(
            "SELECT id FROM students WHERE id = ?",
            [&student_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "student not found", None);
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    // Dependents first, then the account row.
    let tables = [
        "chat_history",
        "academic_quiz_history",
        "career_quiz_history",
        "wellbeing_assessments",
        "daily_roadmap",
        "enrolled_courses",
    ];
    for table in tables {
        let sql = format!("DELETE FROM {} WHERE student_id = ?", table);
        if let Err(e) = tx.execute(&sql, [&student_id]) {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": table })),
            );
        }
    }
    if let Err(e) = tx.execute("DELETE FROM students WHERE id = ?", [&student_id]) {
        let _ = tx.rollback();
        return err(&req.id, "db_delete_failed", e.to_string(), None);
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    // Any live session for the deleted account dies with it.
    state.sessions.retain(|_, sid| sid != &student_id);

    ok(&req.id, json!({ "deleted": true }))
}

fn handle_courses_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(resp) = require_admin(state, conn, req) {
        return resp;
    }

    let course_code = match param_str(req, "courseCode") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let course_name = match param_str(req, "courseName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let credits = opt_param_i64(req, "credits").unwrap_or(3);
    let description = opt_param_str(req, "description");
    let instructor = opt_param_str(req, "instructor");
    let semester = opt_param_str(req, "semester");

    let course_id = Uuid::new_v4().to_string();
    let inserted = conn.execute(
        "INSERT INTO courses(id, course_code, course_name, credits, description, instructor, semester)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &course_id,
            &course_code,
            &course_name,
            credits,
            &description,
            &instructor,
            &semester,
        ),
    );
    match inserted {
        Ok(_) => ok(&req.id, json!({ "courseId": course_id })),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            err(&req.id, "conflict", "course code already exists", None)
        }
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "courses" })),
        ),
    }
}

fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(resp) = require_admin(state, conn, req) {
        return resp;
    }

    let mut stmt = match conn.prepare(
        "SELECT id, course_code, course_name, credits, description, instructor, semester
         FROM courses ORDER BY course_code",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "courseCode": r.get::<_, String>(1)?,
                "courseName": r.get::<_, String>(2)?,
                "credits": r.get::<_, i64>(3)?,
                "description": r.get::<_, Option<String>>(4)?,
                "instructor": r.get::<_, Option<String>>(5)?,
                "semester": r.get::<_, Option<String>>(6)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(courses) => ok(&req.id, json!({ "courses": courses })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_catalog_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(resp) = require_admin(state, conn, req) {
        return resp;
    }

    let course_code = match param_str(req, "courseCode") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let course_name = match param_str(req, "courseName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let credits = opt_param_i64(req, "credits").unwrap_or(3);
    let description = opt_param_str(req, "description");
    let semester = opt_param_str(req, "semester");
    let prerequisites = opt_param_str(req, "prerequisites");

    let entry_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO available_courses(id, course_code, course_name, credits, description, semester, prerequisites)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &entry_id,
            &course_code,
            &course_name,
            credits,
            &description,
            &semester,
            &prerequisites,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "available_courses" })),
        );
    }
    ok(&req.id, json!({ "catalogId": entry_id }))
}

fn handle_enroll(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(resp) = require_admin(state, conn, req) {
        return resp;
    }

    let student_id = match param_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let course_id = match param_str(req, "courseId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let progress = opt_param_i64(req, "progress").unwrap_or(0);
    let grade = opt_param_str(req, "grade");
    let modules_completed = opt_param_i64(req, "modulesCompleted").unwrap_or(0);
    let pending_assignments = opt_param_i64(req, "pendingAssignments").unwrap_or(0);

    let enrollment_id = Uuid::new_v4().to_string();
    let inserted = conn.execute(
        "INSERT INTO enrolled_courses(id, student_id, course_id, progress, grade,
                                      modules_completed, pending_assignments, enrolled_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &enrollment_id,
            &student_id,
            &course_id,
            progress,
            &grade,
            modules_completed,
            pending_assignments,
            now_string(),
        ),
    );
    match inserted {
        Ok(_) => ok(&req.id, json!({ "enrollmentId": enrollment_id })),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            err(&req.id, "conflict", "already enrolled", None)
        }
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "enrolled_courses" })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "admin.students.list" => Some(handle_students_list(state, req)),
        "admin.students.create" => Some(handle_students_create(state, req)),
        "admin.students.delete" => Some(handle_students_delete(state, req)),
        "admin.courses.create" => Some(handle_courses_create(state, req)),
        "admin.courses.list" => Some(handle_courses_list(state, req)),
        "admin.catalog.add" => Some(handle_catalog_add(state, req)),
        "admin.enroll" => Some(handle_enroll(state, req)),
        _ => None,
    }
}
