use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::insight;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::roadmap;
use crate::ipc::helpers::{now_string, require_student, today_string};
use crate::ipc::types::{AppState, Request};
use crate::quiz::{self, QuizSheet};

/// Questions as served to the client. The answer key stays server-side.
fn public_questions(sheet: &QuizSheet) -> Vec<serde_json::Value> {
    sheet
        .questions
        .iter()
        .map(|q| {
            json!({
                "id": q.id,
                "question": q.question,
                "options": q.options,
                "course": q.course
            })
        })
        .collect()
}

struct QuizRow {
    id: String,
    questions: String,
    score: i64,
    total_questions: i64,
    completed: bool,
    ai_feedback: Option<String>,
}

fn load_quiz_row(
    conn: &Connection,
    table: &str,
    student_id: &str,
    quiz_date: &str,
) -> Result<Option<QuizRow>, rusqlite::Error> {
    let sql = format!(
        "SELECT id, questions, score, total_questions, completed, ai_feedback
         FROM {} WHERE student_id = ? AND quiz_date = ?",
        table
    );
    conn.query_row(&sql, (student_id, quiz_date), |r| {
        Ok(QuizRow {
            id: r.get(0)?,
            questions: r.get(1)?,
            score: r.get(2)?,
            total_questions: r.get(3)?,
            completed: r.get::<_, i64>(4)? != 0,
            ai_feedback: r.get(5)?,
        })
    })
    .optional()
}

fn quiz_row_json(row: &QuizRow) -> serde_json::Value {
    let questions = match quiz::parse_sheet(&row.questions) {
        Ok(sheet) => public_questions(&sheet),
        Err(_) => Vec::new(),
    };
    json!({
        "completed": row.completed,
        "score": row.score,
        "totalQuestions": row.total_questions,
        "questions": questions,
        "feedback": row.ai_feedback
    })
}

fn handle_academic_generate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match require_student(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let quiz_date = today_string();

    // A completed quiz for today is final. Regeneration only replaces an
    // unanswered sheet.
    match load_quiz_row(conn, "academic_quiz_history", &student_id, &quiz_date) {
        Ok(Some(row)) if row.completed => return ok(&req.id, quiz_row_json(&row)),
        Ok(_) => {}
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let Some(client) = state.client.as_deref() else {
        return err(
            &req.id,
            "service_unavailable",
            "quiz generation needs the completion service",
            None,
        );
    };

    let career_goal: String = match conn
        .query_row(
            "SELECT COALESCE(career_goal, 'Not specified') FROM students WHERE id = ?",
            [&student_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "not_found", "student not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let mut stmt = match conn.prepare(
        "SELECT c.course_name FROM enrolled_courses ec
         JOIN courses c ON ec.course_id = c.id
         WHERE ec.student_id = ?",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let courses = stmt
        .query_map([&student_id], |r| r.get::<_, String>(0))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    let courses = match courses {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    drop(stmt);

    let sheet = match insight::generate_academic_quiz(client, &career_goal, &courses) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "academic quiz generation failed");
            return err(&req.id, "service_unavailable", e.to_string(), None);
        }
    };
    let questions_json = match serde_json::to_string(&sheet) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_insert_failed", e.to_string(), None),
    };
    let total = sheet.questions.len() as i64;

    // The UNIQUE(student_id, quiz_date) constraint takes the race; the
    // completed guard keeps a concurrent submit from being overwritten.
    if let Err(e) = conn.execute(
        "INSERT INTO academic_quiz_history(id, student_id, quiz_date, questions, total_questions, created_at)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, quiz_date)
         DO UPDATE SET questions = excluded.questions,
                       total_questions = excluded.total_questions,
                       created_at = excluded.created_at
         WHERE completed = 0",
        (
            Uuid::new_v4().to_string(),
            &student_id,
            &quiz_date,
            &questions_json,
            total,
            now_string(),
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "academic_quiz_history" })),
        );
    }

    match load_quiz_row(conn, "academic_quiz_history", &student_id, &quiz_date) {
        Ok(Some(row)) => ok(&req.id, quiz_row_json(&row)),
        Ok(None) => err(&req.id, "db_query_failed", "quiz row vanished", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn answers_param(req: &Request) -> Result<Vec<i64>, serde_json::Value> {
    let raw = req
        .params
        .get("answers")
        .and_then(|v| v.as_array())
        .ok_or_else(|| err(&req.id, "bad_params", "missing answers", None))?;
    raw.iter()
        .map(|v| {
            v.as_i64()
                .ok_or_else(|| err(&req.id, "bad_params", "answers must be integers", None))
        })
        .collect()
}

fn submit_quiz(
    conn: &Connection,
    table: &str,
    req: &Request,
    student_id: &str,
) -> serde_json::Value {
    let answers = match answers_param(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let quiz_date = today_string();

    let row = match load_quiz_row(conn, table, student_id, &quiz_date) {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "not_found", "no quiz generated for today", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if row.completed {
        return err(&req.id, "conflict", "quiz already submitted", None);
    }

    let sheet = match quiz::parse_sheet(&row.questions) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let score = quiz::score_answers(&sheet, &answers);
    let total = sheet.questions.len() as i64;
    let feedback = quiz::feedback_line(score, total);
    let answers_json = match serde_json::to_string(&answers) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_update_failed", e.to_string(), None),
    };

    // Compare-and-set on completed: a concurrent submit loses cleanly.
    let sql = format!(
        "UPDATE {} SET answers = ?, score = ?, completed = 1, ai_feedback = ?
         WHERE id = ? AND completed = 0",
        table
    );
    let affected = match conn.execute(&sql, (&answers_json, score, &feedback, &row.id)) {
        Ok(n) => n,
        Err(e) => return err(&req.id, "db_update_failed", e.to_string(), None),
    };
    if affected == 0 {
        return err(&req.id, "conflict", "quiz already submitted", None);
    }

    ok(
        &req.id,
        json!({
            "score": score,
            "totalQuestions": total,
            "feedback": feedback
        }),
    )
}

fn handle_academic_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match require_student(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    submit_quiz(conn, "academic_quiz_history", req, &student_id)
}

fn handle_career_generate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match require_student(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let quiz_date = today_string();

    match load_quiz_row(conn, "career_quiz_history", &student_id, &quiz_date) {
        Ok(Some(row)) if row.completed => return ok(&req.id, quiz_row_json(&row)),
        Ok(_) => {}
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let Some(client) = state.client.as_deref() else {
        return err(
            &req.id,
            "service_unavailable",
            "quiz generation needs the completion service",
            None,
        );
    };

    // The career quiz tracks the roadmap: today's quiz covers today's topic.
    let current_day = match roadmap::student_current_day(conn, &student_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let topic: Option<String> = match conn
        .query_row(
            "SELECT topic FROM daily_roadmap WHERE student_id = ? AND day_number = ?",
            (&student_id, current_day),
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(topic) = topic else {
        return err(&req.id, "not_found", "roadmap not generated", None);
    };

    let career_goal: String = conn
        .query_row(
            "SELECT COALESCE(career_goal, 'Not specified') FROM students WHERE id = ?",
            [&student_id],
            |r| r.get(0),
        )
        .unwrap_or_else(|_| "Not specified".to_string());

    let sheet = match insight::generate_career_quiz(client, &topic, &career_goal) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "career quiz generation failed");
            return err(&req.id, "service_unavailable", e.to_string(), None);
        }
    };
    let questions_json = match serde_json::to_string(&sheet) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_insert_failed", e.to_string(), None),
    };
    let total = sheet.questions.len() as i64;

    if let Err(e) = conn.execute(
        "INSERT INTO career_quiz_history(id, student_id, day_number, topic, quiz_date, questions, total_questions, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, quiz_date)
         DO UPDATE SET day_number = excluded.day_number,
                       topic = excluded.topic,
                       questions = excluded.questions,
                       total_questions = excluded.total_questions,
                       created_at = excluded.created_at
         WHERE completed = 0",
        (
            Uuid::new_v4().to_string(),
            &student_id,
            current_day,
            &topic,
            &quiz_date,
            &questions_json,
            total,
            now_string(),
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "career_quiz_history" })),
        );
    }

    match load_quiz_row(conn, "career_quiz_history", &student_id, &quiz_date) {
        Ok(Some(row)) => {
            let mut body = quiz_row_json(&row);
            body["dayNumber"] = json!(current_day);
            body["topic"] = json!(topic);
            ok(&req.id, body)
        }
        Ok(None) => err(&req.id, "db_query_failed", "quiz row vanished", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_career_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match require_student(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    submit_quiz(conn, "career_quiz_history", req, &student_id)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "quiz.academic.generate" => Some(handle_academic_generate(state, req)),
        "quiz.academic.submit" => Some(handle_academic_submit(state, req)),
        "quiz.career.generate" => Some(handle_career_generate(state, req)),
        "quiz.career.submit" => Some(handle_career_submit(state, req)),
        _ => None,
    }
}
