use rusqlite::OptionalExtension;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::ai::CompletionParams;
use crate::insight;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{now_string, param_str, require_student};
use crate::ipc::types::{AppState, Request};

fn handle_chat_send(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match require_student(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let message = match param_str(req, "message") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(client) = state.client.as_deref() else {
        return err(
            &req.id,
            "service_unavailable",
            "assistant is not configured",
            None,
        );
    };

    let student: Option<(String, String, Option<String>)> = match conn
        .query_row(
            "SELECT first_name, last_name, career_goal FROM students WHERE id = ?",
            [&student_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some((first_name, last_name, career_goal)) = student else {
        return err(&req.id, "not_found", "student not found", None);
    };

    let mut stmt = match conn.prepare(
        "SELECT c.course_code, c.course_name
         FROM enrolled_courses ec
         JOIN courses c ON ec.course_id = c.id
         WHERE ec.student_id = ?",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let courses = stmt
        .query_map([&student_id], |r| {
            Ok(format!(
                "{} ({})",
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    let courses = match courses {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    drop(stmt);

    let system = insight::chat_system_prompt(
        &first_name,
        &last_name,
        career_goal.as_deref().unwrap_or("Not specified"),
        &courses.join(", "),
    );
    let params = CompletionParams {
        max_tokens: 500,
        temperature: 0.7,
    };

    // Chat has no canned fallback: a dead assistant is surfaced, not masked.
    let response = match client.complete(Some(&system), &message, &params) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "chat completion failed");
            return err(&req.id, "service_unavailable", e.to_string(), None);
        }
    };

    if let Err(e) = conn.execute(
        "INSERT INTO chat_history(id, student_id, message, response, created_at)
         VALUES(?, ?, ?, ?, ?)",
        (
            Uuid::new_v4().to_string(),
            &student_id,
            &message,
            &response,
            now_string(),
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "chat_history" })),
        );
    }
    if let Err(e) = conn.execute(
        "UPDATE students SET chat_sessions = chat_sessions + 1 WHERE id = ?",
        [&student_id],
    ) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "response": response }))
}

fn handle_chat_history(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match require_student(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let mut stmt = match conn.prepare(
        "SELECT message, response, created_at
         FROM chat_history
         WHERE student_id = ?
         ORDER BY created_at DESC
         LIMIT 10",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([&student_id], |r| {
            Ok(json!({
                "message": r.get::<_, String>(0)?,
                "response": r.get::<_, String>(1)?,
                "createdAt": r.get::<_, String>(2)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(mut messages) => {
            // Oldest first for display.
            messages.reverse();
            ok(&req.id, json!({ "messages": messages }))
        }
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "chat.send" => Some(handle_chat_send(state, req)),
        "chat.history" => Some(handle_chat_history(state, req)),
        _ => None,
    }
}
