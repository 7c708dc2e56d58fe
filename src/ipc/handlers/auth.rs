use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::param_str;
use crate::ipc::types::{AppState, Request};

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let email = match param_str(req, "email") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let password = match param_str(req, "password") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    // Plaintext credential match, as the original stores them. Hashing is a
    // known gap, tracked outside this surface.
    let row: Option<(String, String, i64)> = match conn
        .query_row(
            "SELECT id, first_name, is_admin FROM students WHERE email = ? AND password = ?",
            (&email, &password),
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let Some((student_id, first_name, is_admin)) = row else {
        return err(&req.id, "unauthorized", "invalid credentials", None);
    };

    let token = Uuid::new_v4().to_string();
    state.sessions.insert(token.clone(), student_id.clone());

    ok(
        &req.id,
        json!({
            "token": token,
            "studentId": student_id,
            "firstName": first_name,
            "isAdmin": is_admin != 0
        }),
    )
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    let token = match param_str(req, "token") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let removed = state.sessions.remove(&token).is_some();
    ok(&req.id, json!({ "loggedOut": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.login" => Some(handle_login(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        _ => None,
    }
}
