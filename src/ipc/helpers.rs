use chrono::{Local, NaiveDate};
use rusqlite::{Connection, OptionalExtension};

use super::error::err;
use super::types::{AppState, Request};

/// Resolve the session token in `params.token` to a student id.
/// Absent or unknown tokens map to the `unauthorized` error.
pub fn require_student(state: &AppState, req: &Request) -> Result<String, serde_json::Value> {
    let token = req
        .params
        .get("token")
        .and_then(|v| v.as_str())
        .ok_or_else(|| err(&req.id, "unauthorized", "missing session token", None))?;
    state
        .sessions
        .get(token)
        .cloned()
        .ok_or_else(|| err(&req.id, "unauthorized", "invalid or expired session", None))
}

/// Session check plus the admin-flag check for the admin surface.
pub fn require_admin(
    state: &AppState,
    conn: &Connection,
    req: &Request,
) -> Result<String, serde_json::Value> {
    let student_id = require_student(state, req)?;
    let is_admin: Option<i64> = conn
        .query_row(
            "SELECT is_admin FROM students WHERE id = ?",
            [&student_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    match is_admin {
        Some(flag) if flag != 0 => Ok(student_id),
        _ => Err(err(&req.id, "forbidden", "admin privileges required", None)),
    }
}

pub fn param_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

pub fn param_i64(req: &Request, key: &str) -> Result<i64, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn opt_param_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn opt_param_i64(req: &Request, key: &str) -> Option<i64> {
    req.params.get(key).and_then(|v| v.as_i64())
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn today_string() -> String {
    today().format("%Y-%m-%d").to_string()
}

pub fn now_string() -> String {
    chrono::Utc::now().to_rfc3339()
}
