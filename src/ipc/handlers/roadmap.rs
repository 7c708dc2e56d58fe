use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::insight;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{param_i64, require_student, today};
use crate::ipc::types::{AppState, Request};

pub const ROADMAP_DAYS: i64 = 90;

/// Day-lock: the newest accessible roadmap day, derived from account age.
/// Day 1 unlocks on the account's creation date.
pub fn current_day_for(created_at: &str, today: NaiveDate) -> i64 {
    let created = created_at
        .get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .unwrap_or(today);
    let elapsed = (today - created).num_days().max(0);
    (elapsed + 1).min(ROADMAP_DAYS)
}

pub fn student_current_day(
    conn: &Connection,
    student_id: &str,
) -> Result<i64, rusqlite::Error> {
    let created_at: String = conn.query_row(
        "SELECT created_at FROM students WHERE id = ?",
        [student_id],
        |r| r.get(0),
    )?;
    Ok(current_day_for(&created_at, today()))
}

fn handle_roadmap_generate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match require_student(state, req) {
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
            "roadmap generation needs the completion service",
            None,
        );
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
    let career_goal = career_goal.unwrap_or_else(|| "Not specified".to_string());

    let plan = match insight::generate_roadmap_plan(client, &career_goal) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "roadmap plan generation failed");
            return err(&req.id, "service_unavailable", e.to_string(), None);
        }
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    let mut written = 0_i64;
    for day in &plan {
        if day.day < 1 || day.day > ROADMAP_DAYS {
            continue;
        }
        let res = tx.execute(
            "INSERT INTO daily_roadmap(id, student_id, day_number, topic, theory_content, study_duration)
             VALUES(?, ?, ?, ?, ?, 120)
             ON CONFLICT(student_id, day_number)
             DO UPDATE SET topic = excluded.topic, theory_content = excluded.theory_content",
            (
                Uuid::new_v4().to_string(),
                &student_id,
                day.day,
                &day.topic,
                &day.description,
            ),
        );
        if let Err(e) = res {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "daily_roadmap" })),
            );
        }
        written += 1;
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "days": written }))
}

fn handle_roadmap_overview(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match require_student(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let current_day = match student_current_day(conn, &student_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut stmt = match conn.prepare(
        "SELECT day_number, topic, is_completed, study_duration
         FROM daily_roadmap
         WHERE student_id = ?
         ORDER BY day_number",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let days = stmt
        .query_map([&student_id], |r| {
            let day_number: i64 = r.get(0)?;
            Ok(json!({
                "dayNumber": day_number,
                "topic": r.get::<_, String>(1)?,
                "isCompleted": r.get::<_, i64>(2)? != 0,
                "studyDuration": r.get::<_, i64>(3)?,
                "locked": day_number > current_day
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match days {
        Ok(days) => ok(
            &req.id,
            json!({ "currentDay": current_day, "days": days }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_roadmap_day(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match require_student(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let day_number = match param_i64(req, "dayNumber") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if !(1..=ROADMAP_DAYS).contains(&day_number) {
        return err(&req.id, "bad_params", "dayNumber must be 1-90", None);
    }
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let current_day = match student_current_day(conn, &student_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if day_number > current_day {
        return err(
            &req.id,
            "locked",
            format!("day {} is not unlocked yet", day_number),
            Some(json!({ "currentDay": current_day })),
        );
    }

    let row: Option<(String, String, Option<String>, i64, i64)> = match conn
        .query_row(
            "SELECT id, topic, theory_content, is_completed, study_duration
             FROM daily_roadmap
             WHERE student_id = ? AND day_number = ?",
            (&student_id, day_number),
            |r| {
                Ok((
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                ))
            },
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some((row_id, topic, theory, is_completed, study_duration)) = row else {
        return err(&req.id, "not_found", "roadmap day not found", None);
    };

    // Theory is generated on first access and cached in the row. A fallback
    // text is served when generation fails, but never cached, so a later
    // request can still fill the real content.
    let theory = match theory.filter(|t| !t.trim().is_empty()) {
        Some(t) => t,
        None => {
            let career_goal: String = conn
                .query_row(
                    "SELECT COALESCE(career_goal, 'Not specified') FROM students WHERE id = ?",
                    [&student_id],
                    |r| r.get(0),
                )
                .unwrap_or_else(|_| "Not specified".to_string());
            match state
                .client
                .as_deref()
                .map(|c| insight::generate_day_theory(c, &topic, &career_goal))
            {
                Some(Ok(text)) => {
                    if let Err(e) = conn.execute(
                        "UPDATE daily_roadmap SET theory_content = ? WHERE id = ?",
                        (&text, &row_id),
                    ) {
                        return err(&req.id, "db_update_failed", e.to_string(), None);
                    }
                    text
                }
                Some(Err(e)) => {
                    warn!(error = %e, "day theory generation failed");
                    insight::day_theory_fallback(&topic)
                }
                None => insight::day_theory_fallback(&topic),
            }
        }
    };

    ok(
        &req.id,
        json!({
            "dayNumber": day_number,
            "topic": topic,
            "theory": theory,
            "isCompleted": is_completed != 0,
            "studyDuration": study_duration
        }),
    )
}

fn handle_roadmap_complete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match require_student(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let day_number = match param_i64(req, "dayNumber") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if !(1..=ROADMAP_DAYS).contains(&day_number) {
        return err(&req.id, "bad_params", "dayNumber must be 1-90", None);
    }
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let current_day = match student_current_day(conn, &student_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if day_number > current_day {
        return err(
            &req.id,
            "locked",
            format!("day {} is not unlocked yet", day_number),
            Some(json!({ "currentDay": current_day })),
        );
    }

    let affected = match conn.execute(
        "UPDATE daily_roadmap SET is_completed = 1 WHERE student_id = ? AND day_number = ?",
        (&student_id, day_number),
    ) {
        Ok(n) => n,
        Err(e) => return err(&req.id, "db_update_failed", e.to_string(), None),
    };
    if affected == 0 {
        return err(&req.id, "not_found", "roadmap day not found", None);
    }

    // Keep the stored completion rate in step with the roadmap.
    let completion_rate: i64 = match conn.query_row(
        "SELECT CAST(ROUND(100.0 * SUM(is_completed) / ?) AS INTEGER)
         FROM daily_roadmap WHERE student_id = ?",
        (ROADMAP_DAYS, &student_id),
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(e) = conn.execute(
        "UPDATE students SET completion_rate = ? WHERE id = ?",
        (completion_rate, &student_id),
    ) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    ok(
        &req.id,
        json!({
            "dayNumber": day_number,
            "isCompleted": true,
            "completionRate": completion_rate
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roadmap.generate" => Some(handle_roadmap_generate(state, req)),
        "roadmap.overview" => Some(handle_roadmap_overview(state, req)),
        "roadmap.day" => Some(handle_roadmap_day(state, req)),
        "roadmap.complete" => Some(handle_roadmap_complete(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn day_one_unlocks_on_creation_day() {
        assert_eq!(current_day_for("2026-08-23", date(2026, 8, 23)), 1);
    }

    #[test]
    fn day_advances_with_account_age() {
        assert_eq!(current_day_for("2026-08-19", date(2026, 8, 23)), 5);
    }

    #[test]
    fn day_caps_at_ninety() {
        assert_eq!(current_day_for("2025-01-01", date(2026, 8, 23)), 90);
    }

    #[test]
    fn rfc3339_timestamps_are_accepted() {
        assert_eq!(
            current_day_for("2026-08-20T14:02:00+00:00", date(2026, 8, 23)),
            4
        );
    }

    #[test]
    fn unparseable_created_at_defaults_to_day_one() {
        assert_eq!(current_day_for("garbage", date(2026, 8, 23)), 1);
    }
}
