use serde_json::json;
use uuid::Uuid;

use crate::insight;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{param_i64, require_student, today_string};
use crate::ipc::types::{AppState, Request};
use crate::scoring;

fn handle_wellbeing_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match require_student(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let mut scores = [0_i64; 5];
    for (slot, key) in scores.iter_mut().zip([
        "happiness",
        "stress",
        "energy",
        "motivation",
        "sleepQuality",
    ]) {
        let value = match param_i64(req, key) {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        if !(0..=100).contains(&value) {
            return err(
                &req.id,
                "bad_params",
                format!("{} must be between 0 and 100", key),
                None,
            );
        }
        *slot = value;
    }
    let [happiness, stress, energy, motivation, sleep_quality] = scores;

    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let total = scoring::wellbeing_total(happiness, stress, energy, motivation, sleep_quality);
    let insight_text =
        insight::wellbeing_insight(state.client.as_deref(), total, happiness, stress, energy);
    let assessment_date = today_string();

    // One assessment per day; a resubmission replaces it in place.
    if let Err(e) = conn.execute(
        "INSERT INTO wellbeing_assessments(
            id, student_id, assessment_date, happiness_score, stress_score,
            energy_score, motivation_score, sleep_quality, total_score, ai_insights)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, assessment_date)
         DO UPDATE SET happiness_score = excluded.happiness_score,
                       stress_score = excluded.stress_score,
                       energy_score = excluded.energy_score,
                       motivation_score = excluded.motivation_score,
                       sleep_quality = excluded.sleep_quality,
                       total_score = excluded.total_score,
                       ai_insights = excluded.ai_insights",
        (
            Uuid::new_v4().to_string(),
            &student_id,
            &assessment_date,
            happiness,
            stress,
            energy,
            motivation,
            sleep_quality,
            total,
            &insight_text,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "wellbeing_assessments" })),
        );
    }

    ok(
        &req.id,
        json!({
            "totalScore": total,
            "insight": insight_text,
            "assessmentDate": assessment_date
        }),
    )
}

fn handle_wellbeing_history(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match require_student(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let mut stmt = match conn.prepare(
        "SELECT assessment_date, happiness_score, stress_score, energy_score,
                motivation_score, sleep_quality, total_score, ai_insights
         FROM wellbeing_assessments
         WHERE student_id = ?
         ORDER BY assessment_date DESC
         LIMIT 30",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([&student_id], |r| {
            Ok(json!({
                "assessmentDate": r.get::<_, String>(0)?,
                "happiness": r.get::<_, i64>(1)?,
                "stress": r.get::<_, i64>(2)?,
                "energy": r.get::<_, i64>(3)?,
                "motivation": r.get::<_, i64>(4)?,
                "sleepQuality": r.get::<_, i64>(5)?,
                "totalScore": r.get::<_, i64>(6)?,
                "insight": r.get::<_, Option<String>>(7)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(assessments) => ok(&req.id, json!({ "assessments": assessments })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "wellbeing.submit" => Some(handle_wellbeing_submit(state, req)),
        "wellbeing.history" => Some(handle_wellbeing_history(state, req)),
        _ => None,
    }
}
