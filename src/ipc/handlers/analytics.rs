use rusqlite::OptionalExtension;
use serde_json::json;
use tracing::warn;

use crate::insight::{self, AnalysisInput};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{require_student, today};
use crate::ipc::types::{AppState, Request};
use crate::scoring::{self, AnalyticsContext};

fn handle_analytics_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match require_student(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student: Option<(f64, Option<String>)> = match conn
        .query_row(
            "SELECT gpa, career_goal FROM students WHERE id = ?",
            [&student_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some((gpa, career_goal)) = student else {
        return err(&req.id, "not_found", "student not found", None);
    };
    let career_goal = career_goal.unwrap_or_else(|| "Not specified".to_string());

    let ctx = AnalyticsContext {
        conn,
        student_id: &student_id,
    };

    let quiz_percentages = match scoring::load_recent_quiz_percentages(&ctx, 10) {
        Ok(v) => v,
        Err(e) => return err(&req.id, &e.code, e.message, None),
    };
    let predicted_gpa = scoring::round2(scoring::predicted_gpa(gpa, &quiz_percentages));
    let risk = scoring::risk_level(&quiz_percentages);

    let samples = match scoring::load_wellbeing_samples(&ctx, 7) {
        Ok(v) => v,
        Err(e) => return err(&req.id, &e.code, e.message, None),
    };
    let base = scoring::confidence_base(&samples);
    // The model estimate only enters with enough wellbeing signal behind it.
    let confidence_level = match state.client.as_deref() {
        Some(client) if samples.len() >= 3 => {
            match insight::confidence_estimate(client, &samples) {
                Ok(estimate) => scoring::blend_confidence(base, estimate),
                Err(e) => {
                    warn!(error = %e, "confidence estimate failed");
                    base as i64
                }
            }
        }
        _ => base as i64,
    };

    let gpa_history = match scoring::compute_gpa_history(&ctx, gpa, today()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, &e.code, e.message, None),
    };
    let subjects = match scoring::compute_subject_performance(&ctx) {
        Ok(v) => v,
        Err(e) => return err(&req.id, &e.code, e.message, None),
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

    let quiz_summary = if quiz_percentages.is_empty() {
        "No quiz data".to_string()
    } else {
        let avg = quiz_percentages.iter().sum::<f64>() / quiz_percentages.len() as f64;
        format!("Average quiz score: {:.1}%", avg)
    };

    let analysis = insight::performance_analysis(
        state.client.as_deref(),
        &AnalysisInput {
            gpa,
            predicted_gpa,
            confidence_level,
            risk_level: risk.as_str(),
            career_goal: &career_goal,
            courses: &courses,
            quiz_summary: &quiz_summary,
        },
    );
    let predictions = insight::prediction_cards(gpa, predicted_gpa, confidence_level);

    ok(
        &req.id,
        json!({
            "gpa": gpa,
            "predictedGpa": predicted_gpa,
            "confidenceLevel": confidence_level,
            "riskLevel": risk.as_str(),
            "gpaHistory": {
                "dates": gpa_history.dates,
                "values": gpa_history.values
            },
            "subjectPerformance": {
                "subjects": subjects.subjects,
                "current": subjects.current,
                "predicted": subjects.predicted
            },
            "analysis": analysis,
            "predictions": predictions
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.open" => Some(handle_analytics_open(state, req)),
        _ => None,
    }
}
