use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::quiz::{parse_sheet, QuizSheet};

#[derive(Debug, Clone, Serialize)]
pub struct ScoreError {
    pub code: String,
    pub message: String,
}

impl ScoreError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalyticsContext<'a> {
    pub conn: &'a Connection,
    pub student_id: &'a str,
}

/// 2-decimal rounding used everywhere a chart value is produced.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Predicted end-of-semester GPA: 0.6 weight on the stored GPA, 0.4 on the
/// trailing quiz average mapped to the 4.0 scale. No history leaves the
/// stored GPA untouched.
pub fn predicted_gpa(current_gpa: f64, quiz_percentages: &[f64]) -> f64 {
    if quiz_percentages.is_empty() {
        return current_gpa;
    }
    let avg = quiz_percentages.iter().sum::<f64>() / quiz_percentages.len() as f64;
    ((current_gpa * 0.6) + (avg / 100.0 * 4.0 * 0.4)).clamp(0.0, 4.0)
}

#[derive(Debug, Clone, Copy)]
pub struct WellbeingSample {
    pub happiness: i64,
    pub stress: i64,
    pub energy: i64,
    pub motivation: i64,
}

/// Arithmetic confidence over recent wellbeing rows; 50 when there is no
/// history. Each row contributes clamp((happiness+energy+motivation-stress)/3).
pub fn confidence_base(samples: &[WellbeingSample]) -> f64 {
    if samples.is_empty() {
        return 50.0;
    }
    let sum: f64 = samples
        .iter()
        .map(|w| {
            let raw = (w.happiness + w.energy + w.motivation - w.stress) as f64 / 3.0;
            raw.clamp(0.0, 100.0)
        })
        .sum();
    sum / samples.len() as f64
}

/// 50/50 blend of the arithmetic confidence with a model-supplied estimate.
pub fn blend_confidence(base: f64, model_estimate: i64) -> i64 {
    ((base * 0.5) + (model_estimate as f64 * 0.5)) as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sample standard deviation (n-1 denominator). Needs at least 2 values.
fn sample_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Three-tier risk classification over the trailing quiz percentages.
/// A sub-50 average is High no matter how consistent the scores are.
pub fn risk_level(quiz_percentages: &[f64]) -> RiskLevel {
    if quiz_percentages.is_empty() {
        return RiskLevel::Medium;
    }
    let avg = quiz_percentages.iter().sum::<f64>() / quiz_percentages.len() as f64;
    if avg < 50.0 {
        return RiskLevel::High;
    }
    if quiz_percentages.len() >= 3 && sample_stdev(quiz_percentages) >= 15.0 {
        return RiskLevel::Medium;
    }
    if avg >= 80.0 {
        return RiskLevel::Low;
    }
    RiskLevel::Medium
}

#[derive(Debug, Clone, Serialize)]
pub struct GpaHistory {
    pub dates: Vec<String>,
    pub values: Vec<f64>,
}

/// Month-bucketed GPA estimate series. Quiz percentages are grouped by
/// calendar month and mapped to the 4.0 scale; the current month always
/// carries the stored actual GPA, never the estimate.
pub fn gpa_history(
    quizzes: &[(NaiveDate, f64)],
    current_gpa: f64,
    today: NaiveDate,
) -> GpaHistory {
    let current_month = today.format("%Y-%m").to_string();

    let mut monthly: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (date, pct) in quizzes {
        monthly
            .entry(date.format("%Y-%m").to_string())
            .or_default()
            .push(*pct);
    }

    let mut dates = Vec::new();
    let mut values = Vec::new();

    if monthly.is_empty() {
        // No quiz data: a flat six-month series at the stored GPA.
        for i in (0..6).rev() {
            let month = today - Duration::days(i * 30);
            dates.push(month.format("%Y-%m").to_string());
            values.push(current_gpa);
        }
        return GpaHistory { dates, values };
    }

    for (month, pcts) in &monthly {
        if *month == current_month {
            continue;
        }
        let avg = pcts.iter().sum::<f64>() / pcts.len() as f64;
        dates.push(month.clone());
        values.push(round2(avg / 100.0 * 4.0));
    }

    dates.push(current_month);
    values.push(current_gpa);

    GpaHistory { dates, values }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectPerformance {
    pub subjects: Vec<String>,
    pub current: Vec<f64>,
    pub predicted: Vec<f64>,
}

pub struct QuizOutcome {
    pub sheet: QuizSheet,
    pub score: i64,
}

/// Per-course attribution of mixed-subject quiz scores, newest quiz first.
///
/// The attribution assumes strictly proportional scoring across the courses
/// inside one quiz. That is a modeling heuristic, not measured fact; treat
/// the per-subject numbers as estimates.
pub fn subject_performance(
    enrolled_courses: &[String],
    quizzes: &[QuizOutcome],
) -> SubjectPerformance {
    let mut per_course: Vec<Vec<f64>> = vec![Vec::new(); enrolled_courses.len()];

    for quiz in quizzes {
        let question_count = quiz.sheet.questions.len();
        if question_count == 0 {
            continue;
        }
        for (idx, name) in enrolled_courses.iter().enumerate() {
            let count = quiz
                .sheet
                .questions
                .iter()
                .filter(|q| q.course.as_deref() == Some(name.as_str()))
                .count();
            if count == 0 {
                continue;
            }
            let ratio = count as f64 / question_count as f64;
            let estimated = quiz.score as f64 * ratio;
            let percentage = estimated / count as f64 * 100.0;
            per_course[idx].push(round2(percentage / 100.0 * 4.0));
        }
    }

    let mut current = Vec::with_capacity(enrolled_courses.len());
    let mut predicted = Vec::with_capacity(enrolled_courses.len());

    for scores in &per_course {
        if scores.is_empty() {
            // No quiz coverage for this course yet.
            current.push(3.4);
            predicted.push(3.5);
            continue;
        }
        let current_avg = scores.iter().sum::<f64>() / scores.len() as f64;
        current.push(round2(current_avg));

        let p = if scores.len() >= 3 {
            let recent = scores[..3].iter().sum::<f64>() / 3.0;
            let older = scores[scores.len() - 3..].iter().sum::<f64>() / 3.0;
            current_avg + (recent - older) * 0.3
        } else {
            current_avg
        };
        predicted.push(round2(p.clamp(0.0, 4.0)));
    }

    SubjectPerformance {
        subjects: enrolled_courses.to_vec(),
        current,
        predicted,
    }
}

/// Wellbeing total: stress contributes inverted, the rest directly.
pub fn wellbeing_total(
    happiness: i64,
    stress: i64,
    energy: i64,
    motivation: i64,
    sleep_quality: i64,
) -> i64 {
    let sum = happiness + (100 - stress) + energy + motivation + sleep_quality;
    (sum as f64 / 5.0).round() as i64
}

pub fn load_recent_quiz_percentages(
    ctx: &AnalyticsContext<'_>,
    limit: i64,
) -> Result<Vec<f64>, ScoreError> {
    let mut stmt = ctx
        .conn
        .prepare(
            "SELECT score, total_questions
             FROM academic_quiz_history
             WHERE student_id = ? AND completed = 1
             ORDER BY quiz_date DESC
             LIMIT ?",
        )
        .map_err(|e| ScoreError::new("db_query_failed", e.to_string()))?;
    let rows = stmt
        .query_map((ctx.student_id, limit), |r| {
            Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| ScoreError::new("db_query_failed", e.to_string()))?;
    Ok(rows
        .into_iter()
        .filter(|(_, total)| *total > 0)
        .map(|(score, total)| score as f64 / total as f64 * 100.0)
        .collect())
}

pub fn load_wellbeing_samples(
    ctx: &AnalyticsContext<'_>,
    limit: i64,
) -> Result<Vec<WellbeingSample>, ScoreError> {
    let mut stmt = ctx
        .conn
        .prepare(
            "SELECT happiness_score, stress_score, energy_score, motivation_score
             FROM wellbeing_assessments
             WHERE student_id = ?
             ORDER BY assessment_date DESC
             LIMIT ?",
        )
        .map_err(|e| ScoreError::new("db_query_failed", e.to_string()))?;
    stmt.query_map((ctx.student_id, limit), |r| {
        Ok(WellbeingSample {
            happiness: r.get(0)?,
            stress: r.get(1)?,
            energy: r.get(2)?,
            motivation: r.get(3)?,
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(|e| ScoreError::new("db_query_failed", e.to_string()))
}

pub fn compute_gpa_history(
    ctx: &AnalyticsContext<'_>,
    current_gpa: f64,
    today: NaiveDate,
) -> Result<GpaHistory, ScoreError> {
    let six_months_ago = (today - Duration::days(180)).format("%Y-%m-%d").to_string();
    let mut stmt = ctx
        .conn
        .prepare(
            "SELECT quiz_date, score, total_questions
             FROM academic_quiz_history
             WHERE student_id = ? AND completed = 1 AND quiz_date >= ?
             ORDER BY quiz_date ASC",
        )
        .map_err(|e| ScoreError::new("db_query_failed", e.to_string()))?;
    let rows = stmt
        .query_map((ctx.student_id, six_months_ago), |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, i64>(1)?,
                r.get::<_, i64>(2)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| ScoreError::new("db_query_failed", e.to_string()))?;

    let quizzes: Vec<(NaiveDate, f64)> = rows
        .into_iter()
        .filter_map(|(date, score, total)| {
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").ok()?;
            if total <= 0 {
                return None;
            }
            Some((date, score as f64 / total as f64 * 100.0))
        })
        .collect();

    Ok(gpa_history(&quizzes, current_gpa, today))
}

pub fn compute_subject_performance(
    ctx: &AnalyticsContext<'_>,
) -> Result<SubjectPerformance, ScoreError> {
    let mut enrolled_stmt = ctx
        .conn
        .prepare(
            "SELECT c.course_name
             FROM enrolled_courses ec
             JOIN courses c ON ec.course_id = c.id
             WHERE ec.student_id = ?
             ORDER BY ec.enrolled_at",
        )
        .map_err(|e| ScoreError::new("db_query_failed", e.to_string()))?;
    let enrolled: Vec<String> = enrolled_stmt
        .query_map([ctx.student_id], |r| r.get(0))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| ScoreError::new("db_query_failed", e.to_string()))?;

    let mut quiz_stmt = ctx
        .conn
        .prepare(
            "SELECT questions, score
             FROM academic_quiz_history
             WHERE student_id = ? AND completed = 1
             ORDER BY quiz_date DESC
             LIMIT 20",
        )
        .map_err(|e| ScoreError::new("db_query_failed", e.to_string()))?;
    let raw_quizzes: Vec<(String, i64)> = quiz_stmt
        .query_map([ctx.student_id], |r| Ok((r.get(0)?, r.get(1)?)))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| ScoreError::new("db_query_failed", e.to_string()))?;

    // Unparseable payloads are skipped rather than failing the whole report.
    let quizzes: Vec<QuizOutcome> = raw_quizzes
        .into_iter()
        .filter_map(|(raw, score)| {
            let sheet = parse_sheet(&raw).ok()?;
            Some(QuizOutcome { sheet, score })
        })
        .collect();

    Ok(subject_performance(&enrolled, &quizzes))
}
