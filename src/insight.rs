use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ai::{strip_code_fences, CompletionClient, CompletionParams};
use crate::quiz::{parse_sheet, QuizSheet};
use crate::scoring::WellbeingSample;

/// Narrative analysis block rendered on the analytics page. The fallback
/// object is shaped identically to the parsed model reply, so callers never
/// see a hard failure from this surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionCard {
    pub icon: String,
    pub title: String,
    pub description: String,
    pub progress: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoadmapDayPlan {
    pub day: i64,
    pub topic: String,
    #[serde(default)]
    pub description: String,
}

pub struct AnalysisInput<'a> {
    pub gpa: f64,
    pub predicted_gpa: f64,
    pub confidence_level: i64,
    pub risk_level: &'a str,
    pub career_goal: &'a str,
    pub courses: &'a [String],
    pub quiz_summary: &'a str,
}

pub fn performance_analysis(
    client: Option<&dyn CompletionClient>,
    input: &AnalysisInput<'_>,
) -> Analysis {
    let Some(client) = client else {
        return Analysis {
            strengths: vec![
                "Consistent attendance and participation".to_string(),
                "Strong performance in quizzes".to_string(),
                "Good time management skills".to_string(),
            ],
            improvements: vec![
                "Focus on areas with lower quiz scores".to_string(),
                "Increase study time for challenging subjects".to_string(),
                "Seek additional support when needed".to_string(),
            ],
            recommendations: vec![
                "Continue current study habits".to_string(),
                "Join study groups for collaborative learning".to_string(),
                "Schedule regular review sessions".to_string(),
                "Utilize office hours for questions".to_string(),
                "Practice active recall techniques".to_string(),
            ],
        };
    };

    let course_list = if input.courses.is_empty() {
        "No courses enrolled".to_string()
    } else {
        input.courses.join(", ")
    };

    let prompt = format!(
        "Analyze this student's academic performance and provide personalized insights:\n\n\
         **Student Profile:**\n\
         - Current GPA: {:.2}/4.0\n\
         - Predicted GPA: {:.2}/4.0\n\
         - Confidence Level: {}%\n\
         - Risk Level: {}\n\
         - Career Goal: {}\n\
         - Enrolled Courses: {}\n\
         - Quiz Performance: {}\n\n\
         Provide a detailed analysis with:\n\
         1. **Strengths** (3-5 items): Specific positive aspects based on their data\n\
         2. **Areas for Improvement** (3-5 items): Concrete areas where they can improve\n\
         3. **AI Recommendations** (5-7 items): Actionable, personalized recommendations\n\n\
         Format as JSON:\n\
         {{\n\
             \"strengths\": [\"strength1\", \"strength2\", ...],\n\
             \"improvements\": [\"improvement1\", \"improvement2\", ...],\n\
             \"recommendations\": [\"rec1\", \"rec2\", ...]\n\
         }}\n\n\
         Keep each item concise (under 100 characters).",
        input.gpa,
        input.predicted_gpa,
        input.confidence_level,
        input.risk_level,
        input.career_goal,
        course_list,
        input.quiz_summary,
    );

    let params = CompletionParams {
        max_tokens: 800,
        temperature: 0.7,
    };
    match client
        .complete(None, &prompt, &params)
        .and_then(|raw| Ok(serde_json::from_str::<Analysis>(strip_code_fences(&raw))?))
    {
        Ok(analysis) => analysis,
        Err(e) => {
            warn!(error = %e, "performance analysis fell back to canned text");
            Analysis {
                strengths: vec![
                    format!(
                        "Current GPA of {:.2} shows solid academic foundation",
                        input.gpa
                    ),
                    format!(
                        "Confidence level of {}% indicates good mental wellbeing",
                        input.confidence_level
                    ),
                    "Consistent engagement with course materials".to_string(),
                ],
                improvements: vec![
                    "Focus on maintaining consistent study schedule".to_string(),
                    "Seek additional support in challenging topics".to_string(),
                    "Balance academic workload with self-care".to_string(),
                ],
                recommendations: vec![
                    format!(
                        "Leverage your {} risk status by maintaining current habits",
                        input.risk_level.to_lowercase()
                    ),
                    "Schedule regular study sessions throughout the week".to_string(),
                    "Utilize campus resources like tutoring and office hours".to_string(),
                    "Join study groups to enhance understanding".to_string(),
                    "Practice active learning techniques for better retention".to_string(),
                ],
            }
        }
    }
}

/// Ask the model for a single 0-100 confidence estimate over recent wellbeing
/// rows. The caller blends the result and swallows any failure.
pub fn confidence_estimate(
    client: &dyn CompletionClient,
    samples: &[WellbeingSample],
) -> anyhow::Result<i64> {
    let lines: Vec<String> = samples
        .iter()
        .take(5)
        .enumerate()
        .map(|(i, w)| {
            format!(
                "Day {}: Happiness={}, Stress={}, Energy={}",
                i + 1,
                w.happiness,
                w.stress,
                w.energy
            )
        })
        .collect();

    let prompt = format!(
        "Based on these recent wellbeing scores:\n{}\n\n\
         Analyze the student's confidence level and provide a score from 0-100, where:\n\
         - 80-100: Highly confident, consistent positive wellbeing\n\
         - 60-79: Good confidence, stable mental state\n\
         - 40-59: Moderate confidence, some fluctuation\n\
         - 20-39: Low confidence, needs support\n\
         - 0-19: Very low confidence, immediate attention needed\n\n\
         Respond with just the number (0-100).",
        lines.join("\n")
    );

    let params = CompletionParams {
        max_tokens: 10,
        temperature: 0.5,
    };
    let raw = client.complete(None, &prompt, &params)?;
    let value: i64 = raw.trim().parse()?;
    Ok(value.clamp(0, 100))
}

pub struct InsightsInput<'a> {
    pub gpa: f64,
    pub completion_rate: i64,
    pub courses_info: &'a str,
    pub career_goal: &'a str,
}

pub fn dashboard_insights(
    client: Option<&dyn CompletionClient>,
    input: &InsightsInput<'_>,
) -> Vec<Insight> {
    let fallback = || {
        vec![
            Insight {
                kind: "success".to_string(),
                text: "Great progress! Your recent quiz performance is trending upward."
                    .to_string(),
            },
            Insight {
                kind: "warning".to_string(),
                text: "One of your courses is falling behind. Consider scheduling a tutoring session."
                    .to_string(),
            },
            Insight {
                kind: "info".to_string(),
                text: "Based on your career goal, check the recommended courses for next semester."
                    .to_string(),
            },
        ]
    };

    let Some(client) = client else {
        return fallback();
    };

    let prompt = format!(
        "Generate 3 brief AI-powered insights for a student with:\n\
         GPA: {}\n\
         Completion Rate: {}%\n\
         Courses: {}\n\
         Career Goal: {}\n\n\
         Provide 3 specific, actionable insights (one positive, one suggestion, one recommendation).\n\
         Format as JSON array of objects with 'type' (success/warning/info) and 'text' fields.\n\
         Keep each insight under 100 characters.",
        input.gpa, input.completion_rate, input.courses_info, input.career_goal
    );

    let params = CompletionParams {
        max_tokens: 300,
        temperature: 0.7,
    };
    match client
        .complete(None, &prompt, &params)
        .and_then(|raw| Ok(serde_json::from_str::<Vec<Insight>>(strip_code_fences(&raw))?))
    {
        Ok(insights) => insights,
        Err(e) => {
            warn!(error = %e, "dashboard insights fell back to canned text");
            fallback()
        }
    }
}

/// Pick up to 3 catalog course codes aligned with the career goal. None means
/// the model was unavailable or unusable; the caller applies its own fallback.
pub fn course_recommendations(
    client: Option<&dyn CompletionClient>,
    career_goal: &str,
    catalog_lines: &[String],
) -> Option<Vec<String>> {
    let client = client?;
    if catalog_lines.is_empty() {
        return Some(Vec::new());
    }

    let listing: Vec<&str> = catalog_lines.iter().take(15).map(String::as_str).collect();
    let prompt = format!(
        "Based on this career goal: \"{}\"\n\n\
         Available courses:\n{}\n\n\
         Recommend exactly 3 courses that best align with the career goal.\n\
         Return ONLY a JSON array of course codes, e.g., [\"IS 6100\", \"IS 6200\", \"IS 6300\"]",
        career_goal,
        listing.join("\n")
    );

    let params = CompletionParams {
        max_tokens: 100,
        temperature: 0.7,
    };
    match client
        .complete(None, &prompt, &params)
        .and_then(|raw| Ok(serde_json::from_str::<Vec<String>>(strip_code_fences(&raw))?))
    {
        Ok(codes) => Some(codes),
        Err(e) => {
            warn!(error = %e, "course recommendations fell back to catalog order");
            None
        }
    }
}

/// Prediction cards for the analytics page. Purely presentational; no model
/// call is involved despite the original's naming.
pub fn prediction_cards(gpa: f64, predicted_gpa: f64, confidence_level: i64) -> Vec<PredictionCard> {
    let trend = if predicted_gpa > gpa {
        "improving"
    } else {
        "maintaining"
    };
    let gpa_progress = ((gpa / 4.0) * 100.0).min(100.0) as i64;
    let confidence_progress = confidence_level.clamp(0, 100);

    vec![
        PredictionCard {
            icon: "check".to_string(),
            title: "On Track for Dean's List".to_string(),
            description: "Maintain current performance to qualify for academic honors".to_string(),
            progress: gpa_progress,
        },
        PredictionCard {
            icon: "alert".to_string(),
            title: "Consistency Watch".to_string(),
            description: "Predicted grade may drop without steady daily quiz practice".to_string(),
            progress: confidence_progress,
        },
        PredictionCard {
            icon: "trend".to_string(),
            title: "Semester Trajectory".to_string(),
            description: format!("Projected GPA {:.2} with an {} trajectory", predicted_gpa, trend),
            progress: ((predicted_gpa / 4.0) * 100.0).min(100.0) as i64,
        },
    ]
}

pub fn generate_academic_quiz(
    client: &dyn CompletionClient,
    career_goal: &str,
    courses: &[String],
) -> anyhow::Result<QuizSheet> {
    let courses_list = courses.join(", ");
    let prompt = format!(
        "Generate a 10-question multiple choice quiz for a Master's student.\n\
         Career goal: {}\n\
         Current courses: {}\n\n\
         Create questions that test knowledge relevant to their career goal and current subjects.\n\
         Tag every question with the course it belongs to (one of the current courses).\n\n\
         Return ONLY a valid JSON object in this exact format (no markdown, no extra text):\n\
         {{\n\
           \"questions\": [\n\
             {{\n\
               \"id\": 1,\n\
               \"question\": \"Question text here?\",\n\
               \"options\": [\"Option A\", \"Option B\", \"Option C\", \"Option D\"],\n\
               \"correct\": 0,\n\
               \"course\": \"Course name\"\n\
             }}\n\
           ]\n\
         }}\n\n\
         The \"correct\" field should be the index (0-3) of the correct option.\n\
         Generate exactly 10 questions.",
        career_goal, courses_list
    );

    let params = CompletionParams {
        max_tokens: 2000,
        temperature: 0.8,
    };
    let raw = client.complete(None, &prompt, &params)?;
    Ok(parse_sheet(strip_code_fences(&raw))?)
}

pub fn generate_career_quiz(
    client: &dyn CompletionClient,
    topic: &str,
    career_goal: &str,
) -> anyhow::Result<QuizSheet> {
    let prompt = format!(
        "Generate a 10-question multiple choice quiz on the topic \"{}\" for a student \
         working toward this career goal: {}\n\n\
         Return ONLY a valid JSON object in this exact format (no markdown, no extra text):\n\
         {{\n\
           \"questions\": [\n\
             {{\n\
               \"id\": 1,\n\
               \"question\": \"Question text here?\",\n\
               \"options\": [\"Option A\", \"Option B\", \"Option C\", \"Option D\"],\n\
               \"correct\": 0\n\
             }}\n\
           ]\n\
         }}\n\n\
         The \"correct\" field should be the index (0-3) of the correct option.\n\
         Generate exactly 10 questions.",
        topic, career_goal
    );

    let params = CompletionParams {
        max_tokens: 2000,
        temperature: 0.8,
    };
    let raw = client.complete(None, &prompt, &params)?;
    Ok(parse_sheet(strip_code_fences(&raw))?)
}

pub fn generate_roadmap_plan(
    client: &dyn CompletionClient,
    career_goal: &str,
) -> anyhow::Result<Vec<RoadmapDayPlan>> {
    let system = "You are an expert curriculum designer. Return only valid JSON array with 90 learning topics.";
    let prompt = format!(
        "Create a 90-day learning roadmap for: {}\n\n\
         Generate day-by-day topics (1-90) that progress from basics to advanced. \
         Each day = 2 hours of study.\n\n\
         Return ONLY a JSON array with 90 objects:\n\
         [{{\"day\": 1, \"topic\": \"Introduction to Machine Learning\", \"description\": \"Learn ML basics and terminology\"}}, ...]\n\n\
         Keep descriptions under 15 words. Focus on: fundamentals, then tools, then projects, then advanced topics.",
        career_goal
    );

    let params = CompletionParams {
        max_tokens: 6000,
        temperature: 0.6,
    };
    let raw = client.complete(Some(system), &prompt, &params)?;
    let plan: Vec<RoadmapDayPlan> = serde_json::from_str(strip_code_fences(&raw))?;
    anyhow::ensure!(!plan.is_empty(), "roadmap plan is empty");
    Ok(plan)
}

pub fn generate_day_theory(
    client: &dyn CompletionClient,
    topic: &str,
    career_goal: &str,
) -> anyhow::Result<String> {
    let prompt = format!(
        "Write a short study primer (3-4 paragraphs) on \"{}\" for a student working \
         toward this career goal: {}. Cover the core concepts, why the topic matters, \
         and one practical exercise. Plain text only.",
        topic, career_goal
    );
    let params = CompletionParams {
        max_tokens: 600,
        temperature: 0.7,
    };
    let raw = client.complete(None, &prompt, &params)?;
    Ok(raw.trim().to_string())
}

pub fn day_theory_fallback(topic: &str) -> String {
    format!(
        "Learn about {} fundamentals and applications. Work through the core concepts, \
         then apply them in a small hands-on exercise.",
        topic
    )
}

pub fn wellbeing_insight(
    client: Option<&dyn CompletionClient>,
    total_score: i64,
    happiness: i64,
    stress: i64,
    energy: i64,
) -> String {
    let fallback = || {
        format!(
            "Your overall wellbeing score is {}. Keep up the positive momentum!",
            total_score
        )
    };

    let Some(client) = client else {
        return fallback();
    };

    let prompt = format!(
        "A student's wellbeing check-in today: overall {}, happiness {}, stress {}, energy {}.\n\
         Write one short encouraging sentence (under 120 characters) reacting to these scores.",
        total_score, happiness, stress, energy
    );
    let params = CompletionParams {
        max_tokens: 60,
        temperature: 0.7,
    };
    match client.complete(None, &prompt, &params) {
        Ok(raw) => raw.trim().to_string(),
        Err(e) => {
            warn!(error = %e, "wellbeing insight fell back to canned text");
            fallback()
        }
    }
}

pub fn chat_system_prompt(
    first_name: &str,
    last_name: &str,
    career_goal: &str,
    courses_list: &str,
) -> String {
    format!(
        "You are the ForgeEd assistant, an AI academic tutor.\n\
         You are helping {} {}, a Master's student.\n\
         Their career goal is: {}\n\
         Their current enrolled courses are: {}\n\n\
         Provide helpful, accurate, and encouraging responses related to:\n\
         - Course content and concepts\n\
         - Assignment guidance\n\
         - Study strategies\n\
         - Career and research questions\n\n\
         Keep responses concise, supportive, and academically focused.",
        first_name, last_name, career_goal, courses_list
    )
}
