use serde::{Deserialize, Serialize};

/// One stored quiz payload: a list of multiple-choice questions with the
/// correct option index. `course` ties a question back to an enrolled course
/// so analytics can attribute scores per subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: i64,
    pub question: String,
    pub options: Vec<String>,
    pub correct: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSheet {
    pub questions: Vec<QuizQuestion>,
}

// Rows written by earlier builds hold a bare question array instead of the
// wrapped object. Accept both on read; always write the wrapped form.
#[derive(Deserialize)]
#[serde(untagged)]
enum SheetShape {
    Wrapped { questions: Vec<QuizQuestion> },
    Bare(Vec<QuizQuestion>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizParseError(pub String);

impl std::fmt::Display for QuizParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for QuizParseError {}

pub fn parse_sheet(raw: &str) -> Result<QuizSheet, QuizParseError> {
    let shape: SheetShape =
        serde_json::from_str(raw).map_err(|e| QuizParseError(format!("invalid quiz json: {e}")))?;
    let sheet = match shape {
        SheetShape::Wrapped { questions } => QuizSheet { questions },
        SheetShape::Bare(questions) => QuizSheet { questions },
    };
    validate_sheet(&sheet)?;
    Ok(sheet)
}

pub fn validate_sheet(sheet: &QuizSheet) -> Result<(), QuizParseError> {
    if sheet.questions.is_empty() {
        return Err(QuizParseError("quiz has no questions".to_string()));
    }
    for q in &sheet.questions {
        if q.options.len() < 2 {
            return Err(QuizParseError(format!(
                "question {} has fewer than two options",
                q.id
            )));
        }
        if q.correct >= q.options.len() {
            return Err(QuizParseError(format!(
                "question {} correct index {} out of range",
                q.id, q.correct
            )));
        }
    }
    Ok(())
}

/// Count submitted answer indices that match the stored correct indices.
/// Extra answers beyond the question count are ignored.
pub fn score_answers(sheet: &QuizSheet, answers: &[i64]) -> i64 {
    answers
        .iter()
        .enumerate()
        .filter(|(i, a)| {
            sheet
                .questions
                .get(*i)
                .map(|q| **a >= 0 && q.correct == **a as usize)
                .unwrap_or(false)
        })
        .count() as i64
}

pub fn feedback_line(score: i64, total: i64) -> String {
    let pct = if total > 0 {
        100.0 * score as f64 / total as f64
    } else {
        0.0
    };
    if pct >= 80.0 {
        format!("You scored {score}/{total}. Excellent work, keep it up!")
    } else if pct >= 50.0 {
        format!("You scored {score}/{total}. Good effort, review the questions you missed.")
    } else {
        format!("You scored {score}/{total}. Revisit today's material before tomorrow's quiz.")
    }
}
