//! Scoring of submitted answers against a quiz's correct choices.

use models::Quiz;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: i64,
    pub choice_id: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AnswerOutcome {
    Graded {
        question_id: i64,
        correct: bool,
        /// The first correct choice, present only when the answer was wrong.
        correct_choice: Option<i64>,
    },
    Unmatched { question_id: i64, error: String },
}

impl AnswerOutcome {
    pub fn is_correct(&self) -> bool {
        matches!(self, AnswerOutcome::Graded { correct: true, .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GradeReport {
    pub quiz_id: i64,
    /// `"<correct>/<answered>"`
    pub score: String,
    pub percentage: u32,
    pub results: Vec<AnswerOutcome>,
}

pub fn grade(quiz: &Quiz, answers: &[Answer]) -> GradeReport {
    let results: Vec<AnswerOutcome> = answers
        .iter()
        .map(|answer| {
            let Some((question, choice)) = quiz
                .question(answer.question_id)
                .and_then(|q| q.choice(answer.choice_id).map(|c| (q, c)))
            else {
                return AnswerOutcome::Unmatched {
                    question_id: answer.question_id,
                    error: "not found".to_string(),
                };
            };
            AnswerOutcome::Graded {
                question_id: answer.question_id,
                correct: choice.is_correct,
                correct_choice: if choice.is_correct {
                    None
                } else {
                    question.first_correct_choice().map(|c| c.id)
                },
            }
        })
        .collect();

    let correct = results.iter().filter(|r| r.is_correct()).count();
    let total = results.len();
    let percentage = if total == 0 { 0 } else { (correct * 100 / total) as u32 };
    GradeReport {
        quiz_id: quiz.id,
        score: format!("{correct}/{total}"),
        percentage,
        results,
    }
}
