use chrono::{DateTime, Utc};
use models::{Question, Quiz};
use serde::Serialize;

/// Read model of a quiz: stored ids plus names resolved at read time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuizView {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub tag_ids: Vec<i64>,
    /// Same length and order as `tag_ids`.
    pub tag_names: Vec<String>,
    pub question_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuizView {
    pub fn new(quiz: &Quiz, category_name: Option<String>, tag_names: Vec<String>) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            category_id: quiz.category_ref_id,
            category_name,
            tag_ids: quiz.tag_ref_ids.clone(),
            tag_names,
            question_count: quiz.questions.len(),
            created_at: quiz.created_at,
            updated_at: quiz.updated_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuizDetailView {
    #[serde(flatten)]
    pub quiz: QuizView,
    pub questions: Vec<Question>,
}
