use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{errors::ModelError, tag_ids};

pub const TITLE_MAX_CHARS: usize = 255;

/// A quiz as stored by the quizzes service.
///
/// `category_ref_id` and `tag_ref_ids` point into the category/tags service.
/// They were valid when last written; nothing keeps them valid afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "category_id_external")]
    pub category_ref_id: Option<i64>,
    #[serde(default, alias = "tag_ids_external", deserialize_with = "tag_ids::deserialize")]
    pub tag_ref_ids: Vec<i64>,
    #[serde(default)]
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub text: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub id: i64,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

impl Quiz {
    pub fn question(&self, id: i64) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

impl Question {
    pub fn choice(&self, id: i64) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == id)
    }

    pub fn first_correct_choice(&self) -> Option<&Choice> {
        self.choices.iter().find(|c| c.is_correct)
    }
}

/// Trim and check a quiz title.
pub fn validate_title(title: &str) -> Result<String, ModelError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ModelError::Validation("title must not be blank".into()));
    }
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        return Err(ModelError::Validation(format!(
            "title must be at most {TITLE_MAX_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Blank descriptions are stored as `None`.
pub fn normalize_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

pub fn validate_question_text(text: &str) -> Result<String, ModelError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ModelError::Validation("question text must not be blank".into()));
    }
    Ok(trimmed.to_string())
}

pub fn validate_choice_text(text: &str) -> Result<String, ModelError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ModelError::Validation("choice text must not be blank".into()));
    }
    Ok(trimmed.to_string())
}
