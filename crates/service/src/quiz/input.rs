use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Body of a create or update request.
///
/// Every field is optional so the same type serves partial updates. For the
/// nullable fields the outer `Option` says whether the field was sent at all;
/// an explicit `null` arrives as `Some(None)` / `Some(Value::Null)` and clears it.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct QuizInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    /// Raw candidate; checked by the reference validator.
    #[serde(
        default,
        alias = "category_id_external",
        alias = "category_id_external_input",
        deserialize_with = "present"
    )]
    pub category_id: Option<Value>,
    #[serde(
        default,
        alias = "tag_ids_external",
        alias = "tag_ids_external_input",
        deserialize_with = "present"
    )]
    pub tag_ids: Option<Option<Vec<Value>>>,
    /// Replaces all questions when sent.
    #[serde(default)]
    pub questions: Option<Vec<QuestionInput>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QuestionInput {
    pub text: String,
    #[serde(default)]
    pub choices: Vec<ChoiceInput>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChoiceInput {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

impl QuizInput {
    pub fn titled(title: impl Into<String>) -> Self {
        Self { title: Some(title.into()), ..Self::default() }
    }

    pub fn with_category(mut self, candidate: Value) -> Self {
        self.category_id = Some(candidate);
        self
    }

    pub fn with_tags(mut self, candidates: Vec<Value>) -> Self {
        self.tag_ids = Some(Some(candidates));
        self
    }

    pub fn with_question(mut self, question: QuestionInput) -> Self {
        self.questions.get_or_insert_with(Vec::new).push(question);
        self
    }

    /// Tag candidates to validate, if the field was sent. `null` counts as an empty list.
    pub(crate) fn tag_candidates(&self) -> Option<&[Value]> {
        self.tag_ids.as_ref().map(|tags| tags.as_deref().unwrap_or(&[]))
    }
}

impl QuestionInput {
    pub fn new(text: impl Into<String>, choices: Vec<ChoiceInput>) -> Self {
        Self { text: text.into(), choices }
    }
}

impl ChoiceInput {
    pub fn new(text: impl Into<String>, is_correct: bool) -> Self {
        Self { text: text.into(), is_correct }
    }
}

/// Marks a field as sent even when its value is `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
