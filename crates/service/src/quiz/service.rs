use std::fmt;
use std::sync::Arc;

use catalog::ReferenceSource;
use chrono::Utc;
use futures::{future, stream, StreamExt};
use models::quiz::{normalize_description, validate_choice_text, validate_question_text, validate_title};
use models::{Choice, Question, Quiz};
use tracing::{info, instrument, warn};

use super::audit::{audit_quiz, StaleReferences};
use super::grading::{grade, Answer, GradeReport};
use super::input::{QuestionInput, QuizInput};
use super::repository::{QuizDraft, QuizRepository};
use super::view::{QuizDetailView, QuizView};
use crate::errors::ServiceError;
use crate::references::options::{load_options, AvailableOptions, DEFAULT_OPTIONS_PAGE_SIZE};
use crate::references::{ReferenceResolver, ReferenceValidator, ValidationError};

const AUDIT_CONCURRENCY: usize = 4;

/// Where a write stands. Only `Committed` touches the repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WritePhase {
    Pending,
    Validating,
    Committed,
    Rejected,
}

impl fmt::Display for WritePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WritePhase::Pending => "pending",
            WritePhase::Validating => "validating",
            WritePhase::Committed => "committed",
            WritePhase::Rejected => "rejected",
        })
    }
}

/// Quiz business service independent of web framework
pub struct QuizService<S: ReferenceSource, R: QuizRepository> {
    repo: Arc<R>,
    source: Arc<S>,
    validator: ReferenceValidator<S>,
    resolver: ReferenceResolver<S>,
    options_page_size: u32,
}

impl<S: ReferenceSource, R: QuizRepository> QuizService<S, R> {
    pub fn new(source: Arc<S>, repo: Arc<R>) -> Self {
        Self {
            validator: ReferenceValidator::new(source.clone()),
            resolver: ReferenceResolver::new(source.clone()),
            repo,
            source,
            options_page_size: DEFAULT_OPTIONS_PAGE_SIZE,
        }
    }

    pub fn from_config(source: Arc<S>, repo: Arc<R>, cfg: &configs::ReferenceServiceConfig) -> Self {
        let mut svc = Self::new(source, repo);
        svc.validator = svc.validator.with_tag_concurrency(cfg.tag_check_concurrency);
        svc.options_page_size = cfg.options_page_size;
        svc
    }

    pub fn resolver(&self) -> &ReferenceResolver<S> {
        &self.resolver
    }

    /// Create a quiz after its references pass validation.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use serde_json::json;
    /// use service::quiz::{QuizInput, QuizService, repository::mock::MockQuizRepository};
    /// use service::references::mock::StaticReferenceSource;
    /// let source = Arc::new(StaticReferenceSource::new().with_category(7, "Science").with_tag(1, "easy"));
    /// let svc = QuizService::new(source, Arc::new(MockQuizRepository::default()));
    /// let input = QuizInput::titled("Planets").with_category(json!(7)).with_tags(vec![json!(1)]);
    /// let view = tokio_test::block_on(svc.create(input)).unwrap();
    /// assert_eq!(view.category_name.as_deref(), Some("Science"));
    /// assert_eq!(view.tag_names, vec!["easy".to_string()]);
    /// ```
    #[instrument(skip(self, input), fields(title = input.title.as_deref().unwrap_or_default()))]
    pub async fn create(&self, input: QuizInput) -> Result<QuizView, ServiceError> {
        info!(phase = %WritePhase::Pending, "quiz_write");
        let title = validate_title(
            input
                .title
                .as_deref()
                .ok_or_else(|| ServiceError::Validation("title is required".into()))?,
        )?;
        let description = input.description.as_ref().and_then(|d| normalize_description(d.as_deref()));
        let questions = build_questions(input.questions.as_deref().unwrap_or_default())?;

        info!(phase = %WritePhase::Validating, "quiz_write");
        let category_ref_id = self.checked(self.validator.validate_category(input.category_id.as_ref()).await)?;
        let tag_ref_ids = match input.tag_candidates() {
            Some(candidates) => self.checked(self.validator.validate_tags(candidates).await)?,
            None => Vec::new(),
        };

        let quiz = self
            .repo
            .insert(QuizDraft { title, description, category_ref_id, tag_ref_ids, questions })
            .await?;
        info!(phase = %WritePhase::Committed, quiz_id = quiz.id, "quiz_write");
        Ok(self.view(&quiz).await)
    }

    /// Apply a partial update. Only the fields present in `input` are validated and replaced.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: i64, input: QuizInput) -> Result<QuizView, ServiceError> {
        info!(phase = %WritePhase::Pending, "quiz_write");
        let mut quiz = self.load(id).await?;

        if let Some(title) = input.title.as_deref() {
            quiz.title = validate_title(title)?;
        }
        if let Some(description) = &input.description {
            quiz.description = normalize_description(description.as_deref());
        }
        if let Some(questions) = &input.questions {
            quiz.questions = build_questions(questions)?;
        }

        info!(phase = %WritePhase::Validating, "quiz_write");
        if let Some(candidate) = &input.category_id {
            quiz.category_ref_id = self.checked(self.validator.validate_category(Some(candidate)).await)?;
        }
        if let Some(candidates) = input.tag_candidates() {
            quiz.tag_ref_ids = self.checked(self.validator.validate_tags(candidates).await)?;
        }

        quiz.updated_at = Utc::now();
        let quiz = self.repo.replace(quiz).await?;
        info!(phase = %WritePhase::Committed, quiz_id = quiz.id, "quiz_write");
        Ok(self.view(&quiz).await)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        if !self.repo.delete(id).await? {
            return Err(ServiceError::not_found("quiz", id));
        }
        info!(quiz_id = id, "quiz_deleted");
        Ok(())
    }

    /// Read one quiz with its reference names. Never fails because of the remote service.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<QuizView, ServiceError> {
        let quiz = self.load(id).await?;
        Ok(self.view(&quiz).await)
    }

    #[instrument(skip(self))]
    pub async fn detail(&self, id: i64) -> Result<QuizDetailView, ServiceError> {
        let quiz = self.load(id).await?;
        let view = self.view(&quiz).await;
        Ok(QuizDetailView { quiz: view, questions: quiz.questions })
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<QuizView>, ServiceError> {
        let quizzes = self.repo.list().await?;
        Ok(future::join_all(quizzes.iter().map(|quiz| self.view(quiz))).await)
    }

    #[instrument(skip(self, answers), fields(answers = answers.len()))]
    pub async fn grade(&self, id: i64, answers: &[Answer]) -> Result<GradeReport, ServiceError> {
        let quiz = self.load(id).await?;
        let report = grade(&quiz, answers);
        info!(quiz_id = id, score = %report.score, "quiz_graded");
        Ok(report)
    }

    /// Category and tag choice lists for editors. Partial failures are reported per list.
    #[instrument(skip(self))]
    pub async fn available_options(&self) -> AvailableOptions {
        load_options(&self.source, self.options_page_size).await
    }

    /// Quizzes whose stored references no longer resolve. Read-only.
    #[instrument(skip(self))]
    pub async fn audit_references(&self) -> Result<Vec<StaleReferences>, ServiceError> {
        let quizzes = self.repo.list().await?;
        let total = quizzes.len();
        let source = &*self.source;
        let stale: Vec<StaleReferences> = stream::iter(quizzes.iter())
            .map(|quiz| audit_quiz(source, quiz))
            .buffered(AUDIT_CONCURRENCY)
            .filter(|report| future::ready(!report.is_clean()))
            .collect()
            .await;
        info!(checked = total, stale = stale.len(), "reference_audit");
        Ok(stale)
    }

    async fn load(&self, id: i64) -> Result<Quiz, ServiceError> {
        self.repo.get(id).await?.ok_or_else(|| ServiceError::not_found("quiz", id))
    }

    async fn view(&self, quiz: &Quiz) -> QuizView {
        let (category_name, tag_names) = self.resolver.resolve(quiz.category_ref_id, &quiz.tag_ref_ids).await;
        QuizView::new(quiz, category_name, tag_names)
    }

    /// Log a rejection and lift it into `ServiceError`.
    fn checked<T>(&self, result: Result<T, ValidationError>) -> Result<T, ServiceError> {
        result.map_err(|rejection| {
            warn!(phase = %WritePhase::Rejected, kind = %rejection.kind(), reason = %rejection, "quiz_write");
            ServiceError::from(rejection)
        })
    }
}

/// Check texts and assign ids: questions from 1, choices from 1 across the quiz.
fn build_questions(inputs: &[QuestionInput]) -> Result<Vec<Question>, ServiceError> {
    let mut next_choice_id = 1;
    inputs
        .iter()
        .zip(1..)
        .map(|(input, question_id)| -> Result<Question, ServiceError> {
            let text = validate_question_text(&input.text)?;
            let choices = input
                .choices
                .iter()
                .map(|choice| {
                    let id = next_choice_id;
                    next_choice_id += 1;
                    Ok(Choice { id, text: validate_choice_text(&choice.text)?, is_correct: choice.is_correct })
                })
                .collect::<Result<Vec<_>, ServiceError>>()?;
            Ok(Question { id: question_id, text, choices })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::input::ChoiceInput;
    use crate::quiz::repository::mock::MockQuizRepository;
    use crate::references::mock::StaticReferenceSource;
    use crate::references::{placeholder, ListingStatus};
    use models::ReferenceKind;
    use serde_json::json;

    type Fixture = (
        Arc<StaticReferenceSource>,
        Arc<MockQuizRepository>,
        QuizService<StaticReferenceSource, MockQuizRepository>,
    );

    fn fixture() -> Fixture {
        let source = Arc::new(
            StaticReferenceSource::new()
                .with_category(7, "Science")
                .with_category(8, "History")
                .with_tag(1, "easy")
                .with_tag(2, "hard")
                .with_tag(3, "space"),
        );
        let repo = Arc::new(MockQuizRepository::default());
        let svc = QuizService::new(source.clone(), repo.clone());
        (source, repo, svc)
    }

    fn planets() -> QuizInput {
        QuizInput::titled("Planets")
            .with_category(json!(7))
            .with_tags(vec![json!(3), json!("1"), json!(3)])
            .with_question(QuestionInput::new(
                "Largest planet?",
                vec![ChoiceInput::new("Mars", false), ChoiceInput::new("Jupiter", true)],
            ))
    }

    #[tokio::test]
    async fn create_commits_valid_references() {
        let (_, repo, svc) = fixture();
        let view = svc.create(planets()).await.unwrap();
        assert_eq!(view.id, 1);
        assert_eq!(view.category_id, Some(7));
        assert_eq!(view.category_name.as_deref(), Some("Science"));
        assert_eq!(view.tag_ids, vec![3, 1, 3]);
        assert_eq!(view.tag_names, vec!["space", "easy", "space"]);
        assert_eq!(view.question_count, 1);
        assert_eq!(repo.write_count(), 1);
    }

    #[tokio::test]
    async fn rejected_reference_writes_nothing() {
        let (_, repo, svc) = fixture();
        let err = svc
            .create(QuizInput::titled("Bad").with_category(json!(7)).with_tags(vec![json!(1), json!(9)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Rejected(ValidationError::NotFound { kind: ReferenceKind::Tag, id: 9 })
        ));

        let err = svc.create(QuizInput::titled("Bad").with_category(json!("abc"))).await.unwrap_err();
        assert!(matches!(err, ServiceError::Rejected(ValidationError::NotNumeric { .. })));
        assert_eq!(repo.write_count(), 0);
    }

    #[tokio::test]
    async fn local_checks_run_before_remote_ones() {
        let (source, repo, svc) = fixture();
        let missing_title = svc.create(QuizInput::default().with_category(json!(7))).await;
        assert!(matches!(missing_title, Err(ServiceError::Validation(_))));
        let blank_choice = QuizInput::titled("T")
            .with_category(json!(7))
            .with_question(QuestionInput::new("Q", vec![ChoiceInput::new(" ", true)]));
        assert!(matches!(svc.create(blank_choice).await, Err(ServiceError::Validation(_))));
        assert_eq!(source.lookup_calls(), 0);
        assert_eq!(repo.write_count(), 0);
    }

    #[tokio::test]
    async fn unreachable_remote_blocks_writes_but_not_reads() {
        let (source, repo, svc) = fixture();
        let created = svc.create(planets()).await.unwrap();

        source.set_unreachable(true);
        let err = svc.create(QuizInput::titled("Offline").with_tags(vec![json!(5)])).await.unwrap_err();
        assert!(matches!(err, ServiceError::Rejected(ValidationError::NotFound { id: 5, .. })));
        assert_eq!(repo.write_count(), 1);

        let view = svc.get(created.id).await.unwrap();
        assert_eq!(view.category_name, Some(placeholder(7)));
        assert_eq!(view.tag_names, vec![placeholder(3), placeholder(1), placeholder(3)]);
    }

    #[tokio::test]
    async fn update_only_touches_sent_fields() {
        let (_, _, svc) = fixture();
        let created = svc.create(planets()).await.unwrap();

        let patch: QuizInput = serde_json::from_value(json!({"category_id": 8})).unwrap();
        let view = svc.update(created.id, patch).await.unwrap();
        assert_eq!(view.category_name.as_deref(), Some("History"));
        assert_eq!(view.tag_ids, vec![3, 1, 3]);
        assert_eq!(view.title, "Planets");
        assert_eq!(view.question_count, 1);

        let clear: QuizInput = serde_json::from_value(json!({"category_id": null, "tag_ids": []})).unwrap();
        let view = svc.update(created.id, clear).await.unwrap();
        assert_eq!(view.category_id, None);
        assert_eq!(view.category_name, None);
        assert!(view.tag_ids.is_empty());
        assert!(view.updated_at >= view.created_at);
    }

    #[tokio::test]
    async fn rejected_update_keeps_stored_record() {
        let (_, _, svc) = fixture();
        let created = svc.create(planets()).await.unwrap();
        let patch: QuizInput = serde_json::from_value(json!({"title": "Renamed", "tag_ids": [2, 42]})).unwrap();
        assert!(svc.update(created.id, patch).await.is_err());

        let view = svc.get(created.id).await.unwrap();
        assert_eq!(view.title, "Planets");
        assert_eq!(view.tag_ids, vec![3, 1, 3]);
    }

    #[tokio::test]
    async fn missing_quiz_is_not_found() {
        let (_, _, svc) = fixture();
        assert!(matches!(svc.get(5).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(svc.delete(5).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(svc.update(5, QuizInput::titled("x")).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn detail_list_delete() {
        let (_, _, svc) = fixture();
        let first = svc.create(planets()).await.unwrap();
        svc.create(QuizInput::titled("Empty")).await.unwrap();

        let detail = svc.detail(first.id).await.unwrap();
        assert_eq!(detail.questions[0].choices[1].text, "Jupiter");
        assert_eq!(detail.quiz.tag_names.len(), 3);

        assert_eq!(svc.list().await.unwrap().len(), 2);
        svc.delete(first.id).await.unwrap();
        let remaining = svc.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].title, "Empty");
        assert_eq!(remaining[0].category_name, None);
    }

    #[tokio::test]
    async fn grading_through_the_service() {
        let (_, _, svc) = fixture();
        let quiz = svc.detail(svc.create(planets()).await.unwrap().id).await.unwrap();
        let question = &quiz.questions[0];
        let wrong = question.choices[0].id;
        let report = svc.grade(quiz.quiz.id, &[Answer { question_id: question.id, choice_id: wrong }]).await.unwrap();
        assert_eq!(report.score, "0/1");
        assert_eq!(report.percentage, 0);
    }

    #[tokio::test]
    async fn options_and_audit() {
        let (source, _, svc) = fixture();
        let options = svc.available_options().await;
        assert_eq!(options.categories.entries.len(), 2);
        assert_eq!(options.tags.status, ListingStatus::Complete);

        let created = svc.create(planets()).await.unwrap();
        assert!(svc.audit_references().await.unwrap().is_empty());

        source.remove_tag(3);
        source.remove_category(7);
        let stale = svc.audit_references().await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].quiz_id, created.id);
        assert_eq!(stale[0].missing_category, Some(7));
        assert_eq!(stale[0].missing_tags, vec![3]);
    }

    #[test]
    fn question_ids_are_assigned_in_order() {
        let questions = build_questions(&[
            QuestionInput::new("A", vec![ChoiceInput::new("a1", true), ChoiceInput::new("a2", false)]),
            QuestionInput::new("B", vec![ChoiceInput::new("b1", true)]),
        ])
        .unwrap();
        assert_eq!(questions.iter().map(|q| q.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(questions[1].choices[0].id, 3);
        assert!(build_questions(&[QuestionInput::new("  ", vec![])]).is_err());
    }
}
