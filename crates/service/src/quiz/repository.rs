use async_trait::async_trait;
use chrono::Utc;
use models::{Question, Quiz};

use crate::errors::ServiceError;

/// A quiz that has passed validation but has no id yet.
#[derive(Clone, Debug, PartialEq)]
pub struct QuizDraft {
    pub title: String,
    pub description: Option<String>,
    pub category_ref_id: Option<i64>,
    pub tag_ref_ids: Vec<i64>,
    pub questions: Vec<Question>,
}

impl QuizDraft {
    /// Stamp the draft with an id and creation time.
    pub fn into_quiz(self, id: i64) -> Quiz {
        let now = Utc::now();
        Quiz {
            id,
            title: self.title,
            description: self.description,
            category_ref_id: self.category_ref_id,
            tag_ref_ids: self.tag_ref_ids,
            questions: self.questions,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Repository abstraction for quiz persistence.
#[async_trait]
pub trait QuizRepository: Send + Sync {
    /// Store a new quiz under a fresh id. Ids of deleted quizzes are never reused.
    async fn insert(&self, draft: QuizDraft) -> Result<Quiz, ServiceError>;
    async fn get(&self, id: i64) -> Result<Option<Quiz>, ServiceError>;
    /// All quizzes ordered by id.
    async fn list(&self) -> Result<Vec<Quiz>, ServiceError>;
    /// Replace an existing quiz. Fails with `NotFound` if the id is unknown.
    async fn replace(&self, quiz: Quiz) -> Result<Quiz, ServiceError>;
    /// Returns whether the quiz existed.
    async fn delete(&self, id: i64) -> Result<bool, ServiceError>;
}

/// Simple in-memory mock repository for tests and doc examples
pub mod mock {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockQuizRepository {
        quizzes: Mutex<BTreeMap<i64, Quiz>>,
        last_id: AtomicI64,
        writes: AtomicUsize,
    }

    impl MockQuizRepository {
        /// Number of successful inserts, replaces and deletes.
        pub fn write_count(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QuizRepository for MockQuizRepository {
        async fn insert(&self, draft: QuizDraft) -> Result<Quiz, ServiceError> {
            let mut quizzes = self.quizzes.lock().unwrap();
            let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
            let quiz = draft.into_quiz(id);
            quizzes.insert(id, quiz.clone());
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(quiz)
        }

        async fn get(&self, id: i64) -> Result<Option<Quiz>, ServiceError> {
            Ok(self.quizzes.lock().unwrap().get(&id).cloned())
        }

        async fn list(&self) -> Result<Vec<Quiz>, ServiceError> {
            Ok(self.quizzes.lock().unwrap().values().cloned().collect())
        }

        async fn replace(&self, quiz: Quiz) -> Result<Quiz, ServiceError> {
            let mut quizzes = self.quizzes.lock().unwrap();
            let slot = quizzes.get_mut(&quiz.id).ok_or_else(|| ServiceError::not_found("quiz", quiz.id))?;
            *slot = quiz.clone();
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(quiz)
        }

        async fn delete(&self, id: i64) -> Result<bool, ServiceError> {
            let existed = self.quizzes.lock().unwrap().remove(&id).is_some();
            if existed {
                self.writes.fetch_add(1, Ordering::SeqCst);
            }
            Ok(existed)
        }
    }
}
