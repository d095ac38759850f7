use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use models::Quiz;
use tracing::info;

use super::json_map_store::JsonMapStore;
use crate::errors::ServiceError;
use crate::quiz::repository::{QuizDraft, QuizRepository};

/// Quizzes kept in one JSON file, keyed by id.
pub struct JsonQuizRepository {
    store: Arc<JsonMapStore<i64, Quiz>>,
}

impl JsonQuizRepository {
    pub async fn open<P: Into<PathBuf>>(path: P) -> Result<Self, ServiceError> {
        let path = path.into();
        let store = JsonMapStore::open(&path).await?;
        info!(path = %path.display(), "quiz store ready");
        Ok(Self { store })
    }
}

#[async_trait]
impl QuizRepository for JsonQuizRepository {
    async fn insert(&self, draft: QuizDraft) -> Result<Quiz, ServiceError> {
        self.store.insert_next(|id| draft.into_quiz(id)).await
    }

    async fn get(&self, id: i64) -> Result<Option<Quiz>, ServiceError> {
        Ok(self.store.get(&id).await)
    }

    async fn list(&self) -> Result<Vec<Quiz>, ServiceError> {
        let mut quizzes: Vec<Quiz> = self.store.list().await.into_iter().map(|(_, quiz)| quiz).collect();
        quizzes.sort_by_key(|quiz| quiz.id);
        Ok(quizzes)
    }

    async fn replace(&self, quiz: Quiz) -> Result<Quiz, ServiceError> {
        self.store
            .update_map(|quizzes| {
                let slot = quizzes.get_mut(&quiz.id).ok_or_else(|| ServiceError::not_found("quiz", quiz.id))?;
                *slot = quiz.clone();
                Ok(quiz)
            })
            .await
    }

    async fn delete(&self, id: i64) -> Result<bool, ServiceError> {
        self.store.remove(&id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str, tags: Vec<i64>) -> QuizDraft {
        QuizDraft {
            title: title.into(),
            description: None,
            category_ref_id: Some(7),
            tag_ref_ids: tags,
            questions: vec![],
        }
    }

    #[tokio::test]
    async fn ids_increase_and_survive_reopen() -> Result<(), anyhow::Error> {
        let tmp = std::env::temp_dir().join(format!("quizzes_{}.json", uuid::Uuid::new_v4()));
        let repo = JsonQuizRepository::open(&tmp).await?;
        let first = repo.insert(draft("A", vec![2, 1, 2])).await?;
        let second = repo.insert(draft("B", vec![])).await?;
        assert_eq!((first.id, second.id), (1, 2));

        assert!(repo.delete(first.id).await?);
        let third = repo.insert(draft("C", vec![3])).await?;
        assert_eq!(third.id, 3);

        // the newest quiz goes away; its id stays taken
        assert!(repo.delete(third.id).await?);
        let fourth = repo.insert(draft("D", vec![3])).await?;
        assert_eq!(fourth.id, 4);

        let reopened = JsonQuizRepository::open(&tmp).await?;
        let titles: Vec<String> = reopened.list().await?.into_iter().map(|q| q.title).collect();
        assert_eq!(titles, vec!["B", "D"]);
        assert_eq!(reopened.get(4).await?.map(|q| q.tag_ref_ids), Some(vec![3]));

        assert!(reopened.delete(4).await?);
        assert_eq!(reopened.insert(draft("E", vec![])).await?.id, 5);

        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn replace_requires_existing_quiz() -> Result<(), anyhow::Error> {
        let tmp = std::env::temp_dir().join(format!("quizzes_{}.json", uuid::Uuid::new_v4()));
        let repo = JsonQuizRepository::open(&tmp).await?;
        let mut quiz = repo.insert(draft("A", vec![1])).await?;
        quiz.title = "A2".into();
        repo.replace(quiz.clone()).await?;
        assert_eq!(repo.get(quiz.id).await?.map(|q| q.title).as_deref(), Some("A2"));

        quiz.id = 99;
        assert!(matches!(repo.replace(quiz).await, Err(ServiceError::NotFound(_))));

        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn legacy_rows_with_delimited_tags_load() -> Result<(), anyhow::Error> {
        let tmp = std::env::temp_dir().join(format!("quizzes_{}.json", uuid::Uuid::new_v4()));
        let legacy = serde_json::json!({
            "4": {
                "id": 4,
                "title": "Legacy",
                "category_id_external": 7,
                "tag_ids_external": "1,2,3",
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-01T00:00:00Z"
            }
        });
        tokio::fs::write(&tmp, serde_json::to_vec(&legacy)?).await?;

        let repo = JsonQuizRepository::open(&tmp).await?;
        let quiz = repo.get(4).await?.expect("legacy quiz");
        assert_eq!(quiz.tag_ref_ids, vec![1, 2, 3]);
        assert_eq!(quiz.category_ref_id, Some(7));
        assert_eq!(repo.insert(draft("New", vec![])).await?.id, 5);

        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }
}
