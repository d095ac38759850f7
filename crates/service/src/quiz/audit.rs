use std::collections::HashSet;

use catalog::{ReferenceLookupResult, ReferenceSource};
use futures::{stream, StreamExt};
use models::Quiz;
use serde::Serialize;
use tracing::debug;

const TAG_CONFIRM_CONCURRENCY: usize = 4;

/// A quiz whose stored references no longer all resolve.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StaleReferences {
    pub quiz_id: i64,
    pub missing_category: Option<i64>,
    pub missing_tags: Vec<i64>,
    /// Lookups that could not be answered, e.g. `"tags: request timed out"`.
    pub unreachable: Vec<String>,
}

impl StaleReferences {
    pub fn is_clean(&self) -> bool {
        self.missing_category.is_none() && self.missing_tags.is_empty() && self.unreachable.is_empty()
    }
}

/// Check one quiz's references. Only a conclusive `NotFound` counts as missing.
pub(crate) async fn audit_quiz<S: ReferenceSource>(source: &S, quiz: &Quiz) -> StaleReferences {
    let mut report = StaleReferences { quiz_id: quiz.id, ..StaleReferences::default() };

    let category = async {
        match quiz.category_ref_id {
            Some(id) => Some((id, source.lookup_category(id).await)),
            None => None,
        }
    };
    let tags = source.lookup_tags(&quiz.tag_ref_ids);
    let (category, tags) = tokio::join!(category, tags);

    match category {
        Some((id, ReferenceLookupResult::NotFound)) => report.missing_category = Some(id),
        Some((id, outcome)) if !outcome.is_found() => report
            .unreachable
            .push(format!("category {id}: {}", outcome.failure_detail().unwrap_or_default())),
        _ => {}
    }

    match tags {
        ReferenceLookupResult::Found(page) => {
            let known: HashSet<i64> = page.items.iter().map(|r| r.id).collect();
            let mut seen = HashSet::new();
            let absent: Vec<i64> = quiz
                .tag_ref_ids
                .iter()
                .copied()
                .filter(|id| !known.contains(id) && seen.insert(*id))
                .collect();
            if page.has_more {
                // a capped batch says nothing about the ids it left out
                debug!(quiz_id = quiz.id, unconfirmed = absent.len(), "tag batch capped; checking the rest one by one");
                confirm_individually(source, &absent, &mut report).await;
            } else {
                report.missing_tags = absent;
            }
        }
        other => report
            .unreachable
            .push(format!("tags: {}", other.failure_detail().unwrap_or_default())),
    }

    report
}

async fn confirm_individually<S: ReferenceSource>(source: &S, ids: &[i64], report: &mut StaleReferences) {
    let outcomes: Vec<(i64, ReferenceLookupResult)> = stream::iter(ids.iter().copied())
        .map(|id| async move { (id, source.lookup_tag(id).await) })
        .buffered(TAG_CONFIRM_CONCURRENCY)
        .collect()
        .await;
    for (id, outcome) in outcomes {
        match outcome {
            ReferenceLookupResult::Found(_) => {}
            ReferenceLookupResult::NotFound => report.missing_tags.push(id),
            other => report
                .unreachable
                .push(format!("tag {id}: {}", other.failure_detail().unwrap_or_default())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::repository::QuizDraft;
    use crate::references::mock::StaticReferenceSource;

    fn quiz(category: Option<i64>, tags: Vec<i64>) -> Quiz {
        QuizDraft {
            title: "T".into(),
            description: None,
            category_ref_id: category,
            tag_ref_ids: tags,
            questions: vec![],
        }
        .into_quiz(1)
    }

    #[tokio::test]
    async fn reports_missing_references() {
        let source = StaticReferenceSource::new().with_category(7, "Science").with_tag(1, "a");
        assert!(audit_quiz(&source, &quiz(Some(7), vec![1])).await.is_clean());

        let report = audit_quiz(&source, &quiz(Some(8), vec![1, 2, 2, 3])).await;
        assert_eq!(report.missing_category, Some(8));
        assert_eq!(report.missing_tags, vec![2, 3]);
        assert!(report.unreachable.is_empty());
    }

    #[tokio::test]
    async fn outage_is_not_reported_as_missing() {
        let source = StaticReferenceSource::new();
        source.set_unreachable(true);
        let report = audit_quiz(&source, &quiz(Some(7), vec![1])).await;
        assert_eq!(report.missing_category, None);
        assert!(report.missing_tags.is_empty());
        assert_eq!(report.unreachable.len(), 2);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn capped_batch_does_not_report_existing_tags() {
        let source = StaticReferenceSource::new().with_tag(1, "a").with_tag(2, "b").with_tag(3, "c");
        source.set_batch_cap(Some(2));

        let report = audit_quiz(&source, &quiz(None, vec![1, 2, 3])).await;
        assert!(report.is_clean(), "{report:?}");
        assert_eq!(source.batch_calls(), 1);
        assert_eq!(source.lookup_calls(), 1);

        source.remove_tag(3);
        source.set_batch_cap(Some(1));
        let report = audit_quiz(&source, &quiz(None, vec![1, 2, 3])).await;
        assert_eq!(report.missing_tags, vec![3]);
        assert!(report.unreachable.is_empty());
    }

    #[tokio::test]
    async fn quiz_without_references_needs_no_calls() {
        let source = StaticReferenceSource::new();
        assert!(audit_quiz(&source, &quiz(None, vec![])).await.is_clean());
        assert_eq!(source.lookup_calls() + source.batch_calls(), 0);
    }
}
