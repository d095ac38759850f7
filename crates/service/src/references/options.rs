//! Category and tag choice lists for editors.

use std::sync::Arc;

use catalog::{ReferenceLookupResult, ReferenceSource};
use models::{ExternalReference, ReferenceKind};
use serde::Serialize;
use tracing::{info, warn};

pub const DEFAULT_OPTIONS_PAGE_SIZE: u32 = 1000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ListingStatus {
    Complete,
    /// The remote has more entries than one page holds.
    Truncated,
    Unavailable(String),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OptionList {
    pub entries: Vec<ExternalReference>,
    pub status: ListingStatus,
}

impl OptionList {
    fn from_lookup(kind: ReferenceKind, result: ReferenceLookupResult<catalog::ReferencePage>) -> Self {
        match result {
            ReferenceLookupResult::Found(page) => {
                let status = if page.has_more {
                    info!(%kind, returned = page.items.len(), "option list truncated");
                    ListingStatus::Truncated
                } else {
                    ListingStatus::Complete
                };
                Self { entries: page.items, status }
            }
            other => {
                let detail = other.failure_detail().unwrap_or_default();
                warn!(%kind, %detail, "option list unavailable");
                Self { entries: Vec::new(), status: ListingStatus::Unavailable(detail) }
            }
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.status, ListingStatus::Unavailable(_))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AvailableOptions {
    pub categories: OptionList,
    pub tags: OptionList,
}

/// Fetch both lists concurrently. A failing list comes back empty and `Unavailable`.
pub async fn load_options<S: ReferenceSource>(source: &Arc<S>, page_size: u32) -> AvailableOptions {
    let (categories, tags) = tokio::join!(
        source.list_categories(Some(page_size)),
        source.list_tags(Some(page_size))
    );
    AvailableOptions {
        categories: OptionList::from_lookup(ReferenceKind::Category, categories),
        tags: OptionList::from_lookup(ReferenceKind::Tag, tags),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::references::mock::StaticReferenceSource;
    use serde_json::json;

    #[tokio::test]
    async fn both_lists_complete() {
        let source = Arc::new(StaticReferenceSource::new().with_category(1, "Science").with_tag(2, "easy"));
        let options = load_options(&source, DEFAULT_OPTIONS_PAGE_SIZE).await;
        assert_eq!(options.categories.status, ListingStatus::Complete);
        assert_eq!(options.categories.entries[0].name, "Science");
        assert_eq!(options.tags.entries.len(), 1);
        assert_eq!(source.list_calls(), 2);
    }

    #[tokio::test]
    async fn truncation_and_outage_are_reported() {
        let source = Arc::new(StaticReferenceSource::new().with_tag(2, "easy"));
        source.set_truncated(true);
        let options = load_options(&source, 1).await;
        assert_eq!(options.tags.status, ListingStatus::Truncated);

        source.set_unreachable(true);
        let options = load_options(&source, 1).await;
        assert!(!options.tags.is_available());
        assert!(options.categories.entries.is_empty());
    }

    #[test]
    fn status_serializes_flat() {
        assert_eq!(serde_json::to_value(ListingStatus::Complete).unwrap(), json!({"status": "complete"}));
        assert_eq!(
            serde_json::to_value(ListingStatus::Unavailable("request timed out".into())).unwrap(),
            json!({"status": "unavailable", "detail": "request timed out"})
        );
    }
}
