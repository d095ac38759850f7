use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use catalog::{ReferenceLookupResult, ReferenceSource};
use tracing::{debug, instrument, warn};

/// Display name used when a stored id cannot be resolved.
pub fn placeholder(id: i64) -> String {
    format!("ID: {id} (name not found)")
}

/// Turns stored ids into display names for reads. Never fails.
pub struct ReferenceResolver<S: ReferenceSource> {
    source: Arc<S>,
}

impl<S: ReferenceSource> Clone for ReferenceResolver<S> {
    fn clone(&self) -> Self {
        Self { source: self.source.clone() }
    }
}

impl<S: ReferenceSource> ReferenceResolver<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use service::references::{mock::StaticReferenceSource, ReferenceResolver};
    /// let resolver = ReferenceResolver::new(Arc::new(StaticReferenceSource::new().with_category(7, "Science")));
    /// assert_eq!(tokio_test::block_on(resolver.resolve_category_name(Some(7))).as_deref(), Some("Science"));
    /// assert_eq!(tokio_test::block_on(resolver.resolve_category_name(Some(999))).as_deref(), Some("ID: 999 (name not found)"));
    /// assert_eq!(tokio_test::block_on(resolver.resolve_category_name(None)), None);
    /// ```
    #[instrument(level = "debug", skip(self))]
    pub async fn resolve_category_name(&self, id: Option<i64>) -> Option<String> {
        let id = id?;
        let name = match self.source.lookup_category(id).await {
            ReferenceLookupResult::Found(reference) => reference.name,
            other => {
                debug!(id, outcome = other.failure_detail().as_deref().unwrap_or_default(), "category unresolved");
                placeholder(id)
            }
        };
        Some(name)
    }

    /// One name per input id, same order; duplicates resolve to the same name.
    ///
    /// Distinct ids are fetched in a single batched call. Ids the remote does not
    /// return, or every id when the call fails, get [`placeholder`].
    #[instrument(level = "debug", skip(self, ids), fields(count = ids.len()))]
    pub async fn resolve_tag_names(&self, ids: &[i64]) -> Vec<String> {
        if ids.is_empty() {
            return Vec::new();
        }
        let mut seen = HashSet::with_capacity(ids.len());
        let distinct: Vec<i64> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let names: HashMap<i64, String> = match self.source.lookup_tags(&distinct).await {
            ReferenceLookupResult::Found(page) => {
                if page.has_more {
                    debug!(count = distinct.len(), returned = page.items.len(), "tag batch capped; rest shown as placeholders");
                }
                page.items.into_iter().map(|r| (r.id, r.name)).collect()
            }
            other => {
                warn!(
                    count = distinct.len(),
                    outcome = other.failure_detail().as_deref().unwrap_or_default(),
                    "tag names unavailable"
                );
                HashMap::new()
            }
        };

        ids.iter()
            .map(|id| names.get(id).cloned().unwrap_or_else(|| placeholder(*id)))
            .collect()
    }

    /// Category and tag names for one record, fetched concurrently.
    pub async fn resolve(&self, category: Option<i64>, tags: &[i64]) -> (Option<String>, Vec<String>) {
        tokio::join!(self.resolve_category_name(category), self.resolve_tag_names(tags))
    }
}
