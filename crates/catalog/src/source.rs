use async_trait::async_trait;
use models::ReferenceKind;

use crate::lookup::{ReferenceLookupResult, ReferencePage};

/// Read access to the category/tags service.
///
/// This is the only way the rest of the system reaches that service.
/// Implementations never return raw transport errors; every outcome is a
/// [`ReferenceLookupResult`].
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    /// Fetch one category or tag by id.
    async fn lookup(&self, kind: ReferenceKind, id: i64) -> ReferenceLookupResult;

    /// Fetch several entries of one kind in a single call. Ids the remote does
    /// not know are absent from the page. When `has_more` is set the remote
    /// capped the answer, so an absent id proves nothing.
    async fn lookup_many(&self, kind: ReferenceKind, ids: &[i64]) -> ReferenceLookupResult<ReferencePage>;

    /// First page of a collection, `page_size` entries when given.
    async fn list(&self, kind: ReferenceKind, page_size: Option<u32>) -> ReferenceLookupResult<ReferencePage>;

    async fn lookup_category(&self, id: i64) -> ReferenceLookupResult {
        self.lookup(ReferenceKind::Category, id).await
    }

    async fn lookup_tag(&self, id: i64) -> ReferenceLookupResult {
        self.lookup(ReferenceKind::Tag, id).await
    }

    async fn lookup_tags(&self, ids: &[i64]) -> ReferenceLookupResult<ReferencePage> {
        self.lookup_many(ReferenceKind::Tag, ids).await
    }

    async fn exists_category(&self, id: i64) -> bool {
        self.lookup_category(id).await.is_found()
    }

    async fn exists_tag(&self, id: i64) -> bool {
        self.lookup_tag(id).await.is_found()
    }

    async fn list_categories(&self, page_size: Option<u32>) -> ReferenceLookupResult<ReferencePage> {
        self.list(ReferenceKind::Category, page_size).await
    }

    async fn list_tags(&self, page_size: Option<u32>) -> ReferenceLookupResult<ReferencePage> {
        self.list(ReferenceKind::Tag, page_size).await
    }
}
