//! Validation and name resolution for category/tag references.
//!
//! Both sit on top of [`catalog::ReferenceSource`]; nothing here talks HTTP.

pub mod options;
pub mod resolver;
pub mod validator;

pub use options::{AvailableOptions, ListingStatus, OptionList};
pub use resolver::{placeholder, ReferenceResolver};
pub use validator::{ReferenceValidator, ValidationError};

/// In-memory [`catalog::ReferenceSource`] for tests and doc examples.
pub mod mock {
    use std::collections::{BTreeMap, HashSet};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use catalog::{ReferenceLookupResult, ReferencePage, ReferenceSource, TransportFailure};
    use models::{ExternalReference, ReferenceKind};

    #[derive(Default)]
    pub struct StaticReferenceSource {
        categories: Mutex<BTreeMap<i64, String>>,
        tags: Mutex<BTreeMap<i64, String>>,
        malformed: Mutex<HashSet<(ReferenceKind, i64)>>,
        unreachable: AtomicBool,
        truncated: AtomicBool,
        batch_cap: Mutex<Option<usize>>,
        lookups: AtomicUsize,
        batches: AtomicUsize,
        listings: AtomicUsize,
    }

    impl StaticReferenceSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_category(self, id: i64, name: &str) -> Self {
            self.categories.lock().unwrap().insert(id, name.to_string());
            self
        }

        pub fn with_tag(self, id: i64, name: &str) -> Self {
            self.tags.lock().unwrap().insert(id, name.to_string());
            self
        }

        /// Lookups of this entry answer with an undecodable payload.
        pub fn with_malformed(self, kind: ReferenceKind, id: i64) -> Self {
            self.malformed.lock().unwrap().insert((kind, id));
            self
        }

        pub fn remove_category(&self, id: i64) {
            self.categories.lock().unwrap().remove(&id);
        }

        pub fn remove_tag(&self, id: i64) {
            self.tags.lock().unwrap().remove(&id);
        }

        /// Every call fails with a connection error while set.
        pub fn set_unreachable(&self, unreachable: bool) {
            self.unreachable.store(unreachable, Ordering::SeqCst);
        }

        /// Listings advertise a further page while set.
        pub fn set_truncated(&self, truncated: bool) {
            self.truncated.store(truncated, Ordering::SeqCst);
        }

        /// Batch lookups return at most `cap` entries and flag the rest as
        /// another page, like a remote with a maximum page size.
        pub fn set_batch_cap(&self, cap: Option<usize>) {
            *self.batch_cap.lock().unwrap() = cap;
        }

        pub fn lookup_calls(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }

        pub fn batch_calls(&self) -> usize {
            self.batches.load(Ordering::SeqCst)
        }

        pub fn list_calls(&self) -> usize {
            self.listings.load(Ordering::SeqCst)
        }

        fn entries(&self, kind: ReferenceKind) -> BTreeMap<i64, String> {
            match kind {
                ReferenceKind::Category => self.categories.lock().unwrap().clone(),
                ReferenceKind::Tag => self.tags.lock().unwrap().clone(),
            }
        }

        fn down<T>(&self) -> Option<ReferenceLookupResult<T>> {
            self.unreachable
                .load(Ordering::SeqCst)
                .then(|| ReferenceLookupResult::TransportError(TransportFailure::Connection("connection refused".into())))
        }
    }

    #[async_trait]
    impl ReferenceSource for StaticReferenceSource {
        async fn lookup(&self, kind: ReferenceKind, id: i64) -> ReferenceLookupResult {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if let Some(down) = self.down() {
                return down;
            }
            if self.malformed.lock().unwrap().contains(&(kind, id)) {
                return ReferenceLookupResult::InvalidResponse("missing name".into());
            }
            match self.entries(kind).get(&id) {
                Some(name) => ReferenceLookupResult::Found(ExternalReference::new(kind, id, name.clone())),
                None => ReferenceLookupResult::NotFound,
            }
        }

        async fn lookup_many(&self, kind: ReferenceKind, ids: &[i64]) -> ReferenceLookupResult<ReferencePage> {
            if ids.is_empty() {
                return ReferenceLookupResult::Found(ReferencePage::default());
            }
            self.batches.fetch_add(1, Ordering::SeqCst);
            if let Some(down) = self.down() {
                return down;
            }
            let mut items: Vec<ExternalReference> = self
                .entries(kind)
                .into_iter()
                .filter(|(id, _)| ids.contains(id))
                .map(|(id, name)| ExternalReference::new(kind, id, name))
                .collect();
            let cap = self.batch_cap.lock().unwrap().unwrap_or(usize::MAX);
            let has_more = items.len() > cap;
            items.truncate(cap);
            ReferenceLookupResult::Found(ReferencePage { items, has_more })
        }

        async fn list(&self, kind: ReferenceKind, page_size: Option<u32>) -> ReferenceLookupResult<ReferencePage> {
            self.listings.fetch_add(1, Ordering::SeqCst);
            if let Some(down) = self.down() {
                return down;
            }
            let limit = page_size.map(|n| n as usize).unwrap_or(usize::MAX);
            let items = self
                .entries(kind)
                .into_iter()
                .take(limit)
                .map(|(id, name)| ExternalReference::new(kind, id, name))
                .collect();
            ReferenceLookupResult::Found(ReferencePage { items, has_more: self.truncated.load(Ordering::SeqCst) })
        }
    }
}
