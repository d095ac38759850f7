//! Decoding of category/tags response bodies.

use models::{ExternalReference, ReferenceKind};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::lookup::{ReferenceLookupResult, ReferencePage};

/// The fields we rely on; anything else in the object is ignored.
#[derive(Deserialize)]
struct RawReference {
    id: i64,
    name: String,
}

/// Listings come back either bare or wrapped in a paginated envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListPayload {
    Bare(Vec<Value>),
    Paginated {
        results: Vec<Value>,
        #[serde(default)]
        next: Option<Value>,
    },
}

pub(crate) fn parse_reference(kind: ReferenceKind, body: Value) -> ReferenceLookupResult {
    match serde_json::from_value::<RawReference>(body) {
        Ok(raw) => ReferenceLookupResult::Found(ExternalReference::new(kind, raw.id, raw.name)),
        Err(e) => ReferenceLookupResult::InvalidResponse(format!("{kind} object without id/name: {e}")),
    }
}

pub(crate) fn parse_page(kind: ReferenceKind, body: Value) -> ReferenceLookupResult<ReferencePage> {
    let (items, next) = match serde_json::from_value::<ListPayload>(body) {
        Ok(ListPayload::Bare(items)) => (items, None),
        Ok(ListPayload::Paginated { results, next }) => (results, next),
        Err(_) => {
            return ReferenceLookupResult::InvalidResponse(format!(
                "{} listing is neither a list nor an object with `results`",
                kind.collection()
            ))
        }
    };

    let total = items.len();
    let items: Vec<ExternalReference> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RawReference>(item).ok())
        .map(|raw| ExternalReference::new(kind, raw.id, raw.name))
        .collect();
    if items.len() < total {
        debug!(%kind, skipped = total - items.len(), "skipped listing entries without id/name");
    }

    let has_more = matches!(next, Some(ref n) if !n.is_null());
    ReferenceLookupResult::Found(ReferencePage { items, has_more })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_object_with_extra_fields() {
        let got = parse_reference(
            ReferenceKind::Category,
            json!({"id": 7, "name": "Science", "description": "x", "quiz_count": 3}),
        );
        assert_eq!(
            got,
            ReferenceLookupResult::Found(ExternalReference::new(ReferenceKind::Category, 7, "Science"))
        );
    }

    #[test]
    fn single_object_missing_name_is_invalid() {
        let got = parse_reference(ReferenceKind::Tag, json!({"id": 7}));
        assert!(matches!(got, ReferenceLookupResult::InvalidResponse(_)));
        let got = parse_reference(ReferenceKind::Tag, json!(["not", "an", "object"]));
        assert!(matches!(got, ReferenceLookupResult::InvalidResponse(_)));
    }

    #[test]
    fn bare_list() {
        let page = parse_page(ReferenceKind::Tag, json!([{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]))
            .found()
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(!page.has_more);
    }

    #[test]
    fn paginated_envelope_reports_more_pages() {
        let page = parse_page(
            ReferenceKind::Tag,
            json!({
                "count": 40,
                "next": "http://remote/tags/?page=2",
                "previous": null,
                "results": [{"id": 1, "name": "a"}, {"id": "bad"}, {"name": "no id"}]
            }),
        )
        .found()
        .unwrap();
        assert_eq!(page.items, vec![ExternalReference::new(ReferenceKind::Tag, 1, "a")]);
        assert!(page.has_more);
    }

    #[test]
    fn last_page_has_null_next() {
        let page = parse_page(ReferenceKind::Category, json!({"next": null, "results": []}))
            .found()
            .unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_more);
    }

    #[test]
    fn unexpected_shape_is_invalid() {
        assert!(matches!(
            parse_page(ReferenceKind::Category, json!({"detail": "oops"})),
            ReferenceLookupResult::InvalidResponse(_)
        ));
        assert!(matches!(
            parse_page(ReferenceKind::Category, json!("text")),
            ReferenceLookupResult::InvalidResponse(_)
        ));
    }
}
