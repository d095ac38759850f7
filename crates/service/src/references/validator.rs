use std::collections::HashSet;
use std::sync::Arc;

use catalog::ReferenceSource;
use futures::{stream, StreamExt};
use models::ReferenceKind;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

pub const DEFAULT_TAG_CHECK_CONCURRENCY: usize = 4;

/// Why a reference was refused on write.
///
/// Serializes as `{"code":"not_found","kind":"tag","id":5}` or
/// `{"code":"not_numeric","kind":"category","value":"abc"}`.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("{kind} id {value:?} is not an integer")]
    NotNumeric { kind: ReferenceKind, value: String },
    /// Covers both "absent on the remote" and "remote could not answer".
    #[error("{kind} {id} does not exist")]
    NotFound { kind: ReferenceKind, id: i64 },
}

impl ValidationError {
    pub fn kind(&self) -> ReferenceKind {
        match self {
            ValidationError::NotNumeric { kind, .. } | ValidationError::NotFound { kind, .. } => *kind,
        }
    }
}

/// Checks candidate category/tag ids against the category/tags service.
pub struct ReferenceValidator<S: ReferenceSource> {
    source: Arc<S>,
    tag_concurrency: usize,
}

impl<S: ReferenceSource> Clone for ReferenceValidator<S> {
    fn clone(&self) -> Self {
        Self { source: self.source.clone(), tag_concurrency: self.tag_concurrency }
    }
}

impl<S: ReferenceSource> ReferenceValidator<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self { source, tag_concurrency: DEFAULT_TAG_CHECK_CONCURRENCY }
    }

    /// Upper bound on tag existence checks in flight at once. Zero is treated as one.
    pub fn with_tag_concurrency(mut self, limit: usize) -> Self {
        self.tag_concurrency = limit.max(1);
        self
    }

    /// Validate an optional category candidate.
    ///
    /// Absent, `null` and blank strings mean "no category" and make no remote call.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use service::references::{mock::StaticReferenceSource, ReferenceValidator, ValidationError};
    /// let source = Arc::new(StaticReferenceSource::new().with_category(7, "Science"));
    /// let validator = ReferenceValidator::new(source);
    /// let ok = tokio_test::block_on(validator.validate_category(Some(&serde_json::json!("7"))));
    /// assert_eq!(ok, Ok(Some(7)));
    /// let missing = tokio_test::block_on(validator.validate_category(Some(&serde_json::json!(999))));
    /// assert!(matches!(missing, Err(ValidationError::NotFound { id: 999, .. })));
    /// ```
    #[instrument(skip(self, candidate))]
    pub async fn validate_category(&self, candidate: Option<&Value>) -> Result<Option<i64>, ValidationError> {
        let Some(value) = candidate.filter(|v| !is_empty_candidate(v)) else {
            return Ok(None);
        };
        let id = parse_candidate(ReferenceKind::Category, value)?;
        let result = self.source.lookup_category(id).await;
        if result.is_found() {
            debug!(id, "category accepted");
            return Ok(Some(id));
        }
        warn!(
            id,
            outcome = result.failure_detail().as_deref().unwrap_or_default(),
            "category rejected"
        );
        Err(ValidationError::NotFound { kind: ReferenceKind::Category, id })
    }

    /// Validate a list of tag candidates, all or nothing.
    ///
    /// Every candidate is parsed before the first remote call. Distinct ids are
    /// then checked in first-occurrence order, a bounded number at a time; the
    /// first one that is not found aborts the rest. On success the input ids are
    /// returned as given, duplicates included.
    #[instrument(skip(self, candidates), fields(count = candidates.len()))]
    pub async fn validate_tags(&self, candidates: &[Value]) -> Result<Vec<i64>, ValidationError> {
        let ids = candidates
            .iter()
            .map(|value| parse_candidate(ReferenceKind::Tag, value))
            .collect::<Result<Vec<_>, _>>()?;
        if ids.is_empty() {
            return Ok(ids);
        }

        let mut seen = HashSet::with_capacity(ids.len());
        let distinct: Vec<i64> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let source = &self.source;
        let mut checks = stream::iter(distinct)
            .map(|id| async move { (id, source.lookup_tag(id).await) })
            .buffered(self.tag_concurrency);
        while let Some((id, result)) = checks.next().await {
            if !result.is_found() {
                warn!(
                    id,
                    outcome = result.failure_detail().as_deref().unwrap_or_default(),
                    "tag rejected"
                );
                return Err(ValidationError::NotFound { kind: ReferenceKind::Tag, id });
            }
        }
        debug!(count = ids.len(), "tags accepted");
        Ok(ids)
    }
}

fn is_empty_candidate(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Integral JSON numbers and strings holding an integer are accepted.
fn parse_candidate(kind: ReferenceKind, value: &Value) -> Result<i64, ValidationError> {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ValidationError::NotNumeric {
        kind,
        value: match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    })
}
