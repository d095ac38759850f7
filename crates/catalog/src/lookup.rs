//! Uniform outcome of every call to the category/tags service.

use std::fmt;

use models::ExternalReference;
use serde::Serialize;
use thiserror::Error;

/// Result of one remote call. Callers must handle every arm.
#[derive(Clone, Debug, PartialEq)]
pub enum ReferenceLookupResult<T = ExternalReference> {
    Found(T),
    NotFound,
    TransportError(TransportFailure),
    InvalidResponse(String),
}

impl<T> ReferenceLookupResult<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, ReferenceLookupResult::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            ReferenceLookupResult::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U, F>(self, f: F) -> ReferenceLookupResult<U>
    where
        F: FnOnce(T) -> U,
    {
        self.and_then(|value| ReferenceLookupResult::Found(f(value)))
    }

    /// Chain a further decoding step onto a `Found` value.
    pub fn and_then<U, F>(self, f: F) -> ReferenceLookupResult<U>
    where
        F: FnOnce(T) -> ReferenceLookupResult<U>,
    {
        match self {
            ReferenceLookupResult::Found(value) => f(value),
            ReferenceLookupResult::NotFound => ReferenceLookupResult::NotFound,
            ReferenceLookupResult::TransportError(e) => ReferenceLookupResult::TransportError(e),
            ReferenceLookupResult::InvalidResponse(d) => ReferenceLookupResult::InvalidResponse(d),
        }
    }

    /// Short description of a non-`Found` outcome, for logs and reports.
    pub fn failure_detail(&self) -> Option<String> {
        match self {
            ReferenceLookupResult::Found(_) => None,
            ReferenceLookupResult::NotFound => Some("not found".to_string()),
            ReferenceLookupResult::TransportError(e) => Some(e.to_string()),
            ReferenceLookupResult::InvalidResponse(d) => Some(format!("invalid response: {d}")),
        }
    }

    /// True when the remote answered decisively (found or not found).
    pub fn is_conclusive(&self) -> bool {
        matches!(self, ReferenceLookupResult::Found(_) | ReferenceLookupResult::NotFound)
    }
}

/// Why a call never produced a usable answer.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum TransportFailure {
    /// DNS, refused connection, reset, or any failure before a status line.
    #[error("connection error: {0}")]
    Connection(String),
    #[error("request timed out")]
    Timeout,
    /// The remote answered with a 4xx/5xx other than a lookup 404.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: ErrorBody },
    #[error("circuit open; category/tags service calls suspended")]
    CircuitOpen,
}

impl TransportFailure {
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportFailure::Timeout
        } else {
            TransportFailure::Connection(e.to_string())
        }
    }

    /// Connection-level failures, as opposed to an HTTP error status.
    pub fn is_connection_level(&self) -> bool {
        matches!(
            self,
            TransportFailure::Connection(_) | TransportFailure::Timeout | TransportFailure::CircuitOpen
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportFailure::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Body of an HTTP error response.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorBody {
    Structured(serde_json::Value),
    Text(String),
}

impl ErrorBody {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) => ErrorBody::Structured(value),
            Err(_) => ErrorBody::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorBody::Structured(value) => write!(f, "{value}"),
            ErrorBody::Text(text) => f.write_str(text),
        }
    }
}

/// First page of a listing.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ReferencePage {
    pub items: Vec<ExternalReference>,
    /// The remote advertised a further page that was not fetched.
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::ReferenceKind;

    #[test]
    fn error_body_prefers_json() {
        assert_eq!(
            ErrorBody::parse(r#"{"detail":"Not found."}"#),
            ErrorBody::Structured(serde_json::json!({"detail": "Not found."}))
        );
        assert_eq!(ErrorBody::parse("<h1>Bad Gateway</h1>"), ErrorBody::Text("<h1>Bad Gateway</h1>".into()));
    }

    #[test]
    fn http_and_connection_failures_are_distinct() {
        let http = TransportFailure::Http { status: 500, body: ErrorBody::Text("boom".into()) };
        assert!(!http.is_connection_level());
        assert_eq!(http.status(), Some(500));
        assert_eq!(http.to_string(), "HTTP 500: boom");
        assert!(TransportFailure::Connection("refused".into()).is_connection_level());
        assert!(TransportFailure::Timeout.is_connection_level());
    }

    #[test]
    fn map_and_details() {
        let found: ReferenceLookupResult = ReferenceLookupResult::Found(ExternalReference::new(
            ReferenceKind::Category,
            7,
            "Science",
        ));
        assert!(found.is_conclusive());
        assert_eq!(found.clone().map(|r| r.name).found(), Some("Science".to_string()));
        assert_eq!(found.failure_detail(), None);

        let missing: ReferenceLookupResult<()> = ReferenceLookupResult::NotFound;
        assert!(missing.is_conclusive());
        assert_eq!(missing.failure_detail().as_deref(), Some("not found"));

        let down: ReferenceLookupResult<()> = ReferenceLookupResult::TransportError(TransportFailure::Timeout);
        assert!(!down.is_conclusive());
        assert!(!down.is_found());
    }
}
