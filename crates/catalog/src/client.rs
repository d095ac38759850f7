use std::time::Duration;

use async_trait::async_trait;
use models::{tag_ids, ReferenceKind};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::lookup::{ErrorBody, ReferenceLookupResult, ReferencePage, TransportFailure};
use crate::payload::{parse_page, parse_reference};
use crate::retry::{retry_with_policy, RetryPolicy};
use crate::source::ReferenceSource;

/// Hard ceiling for one call, retries included.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(configs::MAX_REFERENCE_TIMEOUT_SECS);

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid category/tags base url {0:?}")]
    InvalidBaseUrl(String),
    #[error("cannot build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

struct RawResponse {
    status: StatusCode,
    body: String,
}

/// HTTP client for the category/tags service.
///
/// Holds no per-request state; clone or share it behind an `Arc`.
#[derive(Clone, Debug)]
pub struct HttpReferenceClient {
    http: Client,
    base_url: String,
    deadline: Duration,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl HttpReferenceClient {
    /// Client with retries and circuit breaking off. `timeout` is capped at [`MAX_TIMEOUT`].
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CatalogError> {
        Self::build(base_url.into(), timeout, timeout)
    }

    pub fn from_config(cfg: &configs::ReferenceServiceConfig) -> Result<Self, CatalogError> {
        let client = Self::build(cfg.base_url.clone(), cfg.request_timeout(), cfg.connect_timeout())?
            .with_retry(RetryPolicy::from_config(cfg))
            .with_circuit_breaker(CircuitBreaker::from_config(cfg));
        info!(base_url = %client.base_url, timeout_secs = cfg.timeout_secs, "category/tags client ready");
        Ok(client)
    }

    fn build(base_url: String, timeout: Duration, connect_timeout: Duration) -> Result<Self, CatalogError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !configs::has_http_scheme(&base_url) {
            return Err(CatalogError::InvalidBaseUrl(base_url));
        }
        let timeout = timeout.min(MAX_TIMEOUT);
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout.min(timeout))
            .build()?;
        Ok(Self {
            http,
            base_url,
            deadline: timeout,
            retry: RetryPolicy::disabled(),
            breaker: CircuitBreaker::disabled(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_circuit_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Upper bound on one call including every retry and backoff.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send_once(&self, url: &str, query: &[(&str, String)]) -> Result<RawResponse, TransportFailure> {
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| TransportFailure::from_reqwest(&e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| TransportFailure::from_reqwest(&e))?;
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(RawResponse { status, body })
        } else {
            Err(TransportFailure::Http { status: status.as_u16(), body: ErrorBody::parse(&body) })
        }
    }

    /// One GET, normalized. A 404 becomes `NotFound`; the body of a 2xx must be JSON.
    ///
    /// Retries share the per-call deadline, so a call never outlives it.
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> ReferenceLookupResult<Value> {
        let url = self.url(path);
        if !self.breaker.can_execute().await {
            warn!(%url, "category/tags circuit open; skipping call");
            return ReferenceLookupResult::TransportError(TransportFailure::CircuitOpen);
        }

        let attempts = retry_with_policy(&self.retry, || self.send_once(&url, query));
        let outcome = match tokio::time::timeout(self.deadline, attempts).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportFailure::Timeout),
        };
        match outcome {
            Ok(raw) => {
                self.breaker.record_success().await;
                if raw.status == StatusCode::NOT_FOUND {
                    debug!(%url, "category/tags service answered 404");
                    return ReferenceLookupResult::NotFound;
                }
                match serde_json::from_str::<Value>(&raw.body) {
                    Ok(value) => ReferenceLookupResult::Found(value),
                    Err(e) => {
                        warn!(%url, status = raw.status.as_u16(), error = %e, "undecodable JSON from category/tags service");
                        ReferenceLookupResult::InvalidResponse(format!("undecodable JSON: {e}"))
                    }
                }
            }
            Err(failure) => {
                let server_side = failure.is_connection_level() || failure.status().is_some_and(|s| s >= 500);
                if server_side {
                    self.breaker.record_failure().await;
                } else {
                    self.breaker.record_success().await;
                }
                match &failure {
                    TransportFailure::Http { status, body } => {
                        error!(%url, status, %body, "category/tags service returned an error status")
                    }
                    other => error!(%url, error = %other, "cannot reach category/tags service"),
                }
                ReferenceLookupResult::TransportError(failure)
            }
        }
    }
}

fn distinct_in_order(ids: &[i64]) -> Vec<i64> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[async_trait]
impl ReferenceSource for HttpReferenceClient {
    #[instrument(level = "debug", skip(self))]
    async fn lookup(&self, kind: ReferenceKind, id: i64) -> ReferenceLookupResult {
        let path = format!("{}/{id}/", kind.collection());
        let result = self.get_json(&path, &[]).await.and_then(|body| parse_reference(kind, body));
        if let ReferenceLookupResult::InvalidResponse(detail) = &result {
            warn!(%kind, id, %detail, "malformed reference payload");
        }
        result
    }

    #[instrument(level = "debug", skip(self))]
    async fn lookup_many(&self, kind: ReferenceKind, ids: &[i64]) -> ReferenceLookupResult<ReferencePage> {
        if ids.is_empty() {
            return ReferenceLookupResult::Found(ReferencePage::default());
        }
        let wanted = distinct_in_order(ids);
        let query = [
            ("id__in", tag_ids::encode(&wanted)),
            ("page_size", wanted.len().to_string()),
        ];
        let path = format!("{}/", kind.collection());
        self.get_json(&path, &query)
            .await
            .and_then(|body| parse_page(kind, body))
            .map(|page| {
                if page.has_more {
                    warn!(%kind, requested = wanted.len(), returned = page.items.len(), "batch lookup capped by remote");
                }
                ReferencePage {
                    items: page.items.into_iter().filter(|r| wanted.contains(&r.id)).collect(),
                    has_more: page.has_more,
                }
            })
    }

    #[instrument(level = "debug", skip(self))]
    async fn list(&self, kind: ReferenceKind, page_size: Option<u32>) -> ReferenceLookupResult<ReferencePage> {
        let query: Vec<(&str, String)> = page_size
            .map(|n| vec![("page_size", n.to_string())])
            .unwrap_or_default();
        let path = format!("{}/", kind.collection());
        let result = self.get_json(&path, &query).await.and_then(|body| parse_page(kind, body));
        if let ReferenceLookupResult::Found(page) = &result {
            if page.has_more {
                info!(%kind, returned = page.items.len(), "listing truncated to first page");
            }
        }
        result
    }
}
