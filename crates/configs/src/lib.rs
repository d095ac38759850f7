use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;

/// Upper bound on any single call to the category/tags service.
pub const MAX_REFERENCE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub references: ReferenceServiceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where and how to reach the category/tags service.
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_options_page_size")]
    pub options_page_size: u32,
    #[serde(default = "default_tag_check_concurrency")]
    pub tag_check_concurrency: usize,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub enabled: bool,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    pub failure_threshold: u64,
    pub recovery_timeout_secs: u64,
    pub half_open_max_calls: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_quizzes_path")]
    pub quizzes_path: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
}

fn default_base_url() -> String { "http://127.0.0.1:8000/api/category_tags".to_string() }
fn default_timeout() -> u64 { MAX_REFERENCE_TIMEOUT_SECS }
fn default_connect_timeout() -> u64 { 2 }
fn default_options_page_size() -> u32 { 1000 }
fn default_tag_check_concurrency() -> usize { 4 }
fn default_quizzes_path() -> String { "data/quizzes.json".to_string() }

impl Default for ReferenceServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            options_page_size: default_options_page_size(),
            tag_check_concurrency: default_tag_check_concurrency(),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { enabled: true, max_attempts: 2, backoff_base_ms: 100, backoff_max_ms: 1000 }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { enabled: false, failure_threshold: 5, recovery_timeout_secs: 30, half_open_max_calls: 1 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { quizzes_path: default_quizzes_path() }
    }
}

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.normalize_with_env(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides through `lookup`, then validate.
    pub fn normalize_with_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("CATEGORY_TAGS_BASE_URL").filter(|u| !u.trim().is_empty()) {
            self.references.base_url = url;
        }
        if let Some(path) = lookup("QUIZZES_DATA_PATH").filter(|p| !p.trim().is_empty()) {
            self.storage.quizzes_path = path;
        }
        self.references.normalize()?;
        if self.storage.quizzes_path.trim().is_empty() {
            self.storage.quizzes_path = default_quizzes_path();
        }
        Ok(())
    }
}

/// Whether `url` starts with `http://` or `https://`, ignoring ASCII case.
pub fn has_http_scheme(url: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        url.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

impl ReferenceServiceConfig {
    fn normalize(&mut self) -> Result<()> {
        let url = self.base_url.trim().trim_end_matches('/').to_string();
        if url.is_empty() {
            return Err(anyhow!(
                "references.base_url is empty; set it in config.toml or CATEGORY_TAGS_BASE_URL"
            ));
        }
        if !has_http_scheme(&url) {
            return Err(anyhow!("references.base_url must start with http:// or https://"));
        }
        self.base_url = url;

        if self.timeout_secs == 0 {
            return Err(anyhow!("references.timeout_secs must be a positive number of seconds"));
        }
        self.timeout_secs = self.timeout_secs.min(MAX_REFERENCE_TIMEOUT_SECS);
        self.connect_timeout_secs = self.connect_timeout_secs.clamp(1, self.timeout_secs);

        if self.tag_check_concurrency == 0 {
            self.tag_check_concurrency = 1;
        }
        if self.options_page_size == 0 {
            self.options_page_size = default_options_page_size();
        }
        if self.retry.max_attempts == 0 {
            self.retry.max_attempts = 1;
        }
        if self.retry.backoff_max_ms < self.retry.backoff_base_ms {
            self.retry.backoff_max_ms = self.retry.backoff_base_ms;
        }
        if self.circuit_breaker.enabled && self.circuit_breaker.failure_threshold == 0 {
            return Err(anyhow!("references.circuit_breaker.failure_threshold must be >= 1"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker.recovery_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.retry.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.retry.backoff_max_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> { None }

    #[test]
    fn empty_file_uses_defaults() {
        let mut cfg = parse("").unwrap();
        cfg.normalize_with_env(no_env).unwrap();
        assert_eq!(cfg.references.timeout_secs, 5);
        assert_eq!(cfg.references.options_page_size, 1000);
        assert_eq!(cfg.references.tag_check_concurrency, 4);
        assert!(!cfg.references.circuit_breaker.enabled);
        assert_eq!(cfg.storage.quizzes_path, "data/quizzes.json");
        assert!(!cfg.logging.json);
    }

    #[test]
    fn timeout_is_capped_at_five_seconds() {
        let mut cfg = parse(
            r#"
            [references]
            base_url = "http://catalog.local/api/"
            timeout_secs = 30
            connect_timeout_secs = 10
            "#,
        )
        .unwrap();
        cfg.normalize_with_env(no_env).unwrap();
        assert_eq!(cfg.references.request_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.references.connect_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.references.base_url, "http://catalog.local/api");
    }

    #[test]
    fn env_overrides_base_url_and_data_path() {
        let mut cfg = AppConfig::default();
        cfg.normalize_with_env(|key| match key {
            "CATEGORY_TAGS_BASE_URL" => Some("https://tags.example.com/".into()),
            "QUIZZES_DATA_PATH" => Some("/tmp/q.json".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.references.base_url, "https://tags.example.com");
        assert_eq!(cfg.storage.quizzes_path, "/tmp/q.json");
    }

    #[test]
    fn rejects_non_http_base_url() {
        let mut cfg = parse("[references]\nbase_url = \"ftp://nope\"\n").unwrap();
        assert!(cfg.normalize_with_env(no_env).is_err());
    }

    #[test]
    fn scheme_check_ignores_case() {
        assert!(has_http_scheme("HTTP://Catalog.local/api"));
        assert!(has_http_scheme("Https://catalog.local"));
        assert!(!has_http_scheme("httpx://catalog.local"));
        assert!(!has_http_scheme("http:/"));

        let mut cfg = parse("[references]\nbase_url = \"HTTP://Catalog.local/api/\"\n").unwrap();
        cfg.normalize_with_env(no_env).unwrap();
        assert_eq!(cfg.references.base_url, "HTTP://Catalog.local/api");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut cfg = parse("[references]\nbase_url = \"http://x\"\ntimeout_secs = 0\n").unwrap();
        assert!(cfg.normalize_with_env(no_env).is_err());
    }

    #[test]
    fn retry_and_breaker_sections_parse() {
        let mut cfg = parse(
            r#"
            [references]
            base_url = "http://x"
            tag_check_concurrency = 0

            [references.retry]
            enabled = true
            max_attempts = 0
            backoff_base_ms = 200
            backoff_max_ms = 50

            [references.circuit_breaker]
            enabled = true
            failure_threshold = 3
            recovery_timeout_secs = 10
            half_open_max_calls = 2

            [logging]
            json = true
            "#,
        )
        .unwrap();
        cfg.normalize_with_env(no_env).unwrap();
        assert_eq!(cfg.references.tag_check_concurrency, 1);
        assert_eq!(cfg.references.retry.max_attempts, 1);
        assert_eq!(cfg.references.backoff_max(), Duration::from_millis(200));
        assert_eq!(cfg.references.recovery_timeout(), Duration::from_secs(10));
        assert!(cfg.logging.json);
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let mut cfg = parse("[references.retry]\nmax_attempts = 4\n").unwrap();
        cfg.normalize_with_env(no_env).unwrap();
        assert_eq!(cfg.references.retry.max_attempts, 4);
        assert!(cfg.references.retry.enabled);
        assert_eq!(cfg.references.base_url, "http://127.0.0.1:8000/api/category_tags");
    }
}
