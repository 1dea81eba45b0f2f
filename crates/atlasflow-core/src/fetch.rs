//! Page fetcher for the paginated remote API
//!
//! One fetch call issues one HTTP request for a (client, route, date-range,
//! page) tuple and returns the parsed page. Transient failures (network
//! errors, 5xx, rate limiting) are retried under the backoff policy; anything
//! else surfaces immediately as `FetchRejected`. The fetcher holds no state
//! across invocations beyond the reused HTTP client.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use atlasflow_common::AtlasError;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::models::ApiRoute;
use crate::retry::BackoffPolicy;

/// Inclusive date window for a job run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// One parsed page from the remote API
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    /// Records in the order the API returned them
    pub records: Vec<Value>,
    /// Pagination metadata; any field may be absent
    pub current_page: Option<u32>,
    pub last_page: Option<u32>,
    pub total_pages: Option<u32>,
    pub next_page_url: Option<String>,
}

impl FetchedPage {
    /// Parse a response body into a page, tolerating the body shapes the
    /// upstream APIs are known to produce: a paginated envelope with a
    /// `data` array, a bare array, or a single bare object.
    pub fn from_body(body: Value) -> Self {
        match body {
            Value::Object(ref map) if map.get("data").map(Value::is_array).unwrap_or(false) => {
                let records = match map.get("data") {
                    Some(Value::Array(items)) => items.clone(),
                    _ => Vec::new(),
                };
                Self {
                    records,
                    current_page: read_u32(map.get("current_page")),
                    last_page: read_u32(map.get("last_page")),
                    total_pages: read_u32(map.get("total_pages")),
                    next_page_url: map
                        .get("next_page_url")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                }
            },
            Value::Array(items) => Self {
                records: items,
                ..Self::default()
            },
            Value::Object(_) => Self {
                records: vec![body],
                ..Self::default()
            },
            _ => Self::default(),
        }
    }
}

fn read_u32(value: Option<&Value>) -> Option<u32> {
    value.and_then(Value::as_u64).map(|v| v as u32)
}

/// Fetches one page of records for a job
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the given page (1-based). Retry policy is owned by the
    /// implementation; an error from this method is fatal to the job.
    async fn fetch_page(&self, page: u32) -> PipelineResult<FetchedPage>;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for std::sync::Arc<T> {
    async fn fetch_page(&self, page: u32) -> PipelineResult<FetchedPage> {
        (**self).fetch_page(page).await
    }
}

/// HTTP implementation of [`PageFetcher`] over `reqwest`
pub struct HttpPageFetcher {
    client: reqwest::Client,
    url: String,
    method: reqwest::Method,
    headers: Vec<(String, String)>,
    window: DateWindow,
    per_page: u32,
    backoff: BackoffPolicy,
}

impl HttpPageFetcher {
    /// Build a fetcher for one route, substituting `{token}` and
    /// `{cliente_id}` placeholders in the route URL and headers.
    pub fn new(
        route: &ApiRoute,
        token: &str,
        window: DateWindow,
        config: &PipelineConfig,
    ) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AtlasError::Config(format!("failed to build HTTP client: {}", e)))?;

        let url = substitute_placeholders(&route.url, token, route.cliente_id);
        let method = match route.metodo_http.to_uppercase().as_str() {
            "POST" => reqwest::Method::POST,
            _ => reqwest::Method::GET,
        };

        let headers = match &route.headers {
            Value::Object(map) => map
                .iter()
                .filter_map(|(k, v)| {
                    v.as_str()
                        .map(|v| (k.clone(), substitute_placeholders(v, token, route.cliente_id)))
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            client,
            url,
            method,
            headers,
            window,
            per_page: config.per_page,
            backoff: BackoffPolicy::from_config(config),
        })
    }

    async fn attempt(&self, page: u32) -> Result<FetchedPage, AttemptError> {
        let mut request = self
            .client
            .request(self.method.clone(), &self.url)
            .query(&[
                ("data_inicial", self.window.start.format("%Y-%m-%d").to_string()),
                ("data_final", self.window.end.format("%Y-%m-%d").to_string()),
                ("page", page.to_string()),
                ("per_page", self.per_page.to_string()),
            ]);

        for (name, value) in &self.headers {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AttemptError::Transient(anyhow::Error::new(e)))?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(AttemptError::Transient(anyhow::anyhow!(
                "upstream returned status {}",
                status
            )));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AttemptError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        // A truncated or garbled body is treated like a network failure.
        let body: Value = response
            .json()
            .await
            .map_err(|e| AttemptError::Transient(anyhow::Error::new(e)))?;

        Ok(FetchedPage::from_body(body))
    }
}

enum AttemptError {
    Transient(anyhow::Error),
    Rejected { status: u16, message: String },
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, page: u32) -> PipelineResult<FetchedPage> {
        let mut attempt: u32 = 0;
        loop {
            match self.attempt(page).await {
                Ok(fetched) => {
                    debug!(page, records = fetched.records.len(), "Page fetched");
                    return Ok(fetched);
                },
                Err(AttemptError::Rejected { status, message }) => {
                    return Err(PipelineError::FetchRejected {
                        page,
                        status,
                        message,
                    });
                },
                Err(AttemptError::Transient(source)) => {
                    if !self.backoff.should_retry(attempt) {
                        return Err(PipelineError::FetchExhausted {
                            page,
                            attempts: attempt + 1,
                            source,
                        });
                    }
                    let delay = self.backoff.delay(attempt);
                    warn!(
                        page,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %source,
                        "Transient fetch failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
            }
        }
    }
}

/// Substitute `{token}`, `{cliente_id}` and `{cliente}` placeholders in a
/// route template.
pub fn substitute_placeholders(template: &str, token: &str, cliente_id: i32) -> String {
    template
        .replace("{token}", token)
        .replace("{cliente_id}", &cliente_id.to_string())
        .replace("{cliente}", &cliente_id.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_body_paginated_envelope() {
        let page = FetchedPage::from_body(json!({
            "data": [{"id": 1}, {"id": 2}],
            "current_page": 1,
            "last_page": 3,
            "total_pages": 3,
            "next_page_url": "https://api.example.com/pedidos?page=2"
        }));

        assert_eq!(page.records.len(), 2);
        assert_eq!(page.current_page, Some(1));
        assert_eq!(page.last_page, Some(3));
        assert_eq!(page.total_pages, Some(3));
        assert!(page.next_page_url.is_some());
    }

    #[test]
    fn test_from_body_null_next_page_url() {
        let page = FetchedPage::from_body(json!({
            "data": [{"id": 1}],
            "current_page": 3,
            "last_page": 3,
            "next_page_url": null
        }));

        assert_eq!(page.next_page_url, None);
        assert_eq!(page.total_pages, None);
    }

    #[test]
    fn test_from_body_bare_array() {
        let page = FetchedPage::from_body(json!([{"id": 1}, {"id": 2}, {"id": 3}]));

        assert_eq!(page.records.len(), 3);
        assert_eq!(page.current_page, None);
        assert_eq!(page.next_page_url, None);
    }

    #[test]
    fn test_from_body_bare_object() {
        let page = FetchedPage::from_body(json!({"id": 42, "valor": 10.5}));

        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0]["id"], 42);
    }

    #[test]
    fn test_from_body_scalar_yields_empty_page() {
        let page = FetchedPage::from_body(json!("unexpected"));
        assert!(page.records.is_empty());
    }

    #[test]
    fn test_substitute_placeholders() {
        let out = substitute_placeholders(
            "https://api.example.com/{cliente_id}/pedidos?token={token}",
            "abc123",
            2151,
        );
        assert_eq!(out, "https://api.example.com/2151/pedidos?token=abc123");
    }

    #[test]
    fn test_substitute_placeholders_without_placeholders() {
        let out = substitute_placeholders("https://api.example.com/pedidos", "abc123", 2151);
        assert_eq!(out, "https://api.example.com/pedidos");
    }

    #[test]
    fn test_date_window_contains() {
        let window = DateWindow::new(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
        );

        assert!(window.contains(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
        assert!(window.contains(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()));
    }
}
