// Archive client - lookup and playback against the Wayback Machine
use crate::constants;
use crate::error::ArchiveError;
use crate::snapshot::{CdxRecord, Mode, Snapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Header the Wayback Machine uses to explain why playback failed
const RUNTIME_ERROR_HEADER: &str = "x-archive-wayback-runtime-error";

/// The two operations the fallback logic needs from an archive.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait ArchiveClient: Send + Sync {
    /// List captures of `url`, newest first. An uncaptured URL yields an empty list.
    async fn search(&self, url: &str) -> Result<Vec<CdxRecord>, ArchiveError>;

    /// Play back a single capture.
    async fn fetch(&self, record: &CdxRecord, mode: Mode) -> Result<Snapshot, ArchiveError>;
}

/// Configuration options for [`WaybackClient`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Archive base URL
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Maximum archive requests per minute (None = unlimited)
    pub rate_limit: Option<usize>,
    /// Only consider the N most recent captures (None = all)
    pub search_limit: Option<usize>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: constants::DEFAULT_WAYBACK_URL.to_string(),
            timeout: Duration::from_secs(constants::HTTP_TIMEOUT_SECS),
            rate_limit: None,
            search_limit: None,
        }
    }
}

/// Builder for ClientOptions
pub struct ClientOptionsBuilder {
    options: ClientOptions,
}

impl ClientOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: ClientOptions::default(),
        }
    }

    pub fn base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.options.base_url = url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    pub fn rate_limit(mut self, per_minute: Option<usize>) -> Self {
        self.options.rate_limit = per_minute;
        self
    }

    pub fn search_limit(mut self, limit: Option<usize>) -> Self {
        self.options.search_limit = limit;
        self
    }

    pub fn build(self) -> ClientOptions {
        self.options
    }
}

impl Default for ClientOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP client for the Wayback Machine CDX index and playback endpoints
pub struct WaybackClient {
    client: reqwest::Client,
    base_url: String,
    search_limit: Option<usize>,
    rate_limiter: Option<RateLimiter>,
}

impl WaybackClient {
    /// Create a client. A configured rate limit needs a running Tokio runtime.
    pub fn new(options: ClientOptions) -> Result<Self, ArchiveError> {
        // Recorded redirects are captures in their own right, never follow them
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(constants::user_agent())
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        let rate_limiter = options.rate_limit.and_then(|per_minute| {
            RateLimiter::new(
                per_minute,
                Duration::from_secs(constants::RATE_LIMIT_PERIOD_SECS),
            )
        });

        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            search_limit: options.search_limit,
            rate_limiter,
        })
    }

    /// Get the archive base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn throttle(&self) {
        if let Some(limiter) = &self.rate_limiter {
            limiter.wait().await;
        }
    }
}

#[async_trait]
impl ArchiveClient for WaybackClient {
    async fn search(&self, url: &str) -> Result<Vec<CdxRecord>, ArchiveError> {
        self.throttle().await;

        let endpoint = constants::cdx_search_url(&self.base_url);
        let mut query = vec![
            ("url", url.to_string()),
            ("output", "json".to_string()),
            ("fl", constants::CDX_FIELDS.to_string()),
        ];
        if let Some(limit) = self.search_limit {
            // A negative limit asks the CDX server for the most recent captures
            query.push(("limit", format!("-{}", limit)));
        }

        log::debug!("Searching archive for {}", url);
        let response = self.client.get(&endpoint).query(&query).send().await?;

        if !response.status().is_success() {
            return Err(ArchiveError::UnexpectedStatus {
                status: response.status(),
                url: endpoint,
            });
        }

        let body = response.text().await?;
        let records = parse_cdx(&body)?;
        log::debug!("Archive lists {} captures of {}", records.len(), url);

        Ok(records)
    }

    async fn fetch(&self, record: &CdxRecord, mode: Mode) -> Result<Snapshot, ArchiveError> {
        self.throttle().await;

        let playback = constants::playback_url(
            &self.base_url,
            &record.timestamp,
            mode.flag(),
            &record.url,
        );

        log::debug!("Fetching memento {}", playback);
        let response = self.client.get(&playback).send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let encoding = charset(&headers).unwrap_or_else(|| constants::DEFAULT_ENCODING.to_string());
        let text = response.text_with_charset(constants::DEFAULT_ENCODING).await?;

        if let Some(runtime_error) = header_str(&headers, RUNTIME_ERROR_HEADER) {
            if is_access_control_error(runtime_error) {
                return Err(ArchiveError::BlockedSite {
                    url: record.url.clone(),
                });
            }
            return Err(ArchiveError::Playback {
                url: record.url.clone(),
                timestamp: record.timestamp.clone(),
                detail: runtime_error.to_string(),
            });
        }

        // Without Memento-Datetime the body is the archive's own error page, not a capture
        let Some(memento_datetime) = header_str(&headers, constants::MEMENTO_DATETIME_HEADER)
        else {
            if status == StatusCode::FORBIDDEN && is_exclusion_page(&text) {
                return Err(ArchiveError::BlockedSite {
                    url: record.url.clone(),
                });
            }
            return Err(ArchiveError::Playback {
                url: record.url.clone(),
                timestamp: record.timestamp.clone(),
                detail: format!("archive answered {} without a memento", status),
            });
        };

        let timestamp = httpdate::parse_http_date(memento_datetime)
            .ok()
            .map(DateTime::<Utc>::from)
            .or_else(|| record.captured_at())
            .ok_or_else(|| {
                ArchiveError::Malformed(format!(
                    "memento {} has no usable capture time",
                    playback
                ))
            })?;

        Ok(Snapshot {
            status_code: status,
            url: record.url.clone(),
            text,
            encoding,
            timestamp,
            memento_url: constants::playback_url(
                &self.base_url,
                &record.timestamp,
                Mode::View.flag(),
                &record.url,
            ),
            headers,
            mode,
        })
    }
}

/// Parse a CDX JSON response into records, newest first
///
/// The CDX server answers with an array of string rows whose first row names the columns,
/// oldest capture first. An empty body means no captures.
pub fn parse_cdx(body: &str) -> Result<Vec<CdxRecord>, ArchiveError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let rows: Vec<Vec<String>> = sonic_rs::from_str(body)
        .map_err(|e| ArchiveError::Malformed(format!("CDX response is not JSON rows: {}", e)))?;

    let mut rows = rows.into_iter();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };

    let mut records = rows
        .map(|row| CdxRecord::from_row(&header, &row))
        .collect::<Result<Vec<_>, _>>()?;
    records.reverse();

    Ok(records)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Extract the charset parameter of the Content-Type header
fn charset(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_ascii_lowercase())
    })
}

fn is_access_control_error(runtime_error: &str) -> bool {
    runtime_error.contains("AccessControlException") || runtime_error.contains("Blocked")
}

fn is_exclusion_page(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("has been excluded") || lower.contains("blocked")
}

/// Simple token bucket rate limiter
/// Starts with a single permit and refills at a steady rate up to `requests_per_period`
struct RateLimiter {
    semaphore: Arc<Semaphore>,
}

impl RateLimiter {
    fn new(requests_per_period: usize, period: Duration) -> Option<Self> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::warn!("Archive rate limit ignored: no Tokio runtime is running");
            return None;
        };

        let capacity = requests_per_period.clamp(1, Semaphore::MAX_PERMITS);
        let semaphore = Arc::new(Semaphore::new(1));
        let refill_rate = period / u32::try_from(capacity).unwrap_or(u32::MAX);

        // The refill task ends once the client holding the semaphore is dropped
        let weak = Arc::downgrade(&semaphore);
        handle.spawn(async move {
            loop {
                tokio::time::sleep(refill_rate).await;
                let Some(semaphore) = weak.upgrade() else {
                    break;
                };
                if semaphore.available_permits() < capacity {
                    semaphore.add_permits(1);
                }
            }
        });

        Some(Self { semaphore })
    }

    async fn wait(&self) {
        if let Ok(permit) = self.semaphore.acquire().await {
            permit.forget();
        }
    }
}
