//! Global constants and helpers for archive endpoints, networking defaults, and request flag names
use reqwest::StatusCode;

/// Binary name used in user agents
pub const BINARY_NAME: &str = "wayback-fallback";

/// Package version from Cargo.toml (set at compile time)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the user agent string for HTTP requests
pub fn user_agent() -> String {
    format!("{}/{}", BINARY_NAME, VERSION)
}

// ============================================================================
// Archive Endpoints
// ============================================================================

/// Default Wayback Machine base URL
pub const DEFAULT_WAYBACK_URL: &str = "https://web.archive.org";

/// Path of the CDX search endpoint, relative to the archive base URL
pub const CDX_SEARCH_PATH: &str = "/cdx/search/cdx";

/// Fields requested from the CDX server, in column order
pub const CDX_FIELDS: &str = "urlkey,timestamp,original,mimetype,statuscode,digest,length";

/// Header carrying the capture time of a memento (RFC 7089)
pub const MEMENTO_DATETIME_HEADER: &str = "memento-datetime";

/// Character encoding assumed when a snapshot does not declare one
pub const DEFAULT_ENCODING: &str = "utf-8";

/// Status reported by an archived response that resolved to nothing
pub const NOT_FOUND_STATUS: StatusCode = StatusCode::NOT_FOUND;

// ============================================================================
// Timeout Constants (in seconds)
// ============================================================================

/// Default HTTP request timeout for archive lookups and playback
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Default HTTP request timeout for live fetches issued by the downloader
pub const HTTP_LIVE_TIMEOUT_SECS: u64 = 60;

/// Period over which the archive rate limit is expressed
pub const RATE_LIMIT_PERIOD_SECS: u64 = 60;

// ============================================================================
// Request Flags
// ============================================================================

/// Request meta key overriding the proxy setting
pub const META_PROXY_ENABLED: &str = "wayback_machine_proxy_enabled";

/// Request meta key overriding the proxy fallthrough setting
pub const META_PROXY_FALLTHROUGH_ENABLED: &str = "wayback_machine_proxy_fallthrough_enabled";

/// Request meta key overriding the fallback setting
pub const META_FALLBACK_ENABLED: &str = "wayback_machine_fallback_enabled";

/// Crawl setting enabling the archive proxy
pub const SETTING_PROXY_ENABLED: &str = "WAYBACK_MACHINE_PROXY_ENABLED";

/// Crawl setting allowing live requests after a failed proxy lookup
pub const SETTING_PROXY_FALLTHROUGH_ENABLED: &str = "WAYBACK_MACHINE_PROXY_FALLTHROUGH_ENABLED";

/// Crawl setting enabling the archive fallback for error responses
pub const SETTING_FALLBACK_ENABLED: &str = "WAYBACK_MACHINE_FALLBACK_ENABLED";

/// Crawl setting overriding the archive base URL
pub const SETTING_URL: &str = "WAYBACK_MACHINE_URL";

/// Crawl setting overriding the archive HTTP timeout
pub const SETTING_TIMEOUT_SECS: &str = "WAYBACK_MACHINE_TIMEOUT_SECS";

/// Crawl setting limiting archive requests per minute
pub const SETTING_RATE_LIMIT: &str = "WAYBACK_MACHINE_RATE_LIMIT";

// ============================================================================
// URL Helpers
// ============================================================================

/// Returns the CDX search endpoint for an archive base URL
pub fn cdx_search_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), CDX_SEARCH_PATH)
}

/// Returns the playback URL of a capture
///
/// `mode_flag` is appended to the timestamp (`id_` for original content, empty for the
/// archive's own rendering).
pub fn playback_url(base_url: &str, timestamp: &str, mode_flag: &str, original_url: &str) -> String {
    format!(
        "{}/web/{}{}/{}",
        base_url.trim_end_matches('/'),
        timestamp,
        mode_flag,
        original_url
    )
}
