// Snapshot types - capture identifiers from the CDX index and fetched mementos
use crate::error::ArchiveError;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Fills the parts of a truncated CDX timestamp (month, day, time) with their earliest value
const TIMESTAMP_TEMPLATE: &str = "20000101000000";

/// How a capture should be played back by the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// The bytes originally captured, without archive rewriting
    Original,
    /// The archive's rewritten page with its toolbar and rewritten links
    View,
}

impl Mode {
    /// Suffix appended to the timestamp in a playback URL
    pub fn flag(&self) -> &'static str {
        match self {
            Mode::Original => "id_",
            Mode::View => "",
        }
    }
}

/// One capture listed by the CDX index, used as the identifier of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdxRecord {
    /// SURT-form key of the captured URL
    pub key: String,
    /// Raw 14-digit capture timestamp (`YYYYMMDDhhmmss`)
    pub timestamp: String,
    /// URL as originally captured
    pub url: String,
    pub mime_type: String,
    /// Status recorded at capture time; `None` for revisit records
    pub status_code: Option<u16>,
    pub digest: String,
    pub length: Option<u64>,
}

impl CdxRecord {
    /// Build a record from one CDX JSON row, using the header row to locate columns
    pub fn from_row(header: &[String], row: &[String]) -> Result<Self, ArchiveError> {
        let field = |name: &str| -> Result<&str, ArchiveError> {
            header
                .iter()
                .position(|h| h == name)
                .and_then(|i| row.get(i))
                .map(String::as_str)
                .ok_or_else(|| ArchiveError::Malformed(format!("CDX row is missing `{}`", name)))
        };

        let timestamp = field("timestamp")?;
        if timestamp.len() < 4 || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ArchiveError::Malformed(format!(
                "invalid CDX timestamp `{}`",
                timestamp
            )));
        }

        Ok(Self {
            key: field("urlkey").unwrap_or_default().to_string(),
            timestamp: timestamp.to_string(),
            url: field("original")?.to_string(),
            mime_type: field("mimetype").unwrap_or_default().to_string(),
            status_code: field("statuscode").ok().and_then(|s| s.parse().ok()),
            digest: field("digest").unwrap_or_default().to_string(),
            length: field("length").ok().and_then(|s| s.parse().ok()),
        })
    }

    /// Capture time parsed from the raw timestamp
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

/// Parse a CDX timestamp, padding truncated values to their earliest instant
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.len() > TIMESTAMP_TEMPLATE.len() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let padded = format!("{}{}", raw, &TIMESTAMP_TEMPLATE[raw.len()..]);
    NaiveDateTime::parse_from_str(&padded, "%Y%m%d%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Format a capture time as a 14-digit CDX timestamp
pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.format("%Y%m%d%H%M%S").to_string()
}

/// A capture fetched from the archive.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Status recorded when the page was captured
    pub status_code: StatusCode,
    /// URL as originally captured
    pub url: String,
    /// Decoded body
    pub text: String,
    /// Character encoding the body was decoded with
    pub encoding: String,
    /// Capture time
    pub timestamp: DateTime<Utc>,
    /// Canonical playback URL of this capture
    pub memento_url: String,
    pub headers: HeaderMap,
    pub mode: Mode,
}

impl Snapshot {
    pub fn is_ok(&self) -> bool {
        self.status_code == StatusCode::OK
    }
}
