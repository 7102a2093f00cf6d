#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use wayback_fallback::snapshot::parse_timestamp;
use wayback_fallback::{ArchiveClient, ArchiveError, CdxRecord, Mode, Snapshot};

// ============================================================================
// Scripted in-memory archive
// ============================================================================

/// What happens when a scripted capture is played back
#[derive(Clone, Debug)]
pub enum Playback {
    /// Served with this recorded status and body
    Serve { status: u16, body: String },
    /// Archive cannot play it back right now
    Unavailable,
    /// Site excluded from the archive
    Blocked,
    /// Exclusion page served as a bare 403, without a runtime-error header
    Excluded,
}

impl Playback {
    pub fn ok(body: &str) -> Self {
        Playback::Serve {
            status: 200,
            body: body.to_string(),
        }
    }

    pub fn status(status: u16) -> Self {
        Playback::Serve {
            status,
            body: String::new(),
        }
    }

    pub fn page(status: u16, body: &str) -> Self {
        Playback::Serve {
            status,
            body: body.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Capture {
    pub url: String,
    pub timestamp: String,
    pub playback: Playback,
}

pub fn capture(url: &str, timestamp: &str, playback: Playback) -> Capture {
    Capture {
        url: url.to_string(),
        timestamp: timestamp.to_string(),
        playback,
    }
}

fn to_record(capture: &Capture) -> CdxRecord {
    CdxRecord {
        key: capture.url.clone(),
        timestamp: capture.timestamp.clone(),
        url: capture.url.clone(),
        mime_type: "text/html".to_string(),
        status_code: match capture.playback {
            Playback::Serve { status, .. } => Some(status),
            _ => None,
        },
        digest: format!("sha1-{}", capture.timestamp),
        length: None,
    }
}

/// Archive client answering from a fixed list of captures, recording every call
#[derive(Default)]
pub struct ScriptedArchive {
    captures: Vec<Capture>,
    searches: Mutex<Vec<String>>,
    fetches: Mutex<Vec<String>>,
}

impl ScriptedArchive {
    /// Captures are listed newest first, as a search would return them
    pub fn new(captures: Vec<Capture>) -> Self {
        Self {
            captures,
            ..Default::default()
        }
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArchiveClient for ScriptedArchive {
    async fn search(&self, url: &str) -> Result<Vec<CdxRecord>, ArchiveError> {
        self.searches.lock().unwrap().push(url.to_string());
        Ok(self
            .captures
            .iter()
            .filter(|c| c.url == url)
            .map(to_record)
            .collect())
    }

    async fn fetch(&self, record: &CdxRecord, mode: Mode) -> Result<Snapshot, ArchiveError> {
        self.fetches.lock().unwrap().push(record.timestamp.clone());

        let capture = self
            .captures
            .iter()
            .find(|c| c.timestamp == record.timestamp && c.url == record.url)
            .ok_or_else(|| ArchiveError::Playback {
                url: record.url.clone(),
                timestamp: record.timestamp.clone(),
                detail: "no such capture".to_string(),
            })?;

        match &capture.playback {
            Playback::Serve { status, body } => Ok(Snapshot {
                status_code: reqwest::StatusCode::from_u16(*status).expect("scripted status is valid"),
                url: capture.url.clone(),
                text: body.clone(),
                encoding: "utf-8".to_string(),
                timestamp: record.captured_at().expect("scripted timestamps are valid"),
                memento_url: format!(
                    "https://web.archive.org/web/{}/{}",
                    capture.timestamp, capture.url
                ),
                headers: reqwest::header::HeaderMap::new(),
                mode,
            }),
            Playback::Unavailable => Err(ArchiveError::Playback {
                url: record.url.clone(),
                timestamp: record.timestamp.clone(),
                detail: "scripted outage".to_string(),
            }),
            Playback::Blocked | Playback::Excluded => Err(ArchiveError::BlockedSite {
                url: record.url.clone(),
            }),
        }
    }
}

// ============================================================================
// Mock Wayback Machine + origin over HTTP
// ============================================================================

/// Shared state of the mock server
#[derive(Clone, Default)]
pub struct MockServer {
    captures: Arc<Mutex<Vec<Capture>>>,
    origin: Arc<Mutex<HashMap<String, (u16, String)>>>,
    playback_hits: Arc<Mutex<Vec<String>>>,
    origin_hits: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    /// Captures may be given in any order; the CDX endpoint lists them oldest first
    pub fn with_captures(self, captures: Vec<Capture>) -> Self {
        *self.captures.lock().unwrap() = captures;
        self
    }

    /// Add a capture after the server is up, for URLs that embed its address
    pub fn add_capture(&self, capture: Capture) {
        self.captures.lock().unwrap().push(capture);
    }

    /// Serve `status`/`body` at `path` on the origin side
    pub fn with_origin(self, path: &str, status: u16, body: &str) -> Self {
        self.origin
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.to_string()));
        self
    }

    pub fn playback_hits(&self) -> Vec<String> {
        self.playback_hits.lock().unwrap().clone()
    }

    pub fn origin_hits(&self) -> Vec<String> {
        self.origin_hits.lock().unwrap().clone()
    }
}

/// Start the mock on an ephemeral port, returning its base URL
pub async fn start_mock_server(
    state: MockServer,
) -> Result<(String, tokio::task::JoinHandle<()>)> {
    let app = Router::new()
        .route("/cdx/search/cdx", get(handle_cdx))
        .fallback(handle_other)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Ok((format!("http://{}", addr), handle))
}

async fn handle_cdx(
    State(state): State<MockServer>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let url = params.get("url").cloned().unwrap_or_default();
    if url.contains("cdx-error") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "CDX server error").into_response();
    }

    let mut captures: Vec<Capture> = state
        .captures
        .lock()
        .unwrap()
        .iter()
        .filter(|c| c.url == url)
        .cloned()
        .collect();
    captures.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    if let Some(limit) = params.get("limit").and_then(|l| l.strip_prefix('-')) {
        let limit: usize = limit.parse().unwrap_or(captures.len());
        let skip = captures.len().saturating_sub(limit);
        captures.drain(..skip);
    }

    if captures.is_empty() {
        return (StatusCode::OK, "[]").into_response();
    }

    let mut rows = vec![wayback_fallback::constants::CDX_FIELDS
        .split(',')
        .map(str::to_string)
        .collect::<Vec<_>>()];
    for c in &captures {
        let record = to_record(c);
        rows.push(vec![
            record.key,
            record.timestamp,
            record.url,
            record.mime_type,
            record
                .status_code
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record.digest,
            "-".to_string(),
        ]);
    }

    (StatusCode::OK, serde_json::to_string(&rows).unwrap()).into_response()
}

async fn handle_other(State(state): State<MockServer>, uri: Uri) -> Response {
    let path = uri.path();

    if let Some(rest) = path.strip_prefix("/web/") {
        let Some((stamp, url)) = rest.split_once('/') else {
            return (StatusCode::BAD_REQUEST, "bad playback path").into_response();
        };
        let mut url = url.to_string();
        if let Some(query) = uri.query() {
            url = format!("{}?{}", url, query);
        }
        let timestamp = stamp.trim_end_matches("id_").to_string();
        state.playback_hits.lock().unwrap().push(timestamp.clone());
        return play_back(&state, &timestamp, &url);
    }

    state.origin_hits.lock().unwrap().push(path.to_string());
    match state.origin.lock().unwrap().get(path) {
        Some((status, body)) => (
            StatusCode::from_u16(*status).unwrap(),
            [(header::CONTENT_TYPE, "text/plain")],
            body.clone(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "no such origin page").into_response(),
    }
}

fn play_back(state: &MockServer, timestamp: &str, url: &str) -> Response {
    let captures = state.captures.lock().unwrap();
    let Some(capture) = captures
        .iter()
        .find(|c| c.timestamp == timestamp && c.url == url)
    else {
        return (
            StatusCode::NOT_FOUND,
            "Hrm. The Wayback Machine has not archived that URL.",
        )
            .into_response();
    };

    match &capture.playback {
        Playback::Serve { status, body } => {
            let captured = parse_timestamp(timestamp).unwrap();
            let mut headers = HeaderMap::new();
            headers.insert(
                "memento-datetime",
                HeaderValue::from_str(&httpdate::fmt_http_date(SystemTime::from(captured)))
                    .unwrap(),
            );
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            );
            if (300..400).contains(status) {
                headers.insert(header::LOCATION, HeaderValue::from_static("/elsewhere"));
            }
            (StatusCode::from_u16(*status).unwrap(), headers, body.clone()).into_response()
        }
        Playback::Unavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            "The Wayback Machine is temporarily unable to play back this capture.",
        )
            .into_response(),
        Playback::Blocked => (
            StatusCode::FORBIDDEN,
            [(
                "x-archive-wayback-runtime-error",
                "AdministrativeAccessControlException: Blocked Site Error",
            )],
            "Sorry. This URL has been excluded from the Wayback Machine.",
        )
            .into_response(),
        Playback::Excluded => (
            StatusCode::FORBIDDEN,
            "Sorry. This URL has been excluded from the Wayback Machine.",
        )
            .into_response(),
    }
}
