// Archived responses - a resolved capture standing in for a live response
use crate::client::ArchiveClient;
use crate::constants;
use crate::http::{HttpResponse, Request, Response};
use crate::resolver::{self, Resolution};
use crate::snapshot::CdxRecord;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// The result of resolving a candidate list, shaped like an HTTP response.
///
/// Built once by [`ArchivedResponse::new`] and never changed afterwards. An invalid response
/// (nothing playable) reports [`constants::NOT_FOUND_STATUS`] with an empty body. The URL is
/// always the one originally requested, whatever URL the capture itself recorded.
#[derive(Clone)]
pub struct ArchivedResponse {
    request: Request,
    original_response: Option<Response>,
    client: Arc<dyn ArchiveClient>,
    candidates: Arc<[CdxRecord]>,
    /// Position of the resolved capture in `candidates`
    index: Option<usize>,
    /// First candidate older than the resolved one
    cursor: usize,
    status: StatusCode,
    headers: HeaderMap,
    text: String,
    encoding: String,
    timestamp: Option<DateTime<Utc>>,
    memento_url: Option<String>,
    snapshot_url: Option<String>,
}

impl ArchivedResponse {
    /// Resolve `candidates` (newest first) and wrap the outcome
    pub async fn new(
        request: Request,
        candidates: impl Into<Arc<[CdxRecord]>>,
        original_response: Option<Response>,
        client: Arc<dyn ArchiveClient>,
    ) -> Self {
        Self::resolve_from(request, candidates.into(), 0, original_response, client).await
    }

    async fn resolve_from(
        request: Request,
        candidates: Arc<[CdxRecord]>,
        start: usize,
        original_response: Option<Response>,
        client: Arc<dyn ArchiveClient>,
    ) -> Self {
        let start = start.min(candidates.len());
        let resolution = resolver::resolve(&candidates[start..], client.as_ref()).await;

        let mut response = Self {
            request,
            original_response,
            client,
            cursor: candidates.len(),
            candidates,
            index: None,
            status: constants::NOT_FOUND_STATUS,
            headers: HeaderMap::new(),
            text: String::new(),
            encoding: constants::DEFAULT_ENCODING.to_string(),
            timestamp: None,
            memento_url: None,
            snapshot_url: None,
        };

        if let Resolution::Found { snapshot, index } = resolution {
            let index = start + index;
            response.index = Some(index);
            response.cursor = index + 1;
            response.status = snapshot.status_code;
            response.headers = snapshot.headers;
            response.text = snapshot.text;
            response.encoding = snapshot.encoding;
            response.timestamp = Some(snapshot.timestamp);
            response.memento_url = Some(snapshot.memento_url);
            response.snapshot_url = Some(snapshot.url);
        }

        response
    }

    /// Whether a playable capture was found
    pub fn is_valid(&self) -> bool {
        self.index.is_some()
    }

    /// Canonical archive playback URL of the resolved capture.
    ///
    /// # Panics
    ///
    /// Panics if the response is invalid. Check [`ArchivedResponse::is_valid`] first.
    pub fn wayback_url(&self) -> &str {
        match self.memento_url.as_deref() {
            Some(url) => url,
            None => panic!(
                "wayback_url() called on an archived response of {} that resolved to nothing",
                self.request.url
            ),
        }
    }

    pub fn try_wayback_url(&self) -> Option<&str> {
        self.memento_url.as_deref()
    }

    /// The next older playable capture, or `None` once history is exhausted
    pub async fn earlier(&self) -> Option<ArchivedResponse> {
        if !self.is_valid() || self.cursor >= self.candidates.len() {
            return None;
        }

        let response = Self::resolve_from(
            self.request.clone(),
            Arc::clone(&self.candidates),
            self.cursor,
            self.original_response.clone(),
            Arc::clone(&self.client),
        )
        .await;

        response.is_valid().then_some(response)
    }

    /// Walk from this capture back through every older playable one
    pub fn history(self) -> History {
        History {
            current: self.is_valid().then_some(self),
            yielded_current: false,
        }
    }

    /// A new GET for this response's URL that carries this response as context
    pub fn as_downstream_request(&self, callback: impl Into<String>) -> Request {
        Request::new(self.url())
            .with_callback(callback)
            .with_archived(Arc::new(self.clone()))
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The live response this one replaced, if any
    pub fn original_response(&self) -> Option<&Response> {
        self.original_response.as_ref()
    }

    /// Give back the replaced live response
    pub fn into_original_response(self) -> Option<Response> {
        self.original_response
    }

    /// Capture time; `None` when invalid
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// URL recorded by the capture itself
    pub fn snapshot_url(&self) -> Option<&str> {
        self.snapshot_url.as_deref()
    }

    /// The candidate that was resolved
    pub fn record(&self) -> Option<&CdxRecord> {
        self.index.and_then(|i| self.candidates.get(i))
    }

    /// Candidates older than the resolved one, not yet tried
    pub fn remaining(&self) -> &[CdxRecord] {
        self.candidates.get(self.cursor..).unwrap_or(&[])
    }

    /// The full candidate list this response was resolved from
    pub fn candidates(&self) -> &[CdxRecord] {
        &self.candidates
    }
}

impl HttpResponse for ArchivedResponse {
    fn url(&self) -> &str {
        &self.request.url
    }

    fn status(&self) -> StatusCode {
        self.status
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn body(&self) -> &[u8] {
        self.text.as_bytes()
    }

    fn text(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.text)
    }
}

impl fmt::Debug for ArchivedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchivedResponse")
            .field("url", &self.request.url)
            .field("status", &self.status)
            .field("timestamp", &self.timestamp)
            .field("memento_url", &self.memento_url)
            .field("remaining", &self.remaining().len())
            .finish_non_exhaustive()
    }
}

/// Cursor over successively older playable captures
pub struct History {
    current: Option<ArchivedResponse>,
    yielded_current: bool,
}

impl History {
    /// Yields the starting capture first, then each older one; `None` at exhaustion
    pub async fn next(&mut self) -> Option<ArchivedResponse> {
        if self.yielded_current {
            self.current = match &self.current {
                Some(current) => current.earlier().await,
                None => None,
            };
        }
        self.yielded_current = true;
        self.current.clone()
    }
}
