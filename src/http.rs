// Pipeline value types - requests and responses as seen by the crawler
use crate::response::ArchivedResponse;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-request key/value context, carried through the pipeline untouched
pub type Meta = HashMap<String, serde_json::Value>;

/// What the pipeline can ask of any response, live or archived
pub trait HttpResponse {
    fn url(&self) -> &str;
    fn status(&self) -> StatusCode;
    fn headers(&self) -> &HeaderMap;
    fn body(&self) -> &[u8];

    fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.body())
    }
}

/// A crawl request
#[derive(Debug, Clone)]
pub struct Request {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub meta: Meta,
    /// Name of the callback that should process the response
    pub callback: Option<String>,
    /// Archived response this request was derived from
    pub archived: Option<Arc<ArchivedResponse>>,
}

impl Request {
    /// Create a GET request
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            headers: HeaderMap::new(),
            meta: Meta::new(),
            callback: None,
            archived: None,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn with_callback(mut self, callback: impl Into<String>) -> Self {
        self.callback = Some(callback.into());
        self
    }

    pub fn with_archived(mut self, archived: Arc<ArchivedResponse>) -> Self {
        self.archived = Some(archived);
        self
    }

    /// Only plain reads are ever answered from the archive
    pub fn is_safe_read(&self) -> bool {
        self.method == Method::GET
    }
}

/// A response received from the live origin
#[derive(Debug, Clone)]
pub struct Response {
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(url: impl Into<String>, status: StatusCode) -> Self {
        Self {
            url: url.into(),
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Read a complete response from reqwest
    pub async fn from_reqwest(response: reqwest::Response) -> reqwest::Result<Self> {
        let url = response.url().to_string();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok(Self {
            url,
            status,
            headers,
            body,
        })
    }
}

impl HttpResponse for Response {
    fn url(&self) -> &str {
        &self.url
    }

    fn status(&self) -> StatusCode {
        self.status
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn body(&self) -> &[u8] {
        &self.body
    }
}
