// Fallback middleware - answer proxied or failed requests from the archive
use crate::client::{ArchiveClient, WaybackClient};
use crate::error::FallbackError;
use crate::http::{HttpResponse, Request, Response};
use crate::response::ArchivedResponse;
use crate::settings::{resolve_flag, Flag, Settings};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::sync::Arc;

/// A response handed back to the pipeline: either what the origin sent or an archived stand-in
#[derive(Debug, Clone)]
pub enum Fetched {
    Live(Response),
    Archived(ArchivedResponse),
}

impl Fetched {
    pub fn is_archived(&self) -> bool {
        matches!(self, Fetched::Archived(_))
    }

    pub fn as_archived(&self) -> Option<&ArchivedResponse> {
        match self {
            Fetched::Archived(archived) => Some(archived),
            Fetched::Live(_) => None,
        }
    }

    pub fn as_live(&self) -> Option<&Response> {
        match self {
            Fetched::Live(live) => Some(live),
            Fetched::Archived(_) => None,
        }
    }
}

impl HttpResponse for Fetched {
    fn url(&self) -> &str {
        match self {
            Fetched::Live(r) => r.url(),
            Fetched::Archived(r) => r.url(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Fetched::Live(r) => r.status(),
            Fetched::Archived(r) => r.status(),
        }
    }

    fn headers(&self) -> &HeaderMap {
        match self {
            Fetched::Live(r) => r.headers(),
            Fetched::Archived(r) => r.headers(),
        }
    }

    fn body(&self) -> &[u8] {
        match self {
            Fetched::Live(r) => r.body(),
            Fetched::Archived(r) => r.body(),
        }
    }
}

/// Downloader hook substituting archived captures for live fetches.
///
/// One instance serves a whole crawl; the archive client it holds is shared by every
/// concurrent request.
#[derive(Clone)]
pub struct FallbackMiddleware {
    client: Arc<dyn ArchiveClient>,
    settings: Settings,
}

impl FallbackMiddleware {
    pub fn new(client: Arc<dyn ArchiveClient>, settings: Settings) -> Self {
        Self { client, settings }
    }

    /// Crawl start: create the Wayback Machine client described by `settings`
    pub fn on_start(settings: Settings) -> Result<Self, FallbackError> {
        let options = settings.client_options();
        log::info!("Using Wayback Machine at {}", options.base_url);
        let client = WaybackClient::new(options)?;
        Ok(Self::new(Arc::new(client), settings))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn client(&self) -> Arc<dyn ArchiveClient> {
        Arc::clone(&self.client)
    }

    /// Outgoing request hook.
    ///
    /// `Ok(Some(_))` answers the request from the archive and no live fetch must happen;
    /// `Ok(None)` lets the live request proceed.
    pub async fn on_request(
        &self,
        request: &Request,
    ) -> Result<Option<ArchivedResponse>, FallbackError> {
        // GETs built from an archived response replay it instead of going out again
        if let Some(archived) = &request.archived {
            if archived.is_valid() && request.is_safe_read() {
                return Ok(Some((**archived).clone()));
            }
        }

        if !resolve_flag(&request.meta, &self.settings, Flag::ProxyEnabled) {
            return Ok(None);
        }

        if request.is_safe_read() {
            let archived = self.lookup(request, None).await;
            if archived.is_valid() {
                log::info!(
                    "Serving {} from archive capture {}",
                    request.url,
                    archived.wayback_url()
                );
                return Ok(Some(archived));
            }
        }

        if !resolve_flag(&request.meta, &self.settings, Flag::ProxyFallthroughEnabled) {
            log::info!("Abandoning {}: not found in archive", request.url);
            return Err(FallbackError::NotInArchive {
                url: request.url.clone(),
            });
        }

        log::debug!("No archive capture of {}, fetching live", request.url);
        Ok(None)
    }

    /// Incoming response hook. Always returns the response the pipeline should use.
    pub async fn on_response(&self, request: &Request, response: Response) -> Fetched {
        if !resolve_flag(&request.meta, &self.settings, Flag::FallbackEnabled) {
            return Fetched::Live(response);
        }

        if response.status.as_u16() < StatusCode::BAD_REQUEST.as_u16() || !request.is_safe_read() {
            return Fetched::Live(response);
        }

        let status = response.status;
        let archived = self.lookup(request, Some(response)).await;
        if archived.is_valid() {
            log::info!(
                "Replacing {} response for {} with archive capture {}",
                status,
                request.url,
                archived.wayback_url()
            );
            return Fetched::Archived(archived);
        }

        log::debug!("No archive capture of {}, keeping {} response", request.url, status);
        Fetched::Live(
            archived
                .into_original_response()
                .unwrap_or_else(|| Response::new(request.url.clone(), status)),
        )
    }

    /// Search the archive for the request URL and resolve the newest playable capture
    async fn lookup(&self, request: &Request, original: Option<Response>) -> ArchivedResponse {
        let candidates = match self.client.search(&request.url).await {
            Ok(candidates) => candidates,
            Err(e) => {
                log::warn!("Archive search for {} failed: {}", request.url, e);
                Vec::new()
            }
        };

        ArchivedResponse::new(request.clone(), candidates, original, Arc::clone(&self.client)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants;
    use crate::resolver::tests::{Behavior, ScriptedClient};
    use reqwest::Method;

    fn middleware(script: &[(&str, Behavior)], settings: Settings) -> (FallbackMiddleware, Arc<ScriptedClient>) {
        let client = Arc::new(ScriptedClient::new(script));
        (FallbackMiddleware::new(client.clone(), settings), client)
    }

    fn proxy_settings(fallthrough: bool) -> Settings {
        Settings {
            proxy_enabled: Some(true),
            proxy_fallthrough_enabled: Some(fallthrough),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_proxy_disabled_by_default() {
        let (mw, client) = middleware(&[("20200101000000", Behavior::Status(200))], Settings::default());
        let result = mw.on_request(&Request::new("http://example.com/")).await.unwrap();
        assert!(result.is_none());
        assert!(client.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_proxy_serves_archive() {
        let (mw, _) = middleware(&[("20200101000000", Behavior::Status(200))], proxy_settings(true));
        let archived = mw
            .on_request(&Request::new("http://example.com/"))
            .await
            .unwrap()
            .unwrap();
        assert!(archived.is_valid());
        assert!(archived.original_response().is_none());
    }

    #[tokio::test]
    async fn test_proxy_falls_through() {
        let (mw, _) = middleware(&[("20200101000000", Behavior::Playback)], proxy_settings(true));
        let result = mw.on_request(&Request::new("http://example.com/")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_proxy_without_fallthrough_abandons() {
        let (mw, _) = middleware(&[], proxy_settings(false));
        let err = mw
            .on_request(&Request::new("http://example.com/"))
            .await
            .unwrap_err();
        assert!(matches!(err, FallbackError::NotInArchive { ref url } if url == "http://example.com/"));
    }

    #[tokio::test]
    async fn test_proxy_skips_non_get() {
        let (mw, client) = middleware(&[("20200101000000", Behavior::Status(200))], proxy_settings(true));
        let request = Request::new("http://example.com/").with_method(Method::POST);
        assert!(mw.on_request(&request).await.unwrap().is_none());
        assert!(client.fetched().is_empty());

        // Mandatory proxying still abandons what it cannot serve
        let (strict, _) = middleware(&[("20200101000000", Behavior::Status(200))], proxy_settings(false));
        assert!(strict.on_request(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_request_meta_enables_proxy() {
        let (mw, _) = middleware(&[("20200101000000", Behavior::Status(200))], Settings::default());
        let request = Request::new("http://example.com/").with_meta(constants::META_PROXY_ENABLED, true);
        assert!(mw.on_request(&request).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fallback_replaces_error() {
        let (mw, _) = middleware(
            &[
                ("20210101000000", Behavior::Status(200)),
                ("20200101000000", Behavior::Status(200)),
            ],
            Settings::default(),
        );
        let request = Request::new("http://example.com/");
        let live = Response::new("http://example.com/", StatusCode::SERVICE_UNAVAILABLE);

        let fetched = mw.on_response(&request, live).await;
        let archived = fetched.as_archived().unwrap();
        assert_eq!(fetched.status(), StatusCode::OK);
        assert_eq!(
            archived.original_response().unwrap().status,
            StatusCode::SERVICE_UNAVAILABLE
        );

        let older = archived.earlier().await.unwrap();
        assert_eq!(older.record().unwrap().timestamp, "20200101000000");
        assert_eq!(
            older.original_response().unwrap().status,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_fallback_disabled_passes_through() {
        let settings = Settings {
            fallback_enabled: Some(false),
            ..Default::default()
        };
        let (mw, client) = middleware(&[("20200101000000", Behavior::Status(200))], settings);
        let live = Response::new("http://example.com/", StatusCode::SERVICE_UNAVAILABLE).with_body("down");

        let fetched = mw.on_response(&Request::new("http://example.com/"), live).await;
        let live = fetched.as_live().unwrap();
        assert_eq!(live.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(live.body, b"down");
        assert!(client.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_success_and_non_get_pass_through() {
        let (mw, client) = middleware(&[("20200101000000", Behavior::Status(200))], Settings::default());

        let ok = Response::new("http://example.com/", StatusCode::OK);
        assert!(!mw.on_response(&Request::new("http://example.com/"), ok).await.is_archived());

        let redirect = Response::new("http://example.com/", StatusCode::FOUND);
        assert!(!mw.on_response(&Request::new("http://example.com/"), redirect).await.is_archived());

        let post = Request::new("http://example.com/").with_method(Method::POST);
        let failed = Response::new("http://example.com/", StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!mw.on_response(&post, failed).await.is_archived());

        assert!(client.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_keeps_error_when_archive_empty() {
        let (mw, _) = middleware(&[("20200101000000", Behavior::Blocked)], Settings::default());
        let live = Response::new("http://example.com/", StatusCode::NOT_FOUND).with_body("missing");

        let fetched = mw.on_response(&Request::new("http://example.com/"), live).await;
        let live = fetched.as_live().unwrap();
        assert_eq!(live.status, StatusCode::NOT_FOUND);
        assert_eq!(live.body, b"missing");
    }

    #[tokio::test]
    async fn test_downstream_request_replays_archive() {
        let (mw, client) = middleware(&[("20200101000000", Behavior::Status(200))], Settings::default());
        let live = Response::new("http://example.com/", StatusCode::BAD_GATEWAY);
        let fetched = mw.on_response(&Request::new("http://example.com/"), live).await;
        let fetched_before = client.fetched().len();

        let follow_up = fetched.as_archived().unwrap().as_downstream_request("parse");
        let replayed = mw.on_request(&follow_up).await.unwrap().unwrap();
        assert_eq!(replayed.wayback_url(), fetched.as_archived().unwrap().wayback_url());
        assert_eq!(client.fetched().len(), fetched_before);
    }

    #[tokio::test]
    async fn test_downstream_post_not_replayed() {
        let (mw, client) = middleware(&[("20200101000000", Behavior::Status(200))], Settings::default());
        let live = Response::new("http://example.com/", StatusCode::BAD_GATEWAY);
        let fetched = mw.on_response(&Request::new("http://example.com/"), live).await;
        let fetched_before = client.fetched().len();

        let follow_up = fetched
            .as_archived()
            .unwrap()
            .as_downstream_request("submit")
            .with_method(Method::POST);
        assert!(mw.on_request(&follow_up).await.unwrap().is_none());
        assert_eq!(client.fetched().len(), fetched_before);
    }
}
