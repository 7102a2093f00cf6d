// Downloader - run requests through the fallback middleware and the live network
use crate::constants;
use crate::error::FallbackError;
use crate::http::{Request, Response};
use crate::middleware::{FallbackMiddleware, Fetched};
use std::time::Duration;

/// Minimal pipeline: archive proxy, live fetch, archive fallback
pub struct Downloader {
    http: reqwest::Client,
    middleware: FallbackMiddleware,
}

impl Downloader {
    pub fn new(middleware: FallbackMiddleware) -> Result<Self, FallbackError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(constants::HTTP_LIVE_TIMEOUT_SECS))
            .user_agent(constants::user_agent())
            .build()
            .map_err(crate::error::ArchiveError::from)?;
        Ok(Self::with_client(middleware, http))
    }

    pub fn with_client(middleware: FallbackMiddleware, http: reqwest::Client) -> Self {
        Self { http, middleware }
    }

    pub fn middleware(&self) -> &FallbackMiddleware {
        &self.middleware
    }

    /// Fetch a request, answering from the archive when the middleware decides so
    pub async fn fetch(&self, request: &Request) -> Result<Fetched, FallbackError> {
        if let Some(archived) = self.middleware.on_request(request).await? {
            return Ok(Fetched::Archived(archived));
        }

        let response = self.fetch_live(request).await?;
        log::debug!("{} {} -> {}", request.method, request.url, response.status);

        Ok(self.middleware.on_response(request, response).await)
    }

    async fn fetch_live(&self, request: &Request) -> Result<Response, FallbackError> {
        let transport = |source| FallbackError::Transport {
            url: request.url.clone(),
            source,
        };

        let response = self
            .http
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(transport)?;

        Response::from_reqwest(response).await.map_err(transport)
    }
}
