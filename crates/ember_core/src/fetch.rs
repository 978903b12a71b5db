//! Network access for module sources

use futures::future::LocalBoxFuture;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use std::time::Duration;
use url::Url;

use crate::error::{LoaderError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub timeout: Option<Duration>,
    /// Skip every HTTP cache between us and the origin.
    pub bypass_cache: bool,
}

impl FetchRequest {
    pub fn source() -> Self {
        Self {
            timeout: None,
            bypass_cache: true,
        }
    }

    pub fn probe(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            bypass_cache: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// HTML content type: what a static host's SPA fallback answers with.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"))
    }

    /// A response that can be a module body.
    pub fn is_module(&self) -> bool {
        self.is_success() && !self.is_html()
    }

    /// Turns the response into module source text, or the fetch failure it represents.
    pub fn into_source(self, url: &Url) -> Result<String> {
        if !self.is_success() {
            return Err(LoaderError::Status {
                url: url.clone(),
                status: self.status,
            });
        }
        if self.is_html() {
            return Err(LoaderError::HtmlFallback { url: url.clone() });
        }
        Ok(self.body)
    }
}

pub type FetchFuture<'a> = LocalBoxFuture<'a, anyhow::Result<FetchResponse>>;

/// Transport for module sources and extension probes. Non-2xx statuses are
/// responses, not errors; `Err` means the request itself failed.
pub trait Fetcher {
    fn fetch(&self, url: &Url, request: FetchRequest) -> FetchFuture<'_>;
}

/// `Fetcher` over HTTP(S) with reqwest.
#[derive(Clone, Debug, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &Url, request: FetchRequest) -> FetchFuture<'_> {
        let mut builder = self.client.get(url.clone());
        if request.bypass_cache {
            builder = builder
                .header(CACHE_CONTROL, "no-cache")
                .header(PRAGMA, "no-cache");
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        Box::pin(async move {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let body = response.text().await?;

            Ok(FetchResponse {
                status,
                content_type,
                body,
            })
        })
    }
}
