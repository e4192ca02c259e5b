//! Resource proxy: `GET /proxy?url=<absolute url>`.
//!
//! Fetches the target server-side with a browser-like identity and streams
//! the body back, forwarding only the origin's `content-type`. Failures never
//! leave this module as anything but a plain-text HTTP response.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use warp::http::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE};
use warp::http::StatusCode;
use warp::hyper::Body;
use warp::reply::Response;

use crate::config::{OriginConfig, ProxyConfig};
use crate::metrics;
use crate::rewrite::{decode_entities, is_absolute_http};

/// Streamed response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, FetchError>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// What the origin answered.
pub struct FetchedResource {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: ByteStream,
}

impl std::fmt::Debug for FetchedResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedResource")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Outbound fetch capability behind the proxy.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError>;
}

/// reqwest-backed fetcher sending a browser user agent and the origin as referer.
pub struct HttpFetcher {
    client: reqwest::Client,
    referer: String,
}

impl HttpFetcher {
    pub fn new(origin: &OriginConfig, proxy: &ProxyConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(proxy.timeout_secs))
            .user_agent(origin.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            referer: origin.referer.clone(),
        })
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::REFERER, &self.referer)
            .header(reqwest::header::ACCEPT, "*/*")
            .send()
            .await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.bytes_stream().map(|chunk| chunk.map_err(FetchError::from));

        Ok(FetchedResource {
            status,
            content_type,
            body: Box::pin(body),
        })
    }
}

/// Why a `/proxy` request was refused before any fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyRejection {
    #[error("Missing url parameter")]
    MissingUrl,
    #[error("Invalid url parameter")]
    InvalidUrl,
}

/// Extract and validate the fetch target from the query string.
pub fn parse_target(params: &HashMap<String, String>) -> Result<String, ProxyRejection> {
    let raw = params
        .get("url")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or(ProxyRejection::MissingUrl)?;

    let target = decode_entities(raw).into_owned();
    if !is_absolute_http(&target) || url::Url::parse(&target).is_err() {
        return Err(ProxyRejection::InvalidUrl);
    }
    Ok(target)
}

/// Serve one proxy request.
#[instrument(skip(fetcher, params, proxy), fields(url))]
pub async fn proxy_resource(
    fetcher: &dyn ResourceFetcher,
    params: &HashMap<String, String>,
    proxy: &ProxyConfig,
) -> Response {
    let target = match parse_target(params) {
        Ok(target) => target,
        Err(rejection) => {
            metrics::record_proxy_request("bad_request");
            return text_reply(StatusCode::BAD_REQUEST, rejection.to_string());
        }
    };
    tracing::Span::current().record("url", target.as_str());

    let resource = match fetcher.fetch(&target).await {
        Ok(resource) => resource,
        Err(e) => {
            warn!(error = %e, "Proxy fetch failed");
            metrics::record_proxy_request("transport");
            return text_reply(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch resource");
        }
    };

    if !(200..300).contains(&resource.status) {
        debug!(status = resource.status, "Origin returned non-success status");
        metrics::record_proxy_request("upstream_status");
        let status = StatusCode::from_u16(resource.status).unwrap_or(StatusCode::BAD_GATEWAY);
        return text_reply(
            status,
            format!("Upstream responded with status {}", resource.status),
        );
    }

    metrics::record_proxy_request("ok");
    let status = StatusCode::from_u16(resource.status).unwrap_or(StatusCode::OK);
    let mut response = Response::new(Body::wrap_stream(resource.body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    if let Some(value) = resource
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
    {
        headers.insert(CONTENT_TYPE, value);
    }
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    if let Ok(value) =
        HeaderValue::from_str(&format!("public, max-age={}", proxy.cache_max_age_secs))
    {
        headers.insert(CACHE_CONTROL, value);
    }
    response
}

/// Plain-text response with the given status.
pub fn text_reply(status: StatusCode, message: impl Into<String>) -> Response {
    let mut response = Response::new(Body::from(message.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
