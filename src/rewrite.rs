//! Absolute-URL rewriting through the local resource proxy.
//!
//! A [`Proxifier`] turns `https://cdn.example/a.jpg` into
//! `<proxy base>/proxy?url=https%3A%2F%2Fcdn.example%2Fa.jpg`. Everything that
//! does not need a network round-trip through the proxy passes through as-is:
//! empty values, `data:`/`blob:` URLs, relative and protocol-relative paths,
//! and URLs that already point at the proxy itself.

use std::borrow::Cow;
use url::{Origin, Url};

/// Path of the resource proxy endpoint, relative to the proxy base.
pub const PROXY_PATH: &str = "/proxy";

/// Rewrites absolute resource URLs into same-origin proxy URLs.
#[derive(Debug, Clone)]
pub struct Proxifier {
    base: String,
    origin: Origin,
}

impl Proxifier {
    /// Create a proxifier for the proxy reachable at `proxy_base`
    /// (e.g. `http://localhost:5000`).
    pub fn new(proxy_base: &str) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(proxy_base)?;
        Ok(Self {
            base: proxy_base.trim_end_matches('/').to_string(),
            origin: parsed.origin(),
        })
    }

    /// The proxy base URL without a trailing slash.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Rewrite `url` through the proxy, or return it unchanged when it is not
    /// an absolute `http(s)` URL or is already served by the proxy.
    pub fn proxify(&self, url: &str) -> String {
        let candidate = url.trim();
        if candidate.is_empty()
            || has_scheme(candidate, "data:")
            || has_scheme(candidate, "blob:")
            || !is_absolute_http(candidate)
            || self.is_local(candidate)
        {
            return url.to_string();
        }

        format!(
            "{}{}?url={}",
            self.base,
            PROXY_PATH,
            urlencoding::encode(&decode_entities(candidate))
        )
    }

    /// Whether `url` already targets the proxy's own origin.
    pub fn is_local(&self, url: &str) -> bool {
        Url::parse(url.trim())
            .map(|parsed| parsed.origin() == self.origin)
            .unwrap_or(false)
    }
}

/// Decode entity-encoded ampersands (`&amp;` → `&`).
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if text.contains("&amp;") {
        Cow::Owned(text.replace("&amp;", "&"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Whether `url` is an absolute `http://` or `https://` URL.
pub fn is_absolute_http(url: &str) -> bool {
    let url = url.trim_start();
    has_scheme(url, "http://") || has_scheme(url, "https://")
}

fn has_scheme(url: &str, scheme: &str) -> bool {
    url.get(..scheme.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
}
