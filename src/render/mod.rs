//! Render capability: load a profile page in a real browser and hand back
//! its final HTML or a screenshot.
//!
//! The pipeline never talks to a browser directly; it is handed a
//! [`Renderer`] owned by the process. Request isolation (one browsing
//! context per render) is the implementation's job.

#[cfg(feature = "browser")]
mod chromium;

#[cfg(feature = "browser")]
pub use chromium::{ChromiumRenderer, Session};

use async_trait::async_trait;
use serde::Deserialize;

/// Per-request render options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub mobile: bool,
}

/// Query string accepted by the profile endpoints (`?mobile=true`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenderQuery {
    #[serde(default)]
    pub mobile: Option<String>,
}

impl RenderQuery {
    /// Only the literal `true` selects the mobile viewport.
    pub fn options(&self) -> RenderOptions {
        RenderOptions {
            mobile: self.mobile.as_deref() == Some("true"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("renderer unavailable: {0}")]
    Unavailable(String),
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("browser error: {0}")]
    Browser(String),
}

#[async_trait]
pub trait Renderer: Send + Sync {
    /// Final HTML of the profile page for `id`.
    async fn render_html(&self, id: &str, options: RenderOptions) -> Result<String, RenderError>;

    /// Viewport-sized PNG of the profile page for `id`.
    async fn screenshot(&self, id: &str, options: RenderOptions) -> Result<Vec<u8>, RenderError>;

    /// Release the underlying browser. Safe to call more than once.
    async fn shutdown(&self) {}
}

/// Stand-in used when the crate is built without a browser backend.
#[derive(Debug, Default)]
pub struct DisabledRenderer;

#[async_trait]
impl Renderer for DisabledRenderer {
    async fn render_html(&self, _id: &str, _options: RenderOptions) -> Result<String, RenderError> {
        Err(RenderError::Unavailable(
            "built without the `browser` feature".to_string(),
        ))
    }

    async fn screenshot(&self, _id: &str, _options: RenderOptions) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::Unavailable(
            "built without the `browser` feature".to_string(),
        ))
    }
}
