//! Headless Chromium backend using chromiumoxide (CDP).

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::{RenderError, RenderOptions, Renderer};
use crate::config::{OriginConfig, RenderConfig};

struct BrowserState {
    browser: Browser,
    handler_handle: tokio::task::JoinHandle<()>,
}

/// Lazily launched, process-wide browser. Every render gets its own
/// browser context (cookies, storage and cache) and a page inside it.
pub struct ChromiumRenderer {
    config: RenderConfig,
    origin: OriginConfig,
    state: Mutex<Option<BrowserState>>,
}

/// One request's isolated page, handed out by [`ChromiumRenderer::acquire`].
pub struct Session {
    pub page: Page,
    context_id: BrowserContextId,
}

impl Session {
    pub fn context_id(&self) -> &BrowserContextId {
        &self.context_id
    }
}

impl ChromiumRenderer {
    pub fn new(config: RenderConfig, origin: OriginConfig) -> Self {
        Self {
            config,
            origin,
            state: Mutex::new(None),
        }
    }

    /// Launch the browser if needed and open a fresh context and page for
    /// one request. A browser that stops answering is dropped so the next
    /// call starts a new one.
    pub async fn acquire(&self) -> Result<Session, RenderError> {
        let mut state = self.state.lock().await;
        if state.is_none() {
            *state = Some(self.launch().await?);
        }
        let opened = match state.as_ref() {
            Some(running) => open_session(&running.browser).await,
            None => return Err(RenderError::Unavailable("browser not running".to_string())),
        };

        match opened {
            Ok(session) => Ok(session),
            Err(e) => {
                warn!(error = %e, "Browser unresponsive, discarding it");
                if let Some(dead) = state.take() {
                    dead.handler_handle.abort();
                }
                Err(e)
            }
        }
    }

    /// Close a session's page and dispose of its browser context.
    pub async fn release(&self, session: Session) {
        let Session { page, context_id } = session;
        if let Err(e) = page.close().await {
            warn!(error = %e, "Failed to close page");
        }
        let state = self.state.lock().await;
        if let Some(running) = state.as_ref() {
            if let Err(e) = running
                .browser
                .execute(DisposeBrowserContextParams::new(context_id))
                .await
            {
                warn!(error = %e, "Failed to dispose browser context");
            }
        }
    }

    async fn launch(&self) -> Result<BrowserState, RenderError> {
        let viewport = self.config.desktop_viewport;
        let mut builder = BrowserConfig::builder()
            .window_size(viewport.width, viewport.height)
            .args(self.config.chrome_args.clone());
        if !self.config.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(RenderError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        // The handler must be polled for the browser connection to make progress.
        let handler_handle = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        info!(headless = self.config.headless, "Browser launched");
        Ok(BrowserState {
            browser,
            handler_handle,
        })
    }

    /// Set up the page for `options` and load the profile for `id`.
    async fn open_profile(&self, page: &Page, id: &str, options: RenderOptions) -> Result<(), RenderError> {
        let viewport = self.config.viewport(options.mobile);
        page.execute(SetDeviceMetricsOverrideParams::new(
            viewport.width as i64,
            viewport.height as i64,
            1.0,
            options.mobile,
        ))
        .await
        .map_err(|e| RenderError::Browser(format!("Failed to set viewport: {}", e)))?;

        page.execute(SetUserAgentOverrideParams::new(self.origin.user_agent.clone()))
            .await
            .map_err(|e| RenderError::Browser(format!("Failed to set user agent: {}", e)))?;

        let url = self.origin.profile_url(id);
        let secs = self.config.navigation_timeout_secs;
        match tokio::time::timeout(Duration::from_secs(secs), page.goto(url.as_str())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(RenderError::Navigation {
                    url,
                    reason: e.to_string(),
                });
            }
            Err(_) => return Err(RenderError::Timeout { url, secs }),
        }

        self.wait_for_selector(page).await;
        Ok(())
    }

    /// Poll for the configured selector; a miss is not an error.
    async fn wait_for_selector(&self, page: &Page) {
        let selector = self.config.wait_selector.as_str();
        if selector.is_empty() {
            return;
        }
        let poll = async {
            while page.find_element(selector).await.is_err() {
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
        };
        let limit = Duration::from_secs(self.config.wait_selector_timeout_secs);
        if tokio::time::timeout(limit, poll).await.is_err() {
            debug!(selector, "Selector did not appear, continuing");
        }
    }
}

async fn open_session(browser: &Browser) -> Result<Session, RenderError> {
    let context_id = browser
        .execute(CreateBrowserContextParams::default())
        .await
        .map_err(|e| RenderError::Browser(format!("Failed to create browser context: {}", e)))?
        .result
        .browser_context_id;

    let target = CreateTargetParams::builder()
        .url("about:blank")
        .browser_context_id(context_id.clone())
        .build()
        .map_err(RenderError::Browser)?;
    match browser.new_page(target).await {
        Ok(page) => Ok(Session { page, context_id }),
        Err(e) => {
            let _ = browser
                .execute(DisposeBrowserContextParams::new(context_id))
                .await;
            Err(RenderError::Browser(format!("Failed to open page: {}", e)))
        }
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    #[instrument(skip(self))]
    async fn render_html(&self, id: &str, options: RenderOptions) -> Result<String, RenderError> {
        let session = self.acquire().await?;
        let page = &session.page;
        let result = match self.open_profile(page, id, options).await {
            Ok(()) => page
                .content()
                .await
                .map_err(|e| RenderError::Browser(format!("Failed to get content: {}", e))),
            Err(e) => Err(e),
        };
        self.release(session).await;
        result
    }

    #[instrument(skip(self))]
    async fn screenshot(&self, id: &str, options: RenderOptions) -> Result<Vec<u8>, RenderError> {
        let session = self.acquire().await?;
        let page = &session.page;
        let result = match self.open_profile(page, id, options).await {
            Ok(()) => page
                .screenshot(
                    ScreenshotParams::builder()
                        .format(CaptureScreenshotFormat::Png)
                        .full_page(false)
                        .build(),
                )
                .await
                .map_err(|e| RenderError::Browser(format!("Screenshot failed: {}", e))),
            Err(e) => Err(e),
        };
        self.release(session).await;
        result
    }

    async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if let Some(mut s) = state.take() {
            if let Err(e) = s.browser.close().await {
                warn!(error = %e, "Browser did not close cleanly");
            }
            s.handler_handle.abort();
            info!("Browser stopped");
        }
    }
}
