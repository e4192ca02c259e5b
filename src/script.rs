//! Client-side interstitial removal and image repair.
//!
//! The script runs in the viewer's browser, not here, so it lives as a
//! versioned text asset. The only thing filled in at startup is the proxy
//! base URL its `proxify` helper rewrites to, which must agree with
//! [`crate::rewrite::Proxifier`].

/// Script source; `__PROXY_BASE__` is replaced with a JS string literal.
const TEMPLATE: &str = include_str!("assets/interstitial.js");

/// Bumped whenever the asset's behavior changes.
pub const SCRIPT_VERSION: &str = "1";

/// Attribute carried by the injected `<script>` tag; its presence means the
/// document has already been processed.
pub const MARKER_ATTR: &str = "data-profile-lens";

const PROXY_BASE_PLACEHOLDER: &str = "__PROXY_BASE__";
const VERSION_PLACEHOLDER: &str = "__SCRIPT_VERSION__";

/// The rendered `<script>` tag, ready to be spliced into a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectedScript {
    tag: String,
}

impl InjectedScript {
    pub fn new(proxy_base: &str) -> Self {
        let base = proxy_base.trim_end_matches('/');
        // serde_json produces a valid JS string literal; `</` is split so the
        // value can never close the surrounding tag.
        let literal = serde_json::to_string(base)
            .unwrap_or_else(|_| "\"\"".to_string())
            .replace("</", "<\\/");
        let source = TEMPLATE
            .replace(VERSION_PLACEHOLDER, &format!("\"{SCRIPT_VERSION}\""))
            .replace(PROXY_BASE_PLACEHOLDER, &literal);

        Self {
            tag: format!("<script {MARKER_ATTR}=\"{SCRIPT_VERSION}\">\n{source}</script>"),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.tag
    }
}
