//! HTML transform pipeline.
//!
//! Takes the server-rendered profile HTML plus the URL it was rendered from
//! and produces a document whose absolute resources load through the local
//! proxy. The work is split into ordered [`Pass`]es; each one is a pure
//! `&str -> String` rewrite that leaves non-matching input untouched, so the
//! pipeline as a whole cannot fail.
//!
//! Later passes never re-match earlier output: replacement URLs point at the
//! proxy's own origin, which [`Proxifier::proxify`] always leaves alone.

pub mod attrs;
pub mod css;
pub mod inject;

use tracing::{debug, instrument};

use crate::rewrite::Proxifier;
use crate::script::InjectedScript;
use attrs::{proxify_value, rewrite_attribute, rewrite_srcset, rewrite_style_blocks};

/// One ordered rewrite step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    NormalizeEntities,
    SrcAttributes,
    SrcsetAttributes,
    InlineStyles,
    StyleBlocks,
    LinkHref,
    ScriptSrc,
    DataSrc,
    BaseTag,
    ClientScript,
}

impl Pass {
    /// Execution order. Base and script injection come last so nothing
    /// rewrites the injected markup.
    pub const ORDER: [Pass; 10] = [
        Pass::NormalizeEntities,
        Pass::SrcAttributes,
        Pass::SrcsetAttributes,
        Pass::InlineStyles,
        Pass::StyleBlocks,
        Pass::LinkHref,
        Pass::ScriptSrc,
        Pass::DataSrc,
        Pass::BaseTag,
        Pass::ClientScript,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::NormalizeEntities => "normalize_entities",
            Self::SrcAttributes => "src_attributes",
            Self::SrcsetAttributes => "srcset_attributes",
            Self::InlineStyles => "inline_styles",
            Self::StyleBlocks => "style_blocks",
            Self::LinkHref => "link_href",
            Self::ScriptSrc => "script_src",
            Self::DataSrc => "data_src",
            Self::BaseTag => "base_tag",
            Self::ClientScript => "client_script",
        }
    }
}

/// The configured pipeline: a proxifier plus the script tag it injects.
#[derive(Debug, Clone)]
pub struct Pipeline {
    proxifier: Proxifier,
    script: InjectedScript,
}

impl Pipeline {
    pub fn new(proxifier: Proxifier) -> Self {
        let script = InjectedScript::new(proxifier.base());
        Self { proxifier, script }
    }

    pub fn proxifier(&self) -> &Proxifier {
        &self.proxifier
    }

    /// Run every pass in [`Pass::ORDER`].
    #[instrument(skip(self, html), fields(input_len = html.len()))]
    pub fn transform(&self, html: &str, base_url: &str) -> String {
        let out = Pass::ORDER
            .iter()
            .fold(html.to_string(), |doc, pass| self.apply(*pass, &doc, base_url));
        debug!(output_len = out.len(), "Document transformed");
        out
    }

    /// Run a single pass.
    pub fn apply(&self, pass: Pass, html: &str, base_url: &str) -> String {
        let p = &self.proxifier;
        match pass {
            Pass::NormalizeEntities => html.replace("&amp;", "&"),
            Pass::SrcAttributes => rewrite_attribute(html, "[src]", "src", |v| proxify_value(v, p)),
            Pass::SrcsetAttributes => rewrite_attribute(html, "[srcset]", "srcset", |v| {
                let rewritten = rewrite_srcset(v, p);
                (rewritten != v).then_some(rewritten)
            }),
            Pass::InlineStyles => rewrite_attribute(html, "[style]", "style", |v| {
                let rewritten = css::rewrite_css_urls(v, p);
                (rewritten != v).then_some(rewritten)
            }),
            Pass::StyleBlocks => rewrite_style_blocks(html, p),
            Pass::LinkHref => {
                rewrite_attribute(html, "link[href]", "href", |v| proxify_value(v, p))
            }
            Pass::ScriptSrc => {
                rewrite_attribute(html, "script[src]", "src", |v| proxify_value(v, p))
            }
            Pass::DataSrc => {
                rewrite_attribute(html, "[data-src]", "data-src", |v| proxify_value(v, p))
            }
            Pass::BaseTag => inject::inject_base(html, base_url),
            Pass::ClientScript => inject::inject_script(html, &self.script),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> Pipeline {
        Pipeline::new(Proxifier::new("http://localhost:5000").unwrap())
    }

    #[test]
    fn test_order_is_complete_and_unique() {
        let names: Vec<_> = Pass::ORDER.iter().map(|p| p.name()).collect();
        let mut deduped = names.clone();
        deduped.dedup();
        assert_eq!(names.len(), 10);
        assert_eq!(names, deduped);
        assert_eq!(Pass::ORDER[0], Pass::NormalizeEntities);
        assert_eq!(Pass::ORDER[9], Pass::ClientScript);
    }

    #[test]
    fn test_normalize_entities_pass() {
        let out = pipeline().apply(Pass::NormalizeEntities, "a?x=1&amp;y=2", "");
        assert_eq!(out, "a?x=1&y=2");
    }

    #[test]
    fn test_link_and_script_passes() {
        let p = pipeline();
        let html = r#"<link rel="stylesheet" href="https://e.com/a.css"><a href="https://e.com/page">x</a><script src="https://e.com/a.js"></script>"#;
        let out = p.apply(Pass::LinkHref, html, "");
        assert!(out.contains(r#"href="http://localhost:5000/proxy?url=https%3A%2F%2Fe.com%2Fa.css""#));
        // Anchors are navigation, not resources.
        assert!(out.contains(r#"<a href="https://e.com/page">"#));

        let out = p.apply(Pass::ScriptSrc, &out, "");
        assert!(out.contains(r#"src="http://localhost:5000/proxy?url=https%3A%2F%2Fe.com%2Fa.js""#));
    }

    #[test]
    fn test_data_src_pass() {
        let out = pipeline().apply(
            Pass::DataSrc,
            r#"<img data-src="https://e.com/lazy.jpg" src="data:image/gif;base64,R0">"#,
            "",
        );
        assert!(out.contains(r#"data-src="http://localhost:5000/proxy?url=https%3A%2F%2Fe.com%2Flazy.jpg""#));
        assert!(out.contains(r#"src="data:image/gif;base64,R0""#));
    }

    #[test]
    fn test_inline_style_pass() {
        let out = pipeline().apply(
            Pass::InlineStyles,
            r#"<div style="background-image: url('https://e.com/bg.jpg')"></div>"#,
            "",
        );
        assert!(out.contains("http://localhost:5000/proxy?url=https%3A%2F%2Fe.com%2Fbg.jpg"));
    }

    #[test]
    fn test_no_anchor_no_urls_is_identity() {
        let html = "<div class=\"x\"><p>plain <b>text</b></p><img src=\"/a.png\"></div>";
        assert_eq!(pipeline().transform(html, "http://x.com/u/"), html);
    }

    #[test]
    fn test_passes_are_noops_on_empty_input() {
        let p = pipeline();
        for pass in Pass::ORDER {
            assert_eq!(p.apply(pass, "", "http://x.com/"), "", "{}", pass.name());
        }
    }
}
