//! Tag-aware attribute and `<style>` rewriting.
//!
//! Built on `lol_html`, which tokenizes the document properly (quoted,
//! unquoted and single-quoted attribute forms all come out the same) while
//! streaming every byte it does not touch straight through to the output.
//! Tags whose attribute value is left as-is are emitted verbatim. Non-strict
//! mode keeps the rewriter going through markup it cannot disambiguate.

use lol_html::html_content::ContentType;
use lol_html::{element, rewrite_str, text, RewriteStrSettings};
use tracing::warn;

use super::css::rewrite_css_urls;
use crate::rewrite::{is_absolute_http, Proxifier};

/// Rewrite `attr` on every element matching `selector`.
///
/// `rewrite` returns `None` to keep the current value. If the rewriter itself
/// fails the input is returned unchanged.
pub fn rewrite_attribute<F>(html: &str, selector: &str, attr: &str, rewrite: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let element_content_handlers = vec![element!(selector, |el| {
        let Some(value) = el.get_attribute(attr) else {
            return Ok(());
        };
        if let Some(updated) = rewrite(&value) {
            el.set_attribute(attr, &updated)?;
        }
        Ok(())
    })];

    let settings = RewriteStrSettings {
        element_content_handlers,
        strict: false,
        ..RewriteStrSettings::new()
    };
    match rewrite_str(html, settings) {
        Ok(out) => out,
        Err(e) => {
            warn!(selector, attr, error = %e, "Attribute rewrite failed, leaving document as-is");
            html.to_string()
        }
    }
}

/// Proxify an absolute URL attribute value; `None` if nothing changes.
pub fn proxify_value(value: &str, proxifier: &Proxifier) -> Option<String> {
    if !is_absolute_http(value) {
        return None;
    }
    let rewritten = proxifier.proxify(value);
    (rewritten != value).then_some(rewritten)
}

/// Rewrite a `srcset` value candidate by candidate.
///
/// Each comma-separated candidate is split at its last space into URL and
/// descriptor; only the URL is proxified. Separators, descriptors and
/// surrounding whitespace are kept byte-for-byte.
pub fn rewrite_srcset(value: &str, proxifier: &Proxifier) -> String {
    value
        .split(',')
        .map(|candidate| {
            let body = candidate.trim();
            if body.is_empty() {
                return candidate.to_string();
            }
            let lead_len = candidate.len() - candidate.trim_start().len();
            let (lead, rest) = candidate.split_at(lead_len);
            let trail = &rest[body.len()..];

            let (url, descriptor) = match body.rfind(' ') {
                Some(idx) => body.split_at(idx),
                None => (body, ""),
            };
            let url = match proxify_value(url, proxifier) {
                Some(rewritten) => rewritten,
                None => url.to_string(),
            };
            format!("{lead}{url}{descriptor}{trail}")
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Rewrite `url(...)` references inside every `<style>` block.
///
/// Text can arrive in several chunks; they are buffered until the last chunk
/// of the text node so a `url(` split across chunks is still seen whole.
pub fn rewrite_style_blocks(html: &str, proxifier: &Proxifier) -> String {
    let mut buffer = String::new();
    let mut split = false;

    let element_content_handlers = vec![text!("style", |chunk| {
        let piece = chunk.as_str().to_string();
        buffer.push_str(&piece);

        if !chunk.last_in_text_node() {
            split = true;
            chunk.remove();
            return Ok(());
        }

        let rewritten = rewrite_css_urls(&buffer, proxifier);
        if split || rewritten != buffer {
            chunk.replace(&rewritten, ContentType::Html);
        }
        buffer.clear();
        split = false;
        Ok(())
    })];

    let settings = RewriteStrSettings {
        element_content_handlers,
        strict: false,
        ..RewriteStrSettings::new()
    };
    match rewrite_str(html, settings) {
        Ok(out) => out,
        Err(e) => {
            warn!(error = %e, "Style block rewrite failed, leaving document as-is");
            html.to_string()
        }
    }
}
