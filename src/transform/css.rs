//! `url(...)` rewriting inside CSS text.
//!
//! Used for both inline `style` attributes and `<style>` block contents.
//! Only absolute `http(s)` references are touched; anything else, including
//! the surrounding whitespace and quoting, is emitted exactly as found.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::rewrite::{is_absolute_http, Proxifier};

lazy_static! {
    /// `url(...)` with double, single, `&quot;`-entity or no quoting.
    static ref CSS_URL: Regex = Regex::new(
        r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|&quot;(.*?)&quot;|([^'")\s]+))\s*\)"#
    )
    .unwrap();
}

/// Rewrite every absolute `url(...)` reference in `css` through `proxifier`.
pub fn rewrite_css_urls(css: &str, proxifier: &Proxifier) -> String {
    if !contains_ignore_case(css, "url(") {
        return css.to_string();
    }

    CSS_URL
        .replace_all(css, |caps: &Captures| {
            let (quote, target) = if let Some(m) = caps.get(1) {
                ("\"", m.as_str())
            } else if let Some(m) = caps.get(2) {
                ("'", m.as_str())
            } else if let Some(m) = caps.get(3) {
                ("&quot;", m.as_str())
            } else if let Some(m) = caps.get(4) {
                ("", m.as_str())
            } else {
                return caps[0].to_string();
            };

            if !is_absolute_http(target) {
                return caps[0].to_string();
            }
            let rewritten = proxifier.proxify(target);
            if rewritten == target {
                return caps[0].to_string();
            }
            format!("url({quote}{rewritten}{quote})")
        })
        .into_owned()
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_ascii_lowercase().contains(needle)
}
