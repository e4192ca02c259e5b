//! Anchor-based injection of the `<base>` tag and the client script.
//!
//! Both injections only happen when their anchor tag exists. Each is skipped
//! when the document already carries exactly what this module would insert,
//! so a document that went through the pipeline once comes back unchanged.
//! Markup the origin put there itself (its own `<base>`, a `<base` or
//! `data-profile-lens` string inside an inline script) does not count.

use lazy_static::lazy_static;
use regex::Regex;

use crate::script::{InjectedScript, MARKER_ATTR};

lazy_static! {
    static ref HEAD_OPEN: Regex = Regex::new(r"(?i)<head(?:\s[^>]*)?>").unwrap();
    static ref BODY_CLOSE: Regex = Regex::new(r"(?i)</body\s*>").unwrap();
    static ref SCRIPT_OPENER: String = format!("<script {MARKER_ATTR}=");
}

/// The `<base>` tag injected for `base_url`.
pub fn base_tag(base_url: &str) -> String {
    format!(r#"<base href="{}">"#, base_url.replace('"', "&quot;"))
}

/// Insert `<base href="{base_url}">` right after the opening `<head>` tag.
///
/// An origin `<base>` further down is left in place; the first one in the
/// document is the one browsers use.
pub fn inject_base(html: &str, base_url: &str) -> String {
    let tag = base_tag(base_url);
    if html.contains(&tag) {
        return html.to_string();
    }
    let Some(head) = HEAD_OPEN.find(html) else {
        return html.to_string();
    };

    let mut out = String::with_capacity(html.len() + tag.len());
    out.push_str(&html[..head.end()]);
    out.push_str(&tag);
    out.push_str(&html[head.end()..]);
    out
}

/// Insert the client script immediately before the last `</body>`.
pub fn inject_script(html: &str, script: &InjectedScript) -> String {
    if html.contains(SCRIPT_OPENER.as_str()) {
        return html.to_string();
    }
    let Some(body_close) = BODY_CLOSE.find_iter(html).last() else {
        return html.to_string();
    };

    let tag = script.as_str();
    let mut out = String::with_capacity(html.len() + tag.len());
    out.push_str(&html[..body_close.start()]);
    out.push_str(tag);
    out.push_str(&html[body_close.start()..]);
    out
}
