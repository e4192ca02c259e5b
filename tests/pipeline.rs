//! End-to-end properties of the HTML transform pipeline.

use profile_lens::script::MARKER_ATTR;
use profile_lens::{Pipeline, Proxifier};

const PROXY_BASE: &str = "http://localhost:5000";

fn pipeline() -> Pipeline {
    Pipeline::new(Proxifier::new(PROXY_BASE).unwrap())
}

#[test]
fn test_end_to_end_scenario() {
    let out = pipeline().transform(
        r#"<head></head><body><img src="http://x.com/p.jpg"></body>"#,
        "http://x.com/u/",
    );

    assert!(out.starts_with(r#"<head><base href="http://x.com/u/"></head>"#), "{out}");
    assert!(out.contains(
        r#"<img src="http://localhost:5000/proxy?url=http%3A%2F%2Fx.com%2Fp.jpg">"#
    ));

    let marker = format!("<script {MARKER_ATTR}=");
    let script_at = out.find(&marker).expect("script injected");
    let script_end = out[script_at..].find("</script>").unwrap() + script_at + "</script>".len();
    assert_eq!(&out[script_end..], "</body>");
}

#[test]
fn test_double_application_keeps_single_injections() {
    let p = pipeline();
    let html = r#"<html><head><title>p</title></head><body><img srcset="http://e.com/a.jpg 1x, http://e.com/b.jpg 2x"></body></html>"#;

    let once = p.transform(html, "http://e.com/u/");
    let twice = p.transform(&once, "http://e.com/u/");

    for doc in [&once, &twice] {
        assert_eq!(doc.matches("<base ").count(), 1);
        assert_eq!(doc.matches(MARKER_ATTR).count(), 1);
    }
    assert_eq!(once, twice);
}

#[test]
fn test_origin_base_tag_is_preceded_by_ours() {
    let p = pipeline();
    let html = r#"<html><head><base href="/"><link rel="stylesheet" href="/app.css"></head><body></body></html>"#;
    let base = "https://www.instagram.com/nasa/";

    let once = p.transform(html, base);
    let twice = p.transform(&once, base);

    let ours = r#"<base href="https://www.instagram.com/nasa/">"#;
    for doc in [&once, &twice] {
        assert!(doc.starts_with(&format!("<html><head>{ours}<base href=\"/\">")), "{doc}");
        assert_eq!(doc.matches(ours).count(), 1);
        assert_eq!(doc.matches(&format!("<script {MARKER_ATTR}=")).count(), 1);
    }
}

#[test]
fn test_tag_strings_inside_inline_script_do_not_block_injection() {
    let html = concat!(
        r#"<head><script>var t = "<base target=_top>"; var m = "data-profile-lens";</script></head>"#,
        "<body></body>"
    );
    let out = pipeline().transform(html, "http://x.com/u/");

    assert!(out.starts_with(r#"<head><base href="http://x.com/u/"><script>"#), "{out}");
    assert_eq!(out.matches(&format!("<script {MARKER_ATTR}=")).count(), 1);
}

#[test]
fn test_srcset_in_document() {
    let out = pipeline().transform(
        r#"<img srcset="http://e.com/a.jpg 1x, http://e.com/b.jpg 2x">"#,
        "http://e.com/",
    );
    assert_eq!(
        out,
        r#"<img srcset="http://localhost:5000/proxy?url=http%3A%2F%2Fe.com%2Fa.jpg 1x, http://localhost:5000/proxy?url=http%3A%2F%2Fe.com%2Fb.jpg 2x">"#
    );
}

#[test]
fn test_entity_ampersands_in_attribute() {
    let out = pipeline().transform(
        r#"<img src="https://cdn.e.com/p.jpg?stp=a&amp;oh=b">"#,
        "https://e.com/",
    );
    assert!(out.contains("p.jpg%3Fstp%3Da%26oh%3Db"), "{out}");
    assert!(!out.contains("&amp;"));
    assert!(!out.contains("%26amp"));
}

#[test]
fn test_all_resource_kinds_rewritten() {
    let html = concat!(
        "<html><head>",
        r#"<link rel="preload" href="https://static.e.com/app.css">"#,
        r#"<script src="https://static.e.com/app.js"></script>"#,
        "<style>.hero{background:url('https://static.e.com/hero.jpg')}</style>",
        "</head><body>",
        r#"<div style="background-image: url(&quot;https://cdn.e.com/bg.jpg&quot;)"></div>"#,
        r#"<img data-src="https://cdn.e.com/lazy.jpg" src="/placeholder.gif">"#,
        r#"<a href="https://e.com/explore/">explore</a>"#,
        "</body></html>"
    );
    let out = pipeline().transform(html, "https://e.com/u/");

    for encoded in [
        "https%3A%2F%2Fstatic.e.com%2Fapp.css",
        "https%3A%2F%2Fstatic.e.com%2Fapp.js",
        "https%3A%2F%2Fstatic.e.com%2Fhero.jpg",
        "https%3A%2F%2Fcdn.e.com%2Fbg.jpg",
        "https%3A%2F%2Fcdn.e.com%2Flazy.jpg",
    ] {
        assert!(
            out.contains(&format!("{PROXY_BASE}/proxy?url={encoded}")),
            "missing {encoded} in {out}"
        );
    }
    // Relative resources resolve through <base>; links are left for navigation.
    assert!(out.contains(r#"src="/placeholder.gif""#));
    assert!(out.contains(r#"<a href="https://e.com/explore/">"#));
}

#[test]
fn test_document_without_anchors_or_urls_is_unchanged() {
    let html = "<div><p>Nothing to do here &mdash; really.</p><img src=\"a.png\"></div>";
    assert_eq!(pipeline().transform(html, "http://x.com/"), html);
}

#[test]
fn test_malformed_markup_passes_through() {
    let p = pipeline();
    let html = "<body><img src=\"http://x.com/a.jpg\" <div unclosed <p>text";
    let out = p.transform(html, "http://x.com/");
    // No </body> and no <head>: nothing injected, nothing panics.
    assert!(!out.contains(MARKER_ATTR));
    assert!(!out.contains("<base"));
}
