//! The injected client script, exercised in a real headless browser.
//!
//! These need a local Chrome or Chromium and are ignored by default:
//! `cargo test --test interstitial -- --ignored`.

#![cfg(feature = "browser")]

use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;

use profile_lens::{Pipeline, Proxifier};

const PROXY_BASE: &str = "http://127.0.0.1:9";

fn proxifier() -> Proxifier {
    Proxifier::new(PROXY_BASE).unwrap()
}

async fn launch() -> (Browser, JoinHandle<()>) {
    let config = BrowserConfig::builder()
        .args(["--no-sandbox", "--disable-gpu", "--disable-dev-shm-usage"])
        .build()
        .unwrap();
    let (browser, mut handler) = Browser::launch(config).await.unwrap();
    let handle = tokio::spawn(async move { while handler.next().await.is_some() {} });
    (browser, handle)
}

/// Run `body` through the pipeline and load the result.
async fn open(browser: &Browser, body: &str) -> Page {
    let html = format!("<html><head></head>{body}</html>");
    let doc = Pipeline::new(proxifier()).transform(&html, "https://www.instagram.com/nasa/");
    let page = browser.new_page("about:blank").await.unwrap();
    page.goto(format!(
        "data:text/html;charset=utf-8,{}",
        urlencoding::encode(&doc)
    ))
    .await
    .unwrap();
    page
}

async fn eval<T: DeserializeOwned>(page: &Page, expression: &str) -> T {
    let params = EvaluateParams::builder()
        .expression(expression)
        .return_by_value(true)
        .build()
        .unwrap();
    page.evaluate_expression(params)
        .await
        .unwrap()
        .into_value()
        .unwrap()
}

async fn close(mut browser: Browser, handle: JoinHandle<()>) {
    let _ = browser.close().await;
    handle.abort();
}

#[tokio::test]
#[ignore = "needs a local Chrome or Chromium"]
async fn test_client_proxify_agrees_with_server() {
    let (browser, handle) = launch().await;
    let page = open(&browser, "<body><p>x</p></body>").await;

    let inputs = [
        "",
        "data:image/png;base64,AAA",
        "blob:abc",
        "/relative/path",
        "//cdn.e.com/a.js",
        "http://127.0.0.1:9/proxy?url=x",
        "https://e.com/a.jpg?x=1&amp;y=2",
        "HTTPS://E.COM/UP.PNG",
        "https://scontent.cdninstagram.com/v/t51.2885-19/p.jpg?stp=dst-jpg_s150x150&_nc_ht=x",
    ];
    let expression = format!(
        "{}.map(function (u) {{ return window.__profileLens.proxify(u); }})",
        serde_json::to_string(&inputs).unwrap()
    );
    let client: Vec<String> = eval(&page, &expression).await;

    let p = proxifier();
    let server: Vec<String> = inputs.iter().map(|u| p.proxify(u)).collect();
    assert_eq!(client, server);

    close(browser, handle).await;
}

#[tokio::test]
#[ignore = "needs a local Chrome or Chromium"]
async fn test_sweep_removes_interstitials_and_repairs_late_images() {
    let (browser, handle) = launch().await;
    let page = open(
        &browser,
        concat!(
            r#"<body style="overflow: hidden">"#,
            r#"<main><img id="avatar" src="https://scontent.cdninstagram.com/p.jpg"><p id="keep">Posts</p></main>"#,
            r#"<div role="dialog"><span>Sign up to see photos</span></div>"#,
            r#"<div id="prompt"><div><button>Log in</button></div></div>"#,
            "</body>"
        ),
    )
    .await;

    let state: Value = eval(
        &page,
        r#"(function () {
            var late = document.createElement('img');
            late.id = 'late';
            late.setAttribute('src', 'https://scontent-lhr8-1.cdninstagram.com/late.jpg');
            document.querySelector('main').appendChild(late);
            window.__profileLens.sweep();
            return {
                avatar: document.getElementById('avatar').getAttribute('src'),
                late: document.getElementById('late').getAttribute('src'),
                dialogs: document.querySelectorAll('[role="dialog"]').length,
                prompt: document.getElementById('prompt') !== null,
                keep: document.getElementById('keep') !== null,
                overflow: document.body.style.overflow
            };
        })()"#,
    )
    .await;

    let p = proxifier();
    assert_eq!(state["avatar"], p.proxify("https://scontent.cdninstagram.com/p.jpg"));
    assert_eq!(
        state["late"],
        p.proxify("https://scontent-lhr8-1.cdninstagram.com/late.jpg")
    );
    assert_eq!(state["dialogs"], 0);
    assert_eq!(state["prompt"], false);
    assert_eq!(state["keep"], true);
    assert_eq!(state["overflow"], "auto");

    close(browser, handle).await;
}

#[tokio::test]
#[ignore = "needs a local Chrome or Chromium"]
async fn test_repeated_sweeps_leave_dom_unchanged() {
    let (browser, handle) = launch().await;
    let page = open(
        &browser,
        concat!(
            "<body>",
            r#"<main><img src="https://scontent.cdninstagram.com/p.jpg" srcset="https://scontent.cdninstagram.com/p.jpg 1x, https://scontent.cdninstagram.com/p2.jpg 2x"></main>"#,
            r#"<div role="dialog">Log in</div>"#,
            r#"<section><div><a href="/accounts/login/">Log in</a></div></section>"#,
            "</body>"
        ),
    )
    .await;

    let snapshots: Vec<String> = eval(
        &page,
        r#"(function () {
            window.__profileLens.sweep();
            var first = document.documentElement.outerHTML;
            window.__profileLens.sweep();
            var second = document.documentElement.outerHTML;
            return [first, second];
        })()"#,
    )
    .await;

    assert_eq!(snapshots[0], snapshots[1]);
    assert!(!snapshots[0].contains(r#"<div role="dialog">"#));
    assert!(!snapshots[0].contains("accounts/login"));

    close(browser, handle).await;
}
