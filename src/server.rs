//! HTTP surface.
//!
//! - `GET /api/profile/:id[?mobile=true]` → transformed profile HTML
//! - `GET /api/profile/:id/screenshot[?mobile=true]` → PNG
//! - `GET /proxy?url=...` → proxied resource
//! - `GET /api/health` → liveness
//! - `GET /metrics` → Prometheus text
//!
//! Every failure is turned into a response here.

use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::config::{OriginConfig, ProxyConfig};
use crate::metrics;
use crate::proxy::{self, ResourceFetcher};
use crate::render::{RenderQuery, Renderer};
use crate::transform::Pipeline;
use crate::validation::validate_username;

/// Everything request handlers need, owned by the process.
pub struct AppState {
    pub pipeline: Pipeline,
    pub renderer: Arc<dyn Renderer>,
    pub fetcher: Arc<dyn ResourceFetcher>,
    pub origin: OriginConfig,
    pub proxy: ProxyConfig,
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

fn json_error(status: StatusCode, error: &str, message: String) -> Response {
    let body = ErrorBody {
        error: error.to_string(),
        message,
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

fn with_state(
    state: SharedState,
) -> impl Filter<Extract = (SharedState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// All routes, with permissive CORS.
pub fn routes(
    state: SharedState,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path!("api" / "health").and(warp::get()).map(|| {
        warp::reply::json(&json!({ "status": "ok", "message": "Server is running" }))
    });

    let profile = warp::path!("api" / "profile" / String)
        .and(warp::get())
        .and(warp::query::<RenderQuery>())
        .and(with_state(state.clone()))
        .and_then(profile_html);

    let screenshot = warp::path!("api" / "profile" / String / "screenshot")
        .and(warp::get())
        .and(warp::query::<RenderQuery>())
        .and(with_state(state.clone()))
        .and_then(profile_screenshot);

    let proxy = warp::path!("proxy")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state(state))
        .and_then(proxy_handler);

    let metrics = warp::path!("metrics").and(warp::get()).map(|| match metrics::gather_text() {
        Ok(text) => warp::reply::with_status(text, StatusCode::OK),
        Err(e) => {
            error!(error = %e, "Error encoding metrics");
            warp::reply::with_status(
                "Error encoding metrics".to_string(),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        }
    });

    let cors = warp::cors().allow_any_origin().allow_methods(vec!["GET"]);

    health
        .or(profile)
        .or(screenshot)
        .or(proxy)
        .or(metrics)
        .with(cors)
}

async fn profile_html(
    id: String,
    query: RenderQuery,
    state: SharedState,
) -> Result<Response, Infallible> {
    if let Err(e) = validate_username(&id) {
        return Ok(json_error(StatusCode::BAD_REQUEST, "Invalid username", e.to_string()));
    }
    let options = query.options();
    info!(id = %id, mobile = options.mobile, "Fetching profile");

    let result = {
        let _timer = metrics::RenderTimer::new("html");
        state.renderer.render_html(&id, options).await
    };
    metrics::record_render("html", result.is_ok());

    match result {
        Ok(html) => {
            let base_url = state.origin.profile_url(&id);
            let document = state.pipeline.transform(&html, &base_url);
            Ok(warp::reply::html(document).into_response())
        }
        Err(e) => {
            error!(id = %id, error = %e, "Error fetching profile");
            Ok(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch profile",
                e.to_string(),
            ))
        }
    }
}

async fn profile_screenshot(
    id: String,
    query: RenderQuery,
    state: SharedState,
) -> Result<Response, Infallible> {
    if let Err(e) = validate_username(&id) {
        return Ok(json_error(StatusCode::BAD_REQUEST, "Invalid username", e.to_string()));
    }
    let options = query.options();
    info!(id = %id, mobile = options.mobile, "Taking screenshot");

    let result = {
        let _timer = metrics::RenderTimer::new("screenshot");
        state.renderer.screenshot(&id, options).await
    };
    metrics::record_render("screenshot", result.is_ok());

    match result {
        Ok(png) => Ok(warp::reply::with_header(png, "content-type", "image/png").into_response()),
        Err(e) => {
            error!(id = %id, error = %e, "Error taking screenshot");
            Ok(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to take screenshot",
                e.to_string(),
            ))
        }
    }
}

async fn proxy_handler(
    params: HashMap<String, String>,
    state: SharedState,
) -> Result<Response, Infallible> {
    Ok(proxy::proxy_resource(state.fetcher.as_ref(), &params, &state.proxy).await)
}

/// Serve until `shutdown` resolves. Returns the bound address once the
/// server has stopped.
pub async fn serve(
    state: SharedState,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<SocketAddr> {
    let (bound, server) =
        warp::serve(routes(state)).try_bind_with_graceful_shutdown(addr, shutdown)?;

    info!("Profile server running on http://{}", bound);
    info!("  - GET /api/profile/:id");
    info!("  - GET /api/profile/:id/screenshot");
    info!("  - GET /proxy?url=<absolute url>");
    info!("  - GET /api/health");

    server.await;
    Ok(bound)
}
