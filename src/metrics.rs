//! Prometheus metrics for the profile server.
//!
//! - Proxy request outcomes
//! - Render request outcomes and durations

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Proxy requests by outcome
    pub static ref PROXY_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "profile_lens_proxy_requests_total",
        "Total number of resource proxy requests",
        &["result"]  // "ok", "upstream_status", "transport", "bad_request"
    )
    .unwrap();

    /// Render requests by kind and outcome
    pub static ref RENDER_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "profile_lens_render_requests_total",
        "Total number of profile render requests",
        &["kind", "result"]  // kind: "html" or "screenshot"
    )
    .unwrap();

    /// Render duration histogram
    pub static ref RENDER_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "profile_lens_render_duration_seconds",
        "Profile render duration in seconds",
        &["kind"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0]
    )
    .unwrap();
}

/// Encode all registered metrics in the Prometheus text format.
pub fn gather_text() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

pub fn record_proxy_request(result: &str) {
    PROXY_REQUESTS_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_render(kind: &str, success: bool) {
    let result = if success { "success" } else { "error" };
    RENDER_REQUESTS_TOTAL.with_label_values(&[kind, result]).inc();
}

/// Records render duration on drop.
pub struct RenderTimer {
    kind: &'static str,
    start: std::time::Instant,
}

impl RenderTimer {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for RenderTimer {
    fn drop(&mut self) {
        RENDER_DURATION_SECONDS
            .with_label_values(&[self.kind])
            .observe(self.start.elapsed().as_secs_f64());
    }
}
