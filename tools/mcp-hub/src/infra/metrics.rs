use axum::{
    Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
};
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, IntCounterVec, IntGauge, TextEncoder, register_histogram,
    register_int_counter_vec, register_int_gauge,
};
use tracing::error;

pub static DISCOVERY_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "discovery_latency_ms",
        "Time spent connecting to and listing a target MCP server in ms"
    )
    .unwrap()
});

pub static DISCOVERY_INFLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("discovery_inflight", "Discovery requests currently running").unwrap()
});

pub static DISCOVERY_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "discovery_requests_total",
        "Discovery requests by target protocol and outcome",
        &["protocol", "outcome"]
    )
    .unwrap()
});

pub struct PendingGaugeGuard;

impl PendingGaugeGuard {
    pub fn new() -> Self {
        DISCOVERY_INFLIGHT.inc();
        PendingGaugeGuard
    }
}

impl Default for PendingGaugeGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PendingGaugeGuard {
    fn drop(&mut self) {
        DISCOVERY_INFLIGHT.dec();
    }
}

pub fn record_discovery(protocol: &str, outcome: &str, latency_ms: Option<u64>) {
    DISCOVERY_OUTCOMES
        .with_label_values(&[protocol, outcome])
        .inc();
    if let Some(ms) = latency_ms {
        DISCOVERY_LATENCY.observe(ms as f64);
    }
}

#[derive(Clone)]
struct MetricsState {
    auth_token: Option<String>,
}

/// `GET /metrics`, optionally behind a bearer token.
pub fn metrics_router(auth_token: Option<String>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(MetricsState { auth_token })
}

async fn metrics_handler(
    State(state): State<MetricsState>,
    headers: HeaderMap,
) -> axum::response::Response {
    if let Some(token) = &state.auth_token {
        if !is_authorized(headers.get(http::header::AUTHORIZATION), token) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    let encoder = TextEncoder::new();
    let metrics = prometheus::gather();
    let mut buf = Vec::new();
    if let Err(err) = encoder.encode(&metrics, &mut buf) {
        error!(%err, "failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response();
    }

    let content_type = HeaderValue::from_str(encoder.format_type())
        .unwrap_or(HeaderValue::from_static("text/plain"));
    ([(http::header::CONTENT_TYPE, content_type)], buf).into_response()
}

fn is_authorized(header: Option<&HeaderValue>, token: &str) -> bool {
    match header.and_then(|value| value.to_str().ok()) {
        Some(value) => value
            .strip_prefix("Bearer ")
            .is_some_and(|presented| presented.trim() == token),
        None => false,
    }
}
