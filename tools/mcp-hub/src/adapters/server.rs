use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use std::sync::Arc;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::app::inspector_service::{InspectorService, Listing, TargetProtocol};
use crate::infra::metrics::{PendingGaugeGuard, metrics_router, record_discovery};
use crate::shared::{
    types::{DiscoveryRequest, DiscoveryResponse},
    utils::measure_latency,
};

#[derive(Clone)]
pub struct HubState {
    inspector: Arc<InspectorService>,
}

impl HubState {
    pub fn new(inspector: InspectorService) -> Self {
        Self {
            inspector: Arc::new(inspector),
        }
    }
}

/// Discovery endpoint plus `/healthz` and `/metrics`.
pub fn router(state: HubState, discovery_path: &str, metrics_token: Option<String>) -> Router {
    Router::new()
        .route(discovery_path, post(discover_handler))
        .route("/healthz", get(healthz))
        .with_state(state)
        .merge(metrics_router(metrics_token))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn discover_handler(
    State(state): State<HubState>,
    Json(request): Json<DiscoveryRequest>,
) -> Json<DiscoveryResponse> {
    let request_id = Uuid::new_v4();
    let span = info_span!("discover", %request_id, protocol = %request.protocol);
    Json(run_discovery(&state.inspector, request).instrument(span).await)
}

async fn run_discovery(inspector: &InspectorService, request: DiscoveryRequest) -> DiscoveryResponse {
    let protocol_label = TargetProtocol::parse(&request.protocol)
        .map(|p| p.as_str())
        .unwrap_or("unknown");
    let _inflight = PendingGaugeGuard::new();

    match measure_latency(|| inspector.discover(&request)).await {
        Ok((listing, latency_ms)) => {
            let outcome = if listing.tools.is_empty() { "empty" } else { "ok" };
            record_discovery(protocol_label, outcome, Some(latency_ms));
            info!(
                tools = listing.tools.len(),
                prompts = listing.prompts.len(),
                resources = listing.resources.len(),
                latency_ms,
                "discovery finished"
            );
            into_response(listing)
        }
        Err(err) => {
            record_discovery(protocol_label, "error", None);
            warn!(error = %format!("{err:#}"), "discovery failed");
            DiscoveryResponse::failure(format!("{err:#}"))
        }
    }
}

fn into_response(listing: Listing) -> DiscoveryResponse {
    DiscoveryResponse {
        success: true,
        tools: Some(listing.tools),
        prompts: Some(listing.prompts),
        resources: Some(listing.resources),
        message: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_protocol_is_reported_not_raised() {
        let inspector = InspectorService::default();
        let response = run_discovery(
            &inspector,
            DiscoveryRequest {
                protocol: "carrier-pigeon".into(),
                ..DiscoveryRequest::default()
            },
        )
        .await;
        assert!(!response.success);
        assert!(response.tools.is_none());
        assert!(
            response
                .message
                .as_deref()
                .is_some_and(|m| m.contains("carrier-pigeon"))
        );
    }

    #[tokio::test]
    async fn stdio_without_command_fails_cleanly() {
        let inspector = InspectorService::default();
        let response = run_discovery(
            &inspector,
            DiscoveryRequest {
                protocol: "stdio".into(),
                command: Some("   ".into()),
                ..DiscoveryRequest::default()
            },
        )
        .await;
        assert!(!response.success);
        assert!(
            response
                .message
                .as_deref()
                .is_some_and(|m| m.contains("command is required"))
        );
    }
}
