use anyhow::{Context, Result};
use mcp_hub::{
    adapters::server::{HubState, router},
    app::inspector_service::InspectorService,
    infra::config::AppConfig,
};
use tokio::{net::TcpListener, signal};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = AppConfig::load().context("load configuration")?;
    let listen_addr = config.listen_addr()?;
    let discovery_path = config.discovery_path();
    let inspector = InspectorService::new(config.handshake_timeout()?);
    if config.metrics_auth_token.is_none() {
        tracing::warn!("METRICS_AUTH_TOKEN not set; /metrics is unauthenticated");
    }
    let app = router(
        HubState::new(inspector),
        &discovery_path,
        config.metrics_auth_token.clone(),
    );

    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("bind {listen_addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, %discovery_path, "mcp hub backend listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .context("serve http")?;
    Ok(())
}
