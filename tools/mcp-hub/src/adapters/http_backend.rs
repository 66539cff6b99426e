use async_trait::async_trait;
use reqwest::Url;

use crate::app::discovery::{DiscoveryBackend, DiscoveryError};
use crate::infra::config::AppConfig;
use crate::shared::{
    types::{DiscoveryRequest, DiscoveryResponse},
    utils::truncate_for_log,
};

const BODY_LOG_LIMIT: usize = 200;

/// Posts discovery requests to the hub backend over HTTP.
#[derive(Clone)]
pub struct HttpDiscoveryBackend {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpDiscoveryBackend {
    pub fn new(endpoint: Url) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self::new(config.discovery_endpoint()?))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl DiscoveryBackend for HttpDiscoveryBackend {
    async fn discover(
        &self,
        request: &DiscoveryRequest,
    ) -> Result<DiscoveryResponse, DiscoveryError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|err| DiscoveryError::TransportFailure(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| DiscoveryError::TransportFailure(err.to_string()))?;
        if !status.is_success() {
            return Err(DiscoveryError::TransportFailure(format!(
                "backend answered {}: {}",
                status,
                truncate_for_log(&body, BODY_LOG_LIMIT)
            )));
        }
        serde_json::from_str::<DiscoveryResponse>(&body).map_err(|err| {
            tracing::debug!(body = %truncate_for_log(&body, BODY_LOG_LIMIT), "undecodable discovery body");
            DiscoveryError::MalformedResponse(err.to_string())
        })
    }
}
