use async_trait::async_trait;
use reqwest::{StatusCode, Url};

use crate::app::repository::{RepositoryError, ServerRecord, ServerRepository};
use crate::infra::config::AppConfig;
use crate::shared::utils::{join_under, truncate_for_log};

const COLLECTION_PATH: &str = "api/mcp-servers";

/// Server records behind the hub's REST API.
#[derive(Clone)]
pub struct HttpServerRepository {
    client: reqwest::Client,
    base: Url,
}

impl HttpServerRepository {
    pub fn new(base: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base,
        }
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self::new(config.persistence_url()?))
    }

    fn collection_url(&self) -> Result<Url, RepositoryError> {
        join_under(&self.base, COLLECTION_PATH)
            .map_err(|err| RepositoryError::Transport(format!("{err:#}")))
    }

    fn record_url(&self, server_id: &str) -> Result<Url, RepositoryError> {
        let mut url = self.collection_url()?;
        url.path_segments_mut()
            .map_err(|_| RepositoryError::Transport(format!("'{}' cannot be a base", self.base)))?
            .push(server_id);
        Ok(url)
    }

    async fn decode(
        response: reqwest::Response,
        server_id: Option<&str>,
    ) -> Result<ServerRecord, RepositoryError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RepositoryError::NotFound(
                server_id.unwrap_or_default().to_string(),
            ));
        }
        let body = response
            .text()
            .await
            .map_err(|err| RepositoryError::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(RepositoryError::Transport(format!(
                "persistence answered {}: {}",
                status,
                truncate_for_log(&body, 200)
            )));
        }
        serde_json::from_str(&body).map_err(|err| RepositoryError::Decode(err.to_string()))
    }
}

#[async_trait]
impl ServerRepository for HttpServerRepository {
    async fn fetch(&self, server_id: &str) -> Result<ServerRecord, RepositoryError> {
        let response = self
            .client
            .get(self.record_url(server_id)?)
            .send()
            .await
            .map_err(|err| RepositoryError::Transport(err.to_string()))?;
        Self::decode(response, Some(server_id)).await
    }

    async fn create(&self, record: &ServerRecord) -> Result<ServerRecord, RepositoryError> {
        let response = self
            .client
            .post(self.collection_url()?)
            .json(record)
            .send()
            .await
            .map_err(|err| RepositoryError::Transport(err.to_string()))?;
        Self::decode(response, None).await
    }

    async fn update(&self, record: &ServerRecord) -> Result<ServerRecord, RepositoryError> {
        let server_id = record
            .id
            .as_deref()
            .ok_or_else(|| RepositoryError::NotFound(String::new()))?;
        let response = self
            .client
            .put(self.record_url(server_id)?)
            .json(record)
            .send()
            .await
            .map_err(|err| RepositoryError::Transport(err.to_string()))?;
        Self::decode(response, Some(server_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_urls_escape_ids() {
        let repo = HttpServerRepository::new(Url::parse("http://hub.local:3000").unwrap());
        assert_eq!(
            repo.collection_url().unwrap().as_str(),
            "http://hub.local:3000/api/mcp-servers"
        );
        assert_eq!(
            repo.record_url("a b/c").unwrap().as_str(),
            "http://hub.local:3000/api/mcp-servers/a%20b%2Fc"
        );
    }

    #[test]
    fn records_live_under_a_prefixed_base() {
        let repo = HttpServerRepository::new(Url::parse("https://example.org/hub").unwrap());
        assert_eq!(
            repo.record_url("7").unwrap().as_str(),
            "https://example.org/hub/api/mcp-servers/7"
        );
    }
}
