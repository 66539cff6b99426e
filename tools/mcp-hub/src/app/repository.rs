use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::tags::parse_tags;
use crate::domain::tool::Tool;

const TAGS_FIELD: &str = "tags";

/// A server record as the persistence API stores it. Only `tools` is
/// interpreted here; every other field is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ServerRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tools: Vec<Tool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServerRecord {
    /// Tags whichever way the record stores them: a JSON array, or a string
    /// holding a JSON array or a comma list.
    pub fn tags(&self) -> Vec<String> {
        match self.extra.get(TAGS_FIELD) {
            Some(Value::String(raw)) => parse_tags(raw).into_vec(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn set_tags(&mut self, tags: Vec<String>) {
        let tags = tags
            .into_iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .map(Value::String)
            .collect();
        self.extra.insert(TAGS_FIELD.to_string(), Value::Array(tags));
    }
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("server '{0}' not found")]
    NotFound(String),
    #[error("persistence request failed: {0}")]
    Transport(String),
    #[error("persistence response could not be decoded: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ServerRepository: Send + Sync {
    async fn fetch(&self, server_id: &str) -> Result<ServerRecord, RepositoryError>;
    async fn create(&self, record: &ServerRecord) -> Result<ServerRecord, RepositoryError>;
    async fn update(&self, record: &ServerRecord) -> Result<ServerRecord, RepositoryError>;
}
