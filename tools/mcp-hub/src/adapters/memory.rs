use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::app::repository::{RepositoryError, ServerRecord, ServerRepository};

/// Process-local repository, used by the CLI when it works from a file and
/// by tests.
#[derive(Debug, Default)]
pub struct InMemoryServerRepository {
    records: RwLock<BTreeMap<String, ServerRecord>>,
}

impl InMemoryServerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, mut record: ServerRecord) -> String {
        let mut records = self.records.write();
        let id = record
            .id
            .clone()
            .unwrap_or_else(|| (records.len() + 1).to_string());
        record.id = Some(id.clone());
        records.insert(id.clone(), record);
        id
    }

    pub fn get(&self, server_id: &str) -> Option<ServerRecord> {
        self.records.read().get(server_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl ServerRepository for InMemoryServerRepository {
    async fn fetch(&self, server_id: &str) -> Result<ServerRecord, RepositoryError> {
        self.get(server_id)
            .ok_or_else(|| RepositoryError::NotFound(server_id.to_string()))
    }

    async fn create(&self, record: &ServerRecord) -> Result<ServerRecord, RepositoryError> {
        let mut record = record.clone();
        record.id = None;
        let id = self.insert(record);
        self.fetch(&id).await
    }

    async fn update(&self, record: &ServerRecord) -> Result<ServerRecord, RepositoryError> {
        let server_id = record
            .id
            .clone()
            .ok_or_else(|| RepositoryError::NotFound(String::new()))?;
        let mut records = self.records.write();
        let slot = records
            .get_mut(&server_id)
            .ok_or_else(|| RepositoryError::NotFound(server_id.clone()))?;
        *slot = record.clone();
        Ok(slot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tool::Tool;

    #[tokio::test]
    async fn create_then_update() {
        let repo = InMemoryServerRepository::new();
        let created = repo
            .create(&ServerRecord {
                name: "weather".into(),
                ..ServerRecord::default()
            })
            .await
            .unwrap();
        let mut record = created.clone();
        record.tools.push(Tool::new("forecast", ""));
        let updated = repo.update(&record).await.unwrap();
        assert_eq!(updated.tools.len(), 1);
        assert_eq!(repo.len(), 1);
        assert!(matches!(
            repo.fetch("missing").await,
            Err(RepositoryError::NotFound(_))
        ));
    }
}
