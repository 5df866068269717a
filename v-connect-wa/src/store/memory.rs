use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

use super::{CredentialRecord, CredentialStore};

/// 内存凭据存储（测试与临时运行）/ In-memory credential store (tests and ephemeral runs)
#[derive(Default)]
pub struct MemoryCredentialStore {
    records: DashMap<String, CredentialRecord>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self, instance_id: &str) -> Result<Option<CredentialRecord>> {
        Ok(self.records.get(instance_id).map(|r| r.value().clone()))
    }

    async fn save(&self, instance_id: &str, record: &CredentialRecord) -> Result<()> {
        self.records.insert(instance_id.to_string(), record.clone());
        Ok(())
    }

    async fn remove(&self, instance_id: &str) -> Result<()> {
        self.records.remove(instance_id);
        Ok(())
    }

    async fn list_registered(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self
            .records
            .iter()
            .filter(|entry| entry.value().is_restorable())
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}
