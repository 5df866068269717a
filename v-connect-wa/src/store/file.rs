use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{CredentialRecord, CredentialStore};

const CREDS_FILE: &str = "creds.json";

/// 基于文件系统的凭据存储 / Filesystem-backed credential store
pub struct FileCredentialStore {
    root: PathBuf,
}

impl FileCredentialStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn instance_dir(&self, instance_id: &str) -> Result<PathBuf> {
        // 实例ID直接作为目录名，拒绝路径穿越 / Ids become dir names; reject traversal
        if instance_id.is_empty()
            || !instance_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            anyhow::bail!("invalid instance id for credential store: {:?}", instance_id);
        }
        Ok(self.root.join(instance_id))
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self, instance_id: &str) -> Result<Option<CredentialRecord>> {
        // 非法ID从未被写入过 / Invalid ids can never have been written
        let path = match self.instance_dir(instance_id) {
            Ok(dir) => dir.join(CREDS_FILE),
            Err(e) => {
                debug!(instance_id, error = %e, "no credentials for invalid id");
                return Ok(None);
            }
        };
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
        };
        let record = serde_json::from_slice(&raw)
            .with_context(|| format!("corrupt credentials at {}", path.display()))?;
        Ok(Some(record))
    }

    async fn save(&self, instance_id: &str, record: &CredentialRecord) -> Result<()> {
        let dir = self.instance_dir(instance_id)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create {}", dir.display()))?;
        let body = serde_json::to_vec_pretty(record)?;
        // 先写临时文件再改名，避免半写入 / Write then rename so readers never see a torn file
        let tmp = dir.join(format!("{}.tmp", CREDS_FILE));
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, dir.join(CREDS_FILE)).await?;
        debug!(instance_id, "credentials saved");
        Ok(())
    }

    async fn remove(&self, instance_id: &str) -> Result<()> {
        let dir = self.instance_dir(instance_id)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", dir.display())),
        }
    }

    async fn list_registered(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("scan {}", self.root.display())),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let id = entry.file_name().to_string_lossy().to_string();
            match self.load(&id).await {
                Ok(Some(record)) if record.is_restorable() => ids.push(id),
                Ok(Some(_)) => debug!(instance_id = %id, "skipping unregistered credentials"),
                Ok(None) => debug!(instance_id = %id, "skipping directory without credentials"),
                Err(e) => warn!(instance_id = %id, error = %e, "skipping unreadable credentials"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}
