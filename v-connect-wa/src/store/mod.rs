//! 凭据存储 / Credential store
//!
//! 每个实例一个目录：`<root>/<instance_id>/creds.json`；
//! `registered=true` 是启动时判断可恢复的唯一依据。
//! One directory per instance: `<root>/<instance_id>/creds.json`;
//! `registered=true` is the only signal used to decide restorability at startup.

mod file;
mod memory;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 凭据记录（密钥材料对本服务不透明）/ Credential record (key material is opaque to us)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct CredentialRecord {
    /// 配对握手至少完成过一次 / Pairing handshake completed at least once
    #[serde(default)]
    pub registered: bool,
    /// 实例显示名 / Instance display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// 协议层序列化的密钥材料 / Key material serialized by the protocol layer
    #[serde(default)]
    pub keys: serde_json::Value,
}

impl CredentialRecord {
    pub fn is_restorable(&self) -> bool {
        self.registered
    }
}

/// 存储扩展trait，便于测试替换 / Store trait, swappable with an in-memory fake
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 读取凭据；不存在时返回 None / Load credentials, None if absent
    async fn load(&self, instance_id: &str) -> Result<Option<CredentialRecord>>;
    async fn save(&self, instance_id: &str, record: &CredentialRecord) -> Result<()>;
    /// 删除实例全部凭据 / Remove all credentials of an instance
    async fn remove(&self, instance_id: &str) -> Result<()>;
    /// 列出所有 registered=true 的实例ID / List every instance id with registered=true
    async fn list_registered(&self) -> Result<Vec<String>>;
}
