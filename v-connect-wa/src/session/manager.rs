use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use super::{InstanceConnection, SessionContext};
use crate::config::{CacheConfig, SessionConfig};
use crate::domain::{jid, ContactInfo, GroupMetadata, Instance, ManagerEvent, PictureTier};
use crate::error::{ManagerError, ManagerResult};
use crate::protocol::ProtocolConnector;
use crate::store::{CredentialRecord, CredentialStore};

/// 实例管理器：注册表、生命周期与事件转发
/// Instance manager: registry, lifecycle and event relay
pub struct InstanceManager {
    ctx: SessionContext,
}

impl InstanceManager {
    pub fn new(
        connector: Arc<dyn ProtocolConnector>,
        store: Arc<dyn CredentialStore>,
        session: SessionConfig,
        cache: CacheConfig,
        event_buffer: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(16));
        Self {
            ctx: SessionContext {
                connector,
                store,
                events,
                registry: Arc::new(DashMap::new()),
                session,
                cache,
            },
        }
    }

    /// 订阅全部实例事件 / Subscribe to events of every instance
    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.ctx.events.subscribe()
    }

    fn new_instance_id() -> String {
        format!("inst_{}", Uuid::new_v4().simple())
    }

    /// 创建新实例并开始配对 / Create a new instance and start pairing
    pub async fn create(&self, name: Option<String>) -> ManagerResult<Instance> {
        let id = Self::new_instance_id();
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| id.clone());
        self.start(id, name, None).await
    }

    /// 用已注册凭据恢复实例 / Restore an instance from registered credentials
    pub async fn restore(&self, id: &str) -> ManagerResult<Instance> {
        if self.ctx.registry.contains_key(id) {
            return Err(ManagerError::AlreadyExists(id.to_string()));
        }
        let record = match self.ctx.store.load(id).await? {
            Some(r) if r.is_restorable() => r,
            _ => return Err(ManagerError::NotFound(id.to_string())),
        };
        let name = record
            .label
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| id.to_string());
        self.start(id.to_string(), name, Some(record)).await
    }

    async fn start(
        &self,
        id: String,
        name: String,
        credentials: Option<CredentialRecord>,
    ) -> ManagerResult<Instance> {
        if self.ctx.registry.contains_key(&id) {
            return Err(ManagerError::AlreadyExists(id));
        }
        let (conn, events) = InstanceConnection::open(self.ctx.clone(), id.clone(), name, credentials)
            .await
            .map_err(|source| ManagerError::Handshake {
                instance_id: id.clone(),
                source,
            })?;

        let inserted = match self.ctx.registry.entry(id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(conn.clone());
                true
            }
        };
        if !inserted {
            conn.stop().await;
            return Err(ManagerError::AlreadyExists(id));
        }
        conn.spawn(events);
        info!(instance_id = %id, "instance started");
        Ok(conn.snapshot())
    }

    /// 启动时顺序恢复全部已注册实例；单个失败只记录
    /// Restore every registered instance sequentially at startup; one failure is only logged
    pub async fn restore_all(&self) -> Vec<Instance> {
        let ids = match self.ctx.store.list_registered().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "failed to scan credential store");
                return Vec::new();
            }
        };
        let mut restored = Vec::new();
        for id in ids {
            if self.ctx.registry.contains_key(&id) {
                continue;
            }
            match self.restore(&id).await {
                Ok(instance) => restored.push(instance),
                Err(e) => warn!(instance_id = %id, error = %e, "restore failed, skipping"),
            }
        }
        info!(count = restored.len(), "startup restoration finished");
        restored
    }

    /// 注销并移除；未知ID返回 false / Log out and remove; false for an unknown id
    pub async fn delete(&self, id: &str) -> bool {
        let conn = match self.ctx.registry.remove(id) {
            Some((_, conn)) => conn,
            None => return false,
        };
        conn.logout().await;
        if let Err(e) = self.ctx.store.remove(id).await {
            warn!(instance_id = %id, error = %e, "failed to remove credentials");
        }
        info!(instance_id = %id, "instance deleted");
        true
    }

    /// 未连接或发送失败返回 false / false when not connected or the send fails
    pub async fn send_message(&self, id: &str, to: &str, text: &str) -> ManagerResult<bool> {
        if to.trim().is_empty() {
            return Err(ManagerError::MissingField("to"));
        }
        if text.trim().is_empty() {
            return Err(ManagerError::MissingField("message"));
        }
        let target = jid::to_send_target(to)
            .ok_or_else(|| ManagerError::InvalidRequest(format!("invalid recipient: {}", to)))?;
        if jid::is_filtered(&target) {
            return Err(ManagerError::InvalidRequest(
                "group and broadcast recipients are not supported".to_string(),
            ));
        }
        let conn = match self.connection(id) {
            Some(c) => c,
            None => return Ok(false),
        };
        Ok(conn.send_text(&target, text).await)
    }

    fn connection(&self, id: &str) -> Option<Arc<InstanceConnection>> {
        self.ctx.registry.get(id).map(|c| c.value().clone())
    }

    fn require(&self, id: &str) -> ManagerResult<Arc<InstanceConnection>> {
        self.connection(id)
            .ok_or_else(|| ManagerError::NotFound(id.to_string()))
    }

    pub fn list_all(&self) -> Vec<Instance> {
        let mut all: Vec<Instance> = self
            .ctx
            .registry
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn get(&self, id: &str) -> Option<Instance> {
        self.connection(id).map(|c| c.snapshot())
    }

    pub fn len(&self) -> usize {
        self.ctx.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ctx.registry.is_empty()
    }

    pub async fn saved_sessions(&self) -> ManagerResult<Vec<String>> {
        Ok(self.ctx.store.list_registered().await?)
    }

    pub async fn profile_picture(
        &self,
        id: &str,
        target: &str,
        tier: PictureTier,
    ) -> ManagerResult<Option<String>> {
        let conn = self.require(id)?;
        let target = Self::party(target)?;
        Ok(conn.profile_picture(&target, tier).await)
    }

    pub async fn profile_pictures(
        &self,
        id: &str,
        targets: &[String],
        tier: PictureTier,
    ) -> ManagerResult<BTreeMap<String, Option<String>>> {
        let conn = self.require(id)?;
        let mut normalized = Vec::with_capacity(targets.len());
        for t in targets {
            let party = Self::party(t)?;
            if !normalized.contains(&party) {
                normalized.push(party);
            }
        }
        Ok(conn.profile_pictures(&normalized, tier).await)
    }

    pub async fn group_metadata(&self, id: &str, group_jid: &str) -> ManagerResult<GroupMetadata> {
        let conn = self.require(id)?;
        Ok(conn.group_metadata(&jid::normalize(group_jid)).await?)
    }

    pub async fn contact_info(&self, id: &str, target: &str) -> ManagerResult<Option<ContactInfo>> {
        let conn = self.require(id)?;
        let target = Self::party(target)?;
        Ok(conn.contact_info(&target).await?)
    }

    fn party(raw: &str) -> ManagerResult<String> {
        jid::to_send_target(raw)
            .ok_or_else(|| ManagerError::InvalidRequest(format!("invalid jid: {}", raw)))
    }

    /// 停止全部连接但保留凭据，重启后可恢复
    /// Stop every connection but keep credentials so they restore after restart
    pub async fn shutdown(&self) {
        let conns: Vec<Arc<InstanceConnection>> = self
            .ctx
            .registry
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.ctx.registry.clear();
        for conn in conns {
            conn.stop().await;
        }
        info!("all instances stopped");
    }
}
