use async_trait::async_trait;
use v::{HealthCheck, HealthStatus};

use crate::domain::InstanceStatus;
use crate::server::VConnectWaServer;

// 为会话管理服务实现统一健康检查接口
// Implement unified HealthCheck for the session manager service
#[async_trait]
impl HealthCheck for VConnectWaServer {
    /// 实例数、已连接数、实时客户端数 / Instance count, connected count, realtime clients
    async fn check_health(&self) -> HealthStatus {
        let instances = self.manager.list_all();
        let connected = instances
            .iter()
            .filter(|i| i.status == InstanceStatus::Connected)
            .count();
        let webhook = self
            .webhook_config
            .as_ref()
            .map(|cfg| cfg.enabled)
            .unwrap_or(false);
        HealthStatus {
            component: "session_manager".to_string(),
            healthy: true,
            message: Some(format!(
                "instances={} connected={} realtime_clients={} webhook_enabled={}",
                instances.len(),
                connected,
                self.client_count(),
                webhook
            )),
            timestamp: chrono::Utc::now(),
        }
    }
}
