//! 会话管理：每个实例一个连接actor，由管理器统一注册与转发事件
//! Session management: one connection actor per instance, registered and relayed by the manager

pub mod connection;
pub mod manager;
pub mod normalize;
pub mod qr;

pub use connection::InstanceConnection;
pub use manager::InstanceManager;

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::{CacheConfig, SessionConfig};
use crate::domain::ManagerEvent;
use crate::protocol::ProtocolConnector;
use crate::store::CredentialStore;

/// 实例注册表 / Instance registry
pub type Registry = Arc<DashMap<String, Arc<InstanceConnection>>>;

/// 连接与管理器共享的依赖 / Dependencies shared by the manager and its connections
#[derive(Clone)]
pub struct SessionContext {
    pub connector: Arc<dyn ProtocolConnector>,
    pub store: Arc<dyn CredentialStore>,
    pub events: broadcast::Sender<ManagerEvent>,
    pub registry: Registry,
    pub session: SessionConfig,
    pub cache: CacheConfig,
}
