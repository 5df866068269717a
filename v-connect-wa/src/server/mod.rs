use dashmap::DashMap;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::Instant;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::config::WebhookConfigLite;
use crate::session::InstanceManager;

/// 实时通道客户端 / Realtime channel client
#[derive(Clone)]
pub struct Client {
    pub client_id: String,
    pub addr: SocketAddr,                                // 客户端地址 / Client address
    pub sender: mpsc::UnboundedSender<Message>,          // 消息发送器 / Message sender
    pub last_heartbeat: Arc<Mutex<Instant>>,             // 最后心跳时间 / Last heartbeat time
}

/// 服务端全局状态 / Server global state
#[derive(Clone)]
pub struct VConnectWaServer {
    pub manager: Arc<InstanceManager>,                   // 实例管理器 / Instance manager
    pub clients: Arc<DashMap<String, Client>>,           // 实时客户端 / Realtime clients
    pub webhook_config: Option<WebhookConfigLite>,       // Webhook配置 / Webhook configuration
    pub http: reqwest::Client,                           // Webhook HTTP 客户端 / Webhook HTTP client
}

impl VConnectWaServer {
    pub fn new(manager: Arc<InstanceManager>) -> Self {
        Self {
            manager,
            clients: Arc::new(DashMap::new()),
            webhook_config: None,
            http: reqwest::Client::new(),
        }
    }

    /// 配置Webhook / Configure webhook
    pub fn with_webhook_config(mut self, config: WebhookConfigLite) -> Self {
        if let Ok(client) = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()
        {
            self.http = client;
        }
        self.webhook_config = Some(config);
        self
    }

    /// 刷新心跳 / Refresh heartbeat
    pub fn update_heartbeat(&self, client_id: &str) {
        if let Some(client) = self.clients.get(client_id) {
            *client.last_heartbeat.lock() = Instant::now();
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}
