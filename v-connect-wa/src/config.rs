use anyhow::Result;
use v::ConfigManager;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    pub ws_port: u16,
    pub log_level: String,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// 凭据根目录 / Credential root directory
    pub credentials_dir: String,
    /// 非预期断开后的固定重连延迟 / Fixed reconnect delay after unexpected disconnects
    pub reconnect_delay_ms: u64,
    /// 二维码有效窗口 / QR validity window
    pub qr_ttl_ms: u64,
    /// 启动时自动恢复 / Restore registered sessions at startup
    pub restore_on_start: bool,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub group_ttl_ms: u64,
    pub profile_ttl_ms: u64,
    pub profile_batch_size: usize,
    pub message_capacity: usize,
    pub message_evict_batch: usize,
}

#[derive(Clone, Debug)]
pub struct RealtimeConfig {
    pub client_timeout_ms: u64,
    pub event_buffer: usize,
}

#[derive(Clone, Debug)]
pub struct ProtocolConfig {
    /// 协议侧车地址 / Protocol sidecar address
    pub bridge_url: String,
    pub request_timeout_ms: u64,
}

#[derive(Clone, Debug)]
pub struct WebhookConfigLite {
    pub enabled: bool,
    pub url: Option<String>,
    pub timeout_ms: u64,
    pub secret: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub cache: CacheConfig,
    pub realtime: RealtimeConfig,
    pub protocol: ProtocolConfig,
    pub webhook: WebhookConfigLite,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            credentials_dir: "data/sessions".to_string(),
            reconnect_delay_ms: 3_000,
            qr_ttl_ms: 60_000,
            restore_on_start: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            group_ttl_ms: 5 * 60 * 1000,
            profile_ttl_ms: 30 * 60 * 1000,
            profile_batch_size: 5,
            message_capacity: 5_000,
            message_evict_batch: 500,
        }
    }
}

pub fn load() -> Result<AppConfig> {
    let cm = v::get_global_config_manager()?;
    Ok(from_manager(&cm))
}

/// 从配置管理器读取，缺省项使用默认值 / Read from a manager, falling back to defaults
pub fn from_manager(cm: &ConfigManager) -> AppConfig {
    let session = SessionConfig::default();
    let cache = CacheConfig::default();
    AppConfig {
        server: ServerConfig {
            host: cm.get_or("server.host", "127.0.0.1".to_string()),
            http_port: cm.get_or("server.http_port", 8080_u16),
            ws_port: cm.get_or("server.ws_port", 5200_u16),
            log_level: cm.get_or("logging.level", "info".to_string()),
        },
        session: SessionConfig {
            credentials_dir: cm.get_or("session.credentials_dir", session.credentials_dir),
            reconnect_delay_ms: cm.get_or("session.reconnect_delay_ms", session.reconnect_delay_ms),
            qr_ttl_ms: cm.get_or("session.qr_ttl_ms", session.qr_ttl_ms),
            restore_on_start: cm.get_or("session.restore_on_start", session.restore_on_start),
        },
        cache: CacheConfig {
            group_ttl_ms: cm.get_or("cache.group_ttl_ms", cache.group_ttl_ms),
            profile_ttl_ms: cm.get_or("cache.profile_ttl_ms", cache.profile_ttl_ms),
            profile_batch_size: cm.get_or("cache.profile_batch_size", cache.profile_batch_size),
            message_capacity: cm.get_or("cache.message_capacity", cache.message_capacity),
            message_evict_batch: cm.get_or("cache.message_evict_batch", cache.message_evict_batch),
        },
        realtime: RealtimeConfig {
            client_timeout_ms: cm.get_or("realtime.client_timeout_ms", 60_000_u64),
            event_buffer: cm.get_or("realtime.event_buffer", 1024_usize),
        },
        protocol: ProtocolConfig {
            bridge_url: cm.get_or("protocol.bridge_url", "ws://127.0.0.1:5300".to_string()),
            request_timeout_ms: cm.get_or("protocol.request_timeout_ms", 15_000_u64),
        },
        webhook: WebhookConfigLite {
            enabled: cm.get_or("webhook.enabled", false),
            url: cm.get::<String>("webhook.url").ok(),
            timeout_ms: cm.get_or("webhook.timeout_ms", 3_000_u64),
            secret: cm.get::<String>("webhook.secret").ok(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use v::ConfigSource;

    #[test]
    fn test_defaults_when_empty() {
        let cm = ConfigManager::from_sources(vec![]).unwrap();
        let cfg = from_manager(&cm);
        assert_eq!(cfg.server.http_port, 8080);
        assert_eq!(cfg.session.reconnect_delay_ms, 3_000);
        assert_eq!(cfg.cache.message_capacity, 5_000);
        assert!(!cfg.webhook.enabled);
        assert!(cfg.webhook.url.is_none());
    }

    #[test]
    fn test_overrides_from_memory_source() {
        let mut values = std::collections::HashMap::new();
        values.insert("session.credentials_dir".to_string(), serde_json::json!("/tmp/creds"));
        values.insert("session.qr_ttl_ms".to_string(), serde_json::json!(20000));
        values.insert("cache.profile_batch_size".to_string(), serde_json::json!(2));
        let cm = ConfigManager::from_sources(vec![ConfigSource::Memory(values)]).unwrap();
        let cfg = from_manager(&cm);
        assert_eq!(cfg.session.credentials_dir, "/tmp/creds");
        assert_eq!(cfg.session.qr_ttl_ms, 20_000);
        assert_eq!(cfg.cache.profile_batch_size, 2);
    }
}
