use anyhow::{anyhow, Result};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, error};

use crate::config::WebhookConfigLite as WebhookConfig;
use crate::domain::{InstanceEvent, ManagerEvent};
use crate::server::VConnectWaServer;

pub const SIGNATURE_HEADER: &str = "X-VConnectWA-Signature";

/// Webhook 投递体 / Webhook delivery body
#[derive(Serialize, Debug, Clone)]
pub struct WebhookEvent<'a> {
    pub event_id: String,
    pub event_type: &'static str,
    pub instance_id: &'a str,
    pub timestamp: i64,
    pub data: &'a InstanceEvent,
}

/// 发送Webhook事件（后台投递，失败只记录）/ Send webhook event (background delivery, failures only logged)
pub fn send_webhook_event(server: &VConnectWaServer, event: &ManagerEvent) {
    let webhook_config = match &server.webhook_config {
        Some(cfg) if cfg.enabled && cfg.url.is_some() => cfg.clone(),
        _ => return,
    };
    let body = WebhookEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        event_type: event.event.name(),
        instance_id: &event.instance_id,
        timestamp: chrono::Utc::now().timestamp_millis(),
        data: &event.event,
    };
    let payload = match serde_json::to_string(&body) {
        Ok(p) => p,
        Err(e) => {
            error!("❌ Failed to serialize webhook event: {}", e);
            return;
        }
    };
    let client = server.http.clone();
    let event_id = body.event_id.clone();
    tokio::spawn(async move {
        if let Err(e) = deliver_webhook_event(&client, &webhook_config, payload).await {
            error!("❌ Failed to deliver webhook event {}: {}", event_id, e);
        }
    });
}

/// 交付Webhook事件到第三方服务器 / Deliver webhook event to a third-party server
pub async fn deliver_webhook_event(
    client: &reqwest::Client,
    webhook_config: &WebhookConfig,
    payload: String,
) -> Result<()> {
    let url = match &webhook_config.url {
        Some(url) => url,
        None => return Ok(()),
    };
    let mut request = client
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, "application/json");
    if let Some(secret) = &webhook_config.secret {
        request = request.header(SIGNATURE_HEADER, generate_webhook_signature(&payload, secret)?);
    }
    let response = request
        .body(payload)
        .send()
        .await
        .map_err(|e| anyhow!("Webhook request failed: {}", e))?;
    if response.status().is_success() {
        debug!("✅ Webhook delivered to {}", url);
        Ok(())
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(anyhow!("Webhook delivery failed with status {}: {}", status, body))
    }
}

/// 生成Webhook签名：对请求体做 HMAC-SHA256 / Generate webhook signature: HMAC-SHA256 over the body
pub fn generate_webhook_signature(payload: &str, secret: &str) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow!("invalid webhook secret: {}", e))?;
    mac.update(payload.as_bytes());
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_stable_hex() {
        let a = generate_webhook_signature(r#"{"event_type":"qr"}"#, "s3cret").unwrap();
        let b = generate_webhook_signature(r#"{"event_type":"qr"}"#, "s3cret").unwrap();
        let c = generate_webhook_signature(r#"{"event_type":"qr"}"#, "other").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("sha256="));
        assert_eq!(a.len(), "sha256=".len() + 64);
    }

    #[test]
    fn test_body_shape() {
        let event = ManagerEvent::new(
            "inst_a",
            InstanceEvent::Connected {
                phone_number: Some("5511".into()),
            },
        );
        let body = WebhookEvent {
            event_id: "e1".into(),
            event_type: event.event.name(),
            instance_id: &event.instance_id,
            timestamp: 0,
            data: &event.event,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["event_type"], "connected");
        assert_eq!(json["data"]["kind"], "connected");
        assert_eq!(json["data"]["phone_number"], "5511");
    }
}
