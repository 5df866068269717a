use anyhow::{anyhow, Result};
use std::borrow::Cow;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::domain::RealtimeFrame;
use crate::server::VConnectWaServer;

impl VConnectWaServer {
    /// 向指定客户端发送帧 / Send a frame to one client
    pub fn send_frame_to_client(&self, client_id: &str, frame: &RealtimeFrame) -> Result<()> {
        let text = serde_json::to_string(frame)?;
        match self.clients.get(client_id) {
            Some(client) => {
                client
                    .sender
                    .send(Message::Text(text))
                    .map_err(|e| anyhow!("Failed to send frame: {}", e))?;
                debug!("📤 Sent {} frame to client {}", frame.frame_type, client_id);
                Ok(())
            }
            None => {
                warn!("⚠️  Client {} not found for frame delivery", client_id);
                Err(anyhow!("Client {} not found", client_id))
            }
        }
    }

    /// 发送关闭帧 / Send close frame
    pub fn send_close_message(&self, client_id: &str, reason: &'static str) -> Result<()> {
        let client = self
            .clients
            .get(client_id)
            .ok_or_else(|| anyhow!("Client {} not found for close message", client_id))?;
        client
            .sender
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: Cow::Borrowed(reason),
            })))
            .map_err(|e| anyhow!("Failed to send close message: {}", e))?;
        debug!("🔒 Sent close message to client {}", client_id);
        Ok(())
    }

    /// 广播帧；发送失败的客户端被移除，返回送达数
    /// Broadcast a frame; clients that fail are removed; returns the delivered count
    pub fn broadcast_frame(&self, frame: &RealtimeFrame) -> Result<usize> {
        let text = serde_json::to_string(frame)?;
        let mut delivered = 0;
        let mut disconnected_clients = Vec::new();
        for entry in self.clients.iter() {
            if entry.value().sender.send(Message::Text(text.clone())).is_err() {
                disconnected_clients.push(entry.key().clone());
            } else {
                delivered += 1;
            }
        }
        for client_id in disconnected_clients {
            self.clients.remove(&client_id);
        }
        Ok(delivered)
    }
}
