use anyhow::Result;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::domain::RealtimeFrame;
use crate::server::VConnectWaServer;

/// 处理客户端帧（ping / snapshot）/ Handle client frames (ping / snapshot)
pub fn dispatch(server: &VConnectWaServer, message: Message, client_id: &str) -> Result<()> {
    let text = match message {
        Message::Text(text) => text,
        Message::Ping(_) | Message::Pong(_) => {
            server.update_heartbeat(client_id);
            return Ok(());
        }
        _ => return Ok(()),
    };
    debug!("📨 Received text from {}: {}", client_id, text);
    let frame = match serde_json::from_str::<RealtimeFrame>(&text) {
        Ok(frame) => frame,
        Err(_) => {
            let err = RealtimeFrame::new("error", serde_json::json!({ "message": "invalid json" }));
            return server.send_frame_to_client(client_id, &err);
        }
    };
    match frame.frame_type.as_str() {
        "ping" => {
            debug!("🏓 Ping from {}", client_id);
            server.update_heartbeat(client_id);
            let pong = RealtimeFrame::new(
                "pong",
                serde_json::json!({ "timestamp": chrono::Utc::now().timestamp_millis() }),
            );
            server.send_frame_to_client(client_id, &pong)?;
        }
        "snapshot" => {
            let snapshot = RealtimeFrame::snapshot(&server.manager.list_all());
            server.send_frame_to_client(client_id, &snapshot)?;
        }
        other => debug!("ignoring realtime frame type {} from {}", other, client_id),
    }
    Ok(())
}
