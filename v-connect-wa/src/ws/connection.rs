use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::domain::RealtimeFrame;
use crate::server::{Client, VConnectWaServer};

/// 处理新连接：注册、下发快照、读循环 / Handle a new connection: register, send snapshot, read loop
pub async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    server: VConnectWaServer,
) -> Result<()> {
    debug!("📨 New realtime connection from: {}", peer_addr);

    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let client_id = Uuid::new_v4().to_string();

    let client_id_clone = client_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let is_close = matches!(&msg, Message::Close(_));
            if let Err(e) = ws_sender.send(msg).await {
                error!("Failed to send frame to {}: {}", client_id_clone, e);
                break;
            }
            if is_close {
                let _ = ws_sender.close().await;
                break;
            }
        }
    });

    let client = Client {
        client_id: client_id.clone(),
        addr: peer_addr,
        sender: tx,
        last_heartbeat: Arc::new(Mutex::new(Instant::now())),
    };
    server.clients.insert(client_id.clone(), client);
    info!("✅ Realtime client {} connected from {}", client_id, peer_addr);

    // 新客户端先收到当前全部实例 / New clients first receive every current instance
    let snapshot = RealtimeFrame::snapshot(&server.manager.list_all());
    server.send_frame_to_client(&client_id, &snapshot)?;

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Ok(message) => {
                if let Err(e) = crate::ws::handler::dispatch(&server, message, &client_id) {
                    error!("Error handling frame from {}: {}", client_id, e);
                }
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", client_id, e);
                break;
            }
        }
    }

    server.clients.remove(&client_id);
    send_task.abort();
    info!("👋 Realtime client {} disconnected", client_id);
    Ok(())
}
