use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info};

use crate::server::VConnectWaServer;

pub fn spawn_cleanup_task(
    server: VConnectWaServer,
    timeout_ms: u64,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let cleanup_interval_ms = if timeout_ms <= 1000 {
            (timeout_ms / 2).max(1)
        } else if timeout_ms <= 10000 {
            1000
        } else {
            5000
        };
        info!(
            "⏰ Cleanup interval set to {}ms for timeout {}ms",
            cleanup_interval_ms, timeout_ms
        );
        let mut cleanup_interval = interval(Duration::from_millis(cleanup_interval_ms));
        loop {
            tokio::select! {
                _ = cleanup_interval.tick() => {
                    server.cleanup_timeout_clients(timeout_ms);
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() { break; }
                }
            }
        }
    })
}

impl VConnectWaServer {
    /// 清理心跳超时的实时客户端 / Close realtime clients whose heartbeat timed out
    pub fn cleanup_timeout_clients(&self, timeout_ms: u64) -> usize {
        let stale: Vec<String> = self
            .clients
            .iter()
            .filter(|entry| entry.value().last_heartbeat.lock().elapsed().as_millis() > timeout_ms as u128)
            .map(|entry| entry.key().clone())
            .collect();
        for client_id in &stale {
            if let Err(e) = self.send_close_message(client_id, "heartbeat timeout") {
                error!("Failed to send close message to {}: {}", client_id, e);
            }
            self.clients.remove(client_id);
            info!("🧹 Cleaned up timed-out realtime client: {}", client_id);
        }
        stale.len()
    }
}
