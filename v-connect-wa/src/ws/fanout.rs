use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::server::VConnectWaServer;

/// 订阅管理器事件并推送给全部实时客户端，同时投递 Webhook
/// Subscribe to manager events and push them to every realtime client, dispatching webhooks too
pub fn spawn_fanout_task(
    server: VConnectWaServer,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let mut events = server.manager.subscribe();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                res = events.recv() => res,
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() { break; }
                    continue;
                }
            };
            match event {
                Ok(event) => {
                    for frame in event.to_frames() {
                        match server.broadcast_frame(&frame) {
                            Ok(n) => debug!(
                                instance_id = %event.instance_id,
                                frame = %frame.frame_type,
                                delivered = n,
                                "realtime frame pushed"
                            ),
                            Err(e) => warn!("failed to push realtime frame: {}", e),
                        }
                    }
                    crate::service::webhook::send_webhook_event(&server, &event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "realtime fan-out lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        info!("realtime fan-out stopped");
    })
}
