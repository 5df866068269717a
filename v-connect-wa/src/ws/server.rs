use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::server::VConnectWaServer;

/// 启动WS监听 / Start WS listener
impl VConnectWaServer {
    pub async fn run(&self, host: String, port: u16) -> Result<()> {
        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr).await?;
        info!("🚀 v-connect-wa realtime channel listening on {}", addr);
        self.serve(listener).await
    }

    /// 在已绑定的监听器上接受连接 / Accept connections on a bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        while let Ok((stream, peer_addr)) = listener.accept().await {
            let server = self.clone();
            tokio::spawn(async move {
                if let Err(e) = crate::ws::connection::handle_connection(stream, peer_addr, server).await {
                    error!("Connection error from {}: {}", peer_addr, e);
                }
            });
        }
        Ok(())
    }
}
