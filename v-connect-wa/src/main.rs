use actix_web::{web, App, HttpServer};
use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use v::{ConfigManager, ConfigSource};

use v_connect_wa::config::{self, AppConfig};
use v_connect_wa::protocol::BridgeConnector;
use v_connect_wa::server::VConnectWaServer;
use v_connect_wa::session::InstanceManager;
use v_connect_wa::store::FileCredentialStore;
use v_connect_wa::{router, tasks, ws};

/// 命令行参数 / Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "v-connect-wa session manager (HTTP + WebSocket)", long_about = None)]
pub struct Args {
    /// 额外配置文件，覆盖 config/default.toml
    /// Extra config file layered over config/default.toml
    #[arg(short = 'c', long = "config")]
    config: Option<String>,
}

async fn start_http_server(server: VConnectWaServer, host: String, port: u16) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    info!("🌐 HTTP control API listening on http://{}", addr);
    HttpServer::new(move || {
        App::new()
            .wrap(
                actix_web::middleware::DefaultHeaders::new()
                    .add(("Access-Control-Allow-Origin", "*"))
                    .add(("Access-Control-Allow-Headers", "*"))
                    .add(("Access-Control-Allow-Methods", "GET, POST, DELETE, OPTIONS")),
            )
            .app_data(web::Data::new(server.clone()))
            .configure(router::configure)
    })
    .disable_signals()
    .bind(addr)?
    .run()
    .await?;
    Ok(())
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let extra = args
        .config
        .iter()
        .map(|path| ConfigSource::File {
            path: path.clone(),
            format: None,
            required: true,
        })
        .collect();
    let cm = v::install_global_config_manager(ConfigManager::with_sources(extra)?)?;
    let sources: Vec<String> = cm
        .active_sources()
        .iter()
        .map(|s| format!("{}:{}", s.source_type, s.description))
        .collect();
    let cfg = config::load()?;
    v::init_tracing(&cfg.server.log_level)?;
    info!(sources = ?sources, "🔧 configuration loaded");
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = load_config(&args)?;

    info!("🎯 Starting v-connect-wa session manager...");

    let store = Arc::new(FileCredentialStore::new(&cfg.session.credentials_dir));
    let connector = Arc::new(BridgeConnector::new(
        cfg.protocol.bridge_url.clone(),
        Duration::from_millis(cfg.protocol.request_timeout_ms),
    ));
    info!(bridge = %cfg.protocol.bridge_url, credentials = %cfg.session.credentials_dir, "protocol bridge configured");

    let manager = Arc::new(InstanceManager::new(
        connector,
        store,
        cfg.session.clone(),
        cfg.cache.clone(),
        cfg.realtime.event_buffer,
    ));

    // Webhook配置 / Webhook configuration
    let mut server = VConnectWaServer::new(manager.clone());
    if cfg.webhook.enabled && cfg.webhook.url.is_some() {
        info!(
            url = ?cfg.webhook.url,
            timeout_ms = cfg.webhook.timeout_ms,
            signed = cfg.webhook.secret.is_some(),
            "📡 webhook enabled"
        );
        server = server.with_webhook_config(cfg.webhook.clone());
    } else {
        info!("📡 webhook disabled");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    // 先订阅再恢复，恢复期间的事件不会丢失 / Subscribe before restoring so no startup event is missed
    let fanout = ws::fanout::spawn_fanout_task(server.clone(), shutdown_rx.clone());
    let cleanup = tasks::heartbeat::spawn_cleanup_task(
        server.clone(),
        cfg.realtime.client_timeout_ms,
        shutdown_rx.clone(),
    );

    if cfg.session.restore_on_start {
        let restored = manager.restore_all().await;
        info!(count = restored.len(), "♻️ saved sessions restored");
    }

    let ws_server = server.clone();
    let ws_host = cfg.server.host.clone();
    let ws_port = cfg.server.ws_port;
    let ws_future = async move {
        if let Err(e) = ws_server.run(ws_host, ws_port).await {
            error!("❌ realtime server error: {}", e);
        }
    };
    let http_future = start_http_server(server.clone(), cfg.server.host.clone(), cfg.server.http_port);

    tokio::select! {
        _ = ws_future => warn!("realtime server stopped"),
        res = http_future => {
            if let Err(e) = res {
                error!("❌ HTTP server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
    }

    manager.shutdown().await;
    shutdown_tx.send_replace(true);
    let _ = fanout.await;
    let _ = cleanup.await;

    info!("✅ Server shutdown successfully");
    Ok(())
}
