//! HTTP 服务
//!
//! 提供 `/api/get-config` 与 `/health`，供浏览器端在建立 PeerConnection 前获取 TURN 凭据。

pub mod config_api;
pub mod trace;

pub use config_api::{ConfigApiState, extract_turn_server, router};

use crate::error::{Error, Result};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};
use turnprobe_common::config::ServeConfig;

/// 绑定地址并运行，直到收到 Ctrl-C
pub async fn serve(config: &ServeConfig, bind_addr: &str) -> Result<()> {
    let state = ConfigApiState::from_env(config);
    match state.turn_server() {
        Ok(server) => info!("TURN configuration ready: {}", server.urls.join(", ")),
        Err(reason) if config.fallback_server.is_some() => {
            info!("{}; requests will receive the fallback server", reason)
        }
        Err(reason) => error!("{}; requests will receive 503", reason),
    }

    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| Error::service_startup(format!("Failed to bind to '{bind_addr}': {e}")))?;
    let local_addr = listener.local_addr()?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    setup_ctrl_c_handler(shutdown_tx.clone());
    let mut shutdown_rx = shutdown_tx.subscribe();

    info!("📡 Config API listening on http://{}", local_addr);
    info!("  - http://{}/api/get-config", local_addr);
    info!("  - http://{}/health", local_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Config API received shutdown signal");
        })
        .await?;

    info!("🛑 Config API stopped");
    Ok(())
}

fn setup_ctrl_c_handler(shutdown_tx: broadcast::Sender<()>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("Received Ctrl-C, shutting down gracefully...");
        let _ = shutdown_tx.send(());
    });
}
