//! TURN 中继分配探测
//!
//! 通过 `turn` 客户端向 TURN 服务器发起 Allocate，成功即说明服务器可达、
//! 凭据有效且能分配中继地址。比 ICE 收集更直接地定位 TURN 侧问题。

pub mod error;

pub use error::{Result, TurnError};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use turn_crate::client::{Client, ClientConfig};
use webrtc_util::Conn;

/// 单个 TURN 探测目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnTarget {
    /// `host:port`
    pub server: String,
    pub username: String,
    pub credential: String,
    /// 为空时由服务器 401 响应中的 REALM 决定
    pub realm: String,
}

impl TurnTarget {
    pub fn new(
        server: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            username: username.into(),
            credential: credential.into(),
            realm: String::new(),
        }
    }
}

/// 分配探测结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationReport {
    pub server: String,
    /// TURN 服务器分配的中继地址
    pub relayed_address: SocketAddr,
    /// 服务器看到的本端地址（Binding 响应），部分服务器不响应时为 None
    pub mapped_address: Option<SocketAddr>,
    pub duration: Duration,
}

/// 释放分配（lifetime = 0 的 Refresh）最多等待的时间
const RELEASE_TIMEOUT: Duration = Duration::from_secs(2);

/// 对 `target` 执行一次完整的 Allocate 并立即释放
///
/// 无论成功、失败还是超时，客户端都会被关闭。
pub async fn probe_allocation(target: &TurnTarget, timeout: Duration) -> Result<AllocationReport> {
    if target.username.is_empty() || target.credential.is_empty() {
        return Err(TurnError::InvalidCredentials {
            details: format!("{} requires username and credential", target.server),
        });
    }

    let started = Instant::now();
    let deadline = started + timeout;
    let timed_out = || TurnError::Timeout {
        server: target.server.clone(),
        duration_ms: timeout.as_millis() as u64,
    };

    // listen() 之前没有后台任务，超时丢弃这个 future 不会泄漏
    let client = tokio::time::timeout_at(deadline, connect(target))
        .await
        .map_err(|_| timed_out())??;

    let outcome = match tokio::time::timeout_at(deadline, allocate(&client, target, started)).await
    {
        Ok(result) => result,
        Err(_) => Err(timed_out()),
    };

    if let Err(e) = client.close().await {
        warn!("Failed to close TURN client for {}: {}", target.server, e);
    }

    if let Ok(report) = &outcome {
        info!(
            "TURN allocation on {} succeeded: relayed={} mapped={:?} in {:?}",
            report.server, report.relayed_address, report.mapped_address, report.duration
        );
    }
    outcome
}

async fn connect(target: &TurnTarget) -> Result<Client> {
    let setup_failed = |reason: String| TurnError::ClientSetupFailed {
        server: target.server.clone(),
        reason,
    };

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    debug!(
        "TURN probe socket bound on {:?} for {}",
        socket.local_addr(),
        target.server
    );

    let client = Client::new(ClientConfig {
        stun_serv_addr: target.server.clone(),
        turn_serv_addr: target.server.clone(),
        username: target.username.clone(),
        password: target.credential.clone(),
        realm: target.realm.clone(),
        software: String::new(),
        rto_in_ms: 0,
        conn: Arc::new(socket),
        vnet: None,
    })
    .await
    .map_err(|e| setup_failed(e.to_string()))?;

    client
        .listen()
        .await
        .map_err(|e| setup_failed(e.to_string()))?;

    Ok(client)
}

async fn allocate(client: &Client, target: &TurnTarget, started: Instant) -> Result<AllocationReport> {
    let relay_conn = client
        .allocate()
        .await
        .map_err(|e| TurnError::AllocationFailed {
            server: target.server.clone(),
            reason: e.to_string(),
        })?;

    let relayed_address = relay_conn.local_addr().map_err(|e| TurnError::AllocationFailed {
        server: target.server.clone(),
        reason: format!("relay connection has no address: {e}"),
    });

    let mapped_address = match &relayed_address {
        Ok(_) => match client.send_binding_request().await {
            Ok(addr) => Some(addr),
            Err(e) => {
                debug!("Binding request via {} failed: {}", target.server, e);
                None
            }
        },
        Err(_) => None,
    };

    match tokio::time::timeout(RELEASE_TIMEOUT, relay_conn.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to release allocation on {}: {}", target.server, e),
        Err(_) => warn!("Releasing allocation on {} timed out", target.server),
    }

    Ok(AllocationReport {
        server: target.server.clone(),
        relayed_address: relayed_address?,
        mapped_address,
        duration: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_credentials_rejected_before_network() {
        let target = TurnTarget::new("127.0.0.1:3478", "", "secret");
        let err = probe_allocation(&target, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::InvalidCredentials { .. }));
    }
}
