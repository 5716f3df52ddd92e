//! 针对本地 TURN 服务器的分配探测测试

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use turn::{TurnError, TurnTarget, probe_allocation};
use turn_crate::auth::{AuthHandler, generate_auth_key};
use turn_crate::relay::relay_range::RelayAddressGeneratorRanges;
use turn_crate::server::Server;
use turn_crate::server::config::{ConnConfig, ServerConfig};
use webrtc_util::vnet::net::Net;

const REALM: &str = "probe.test";

/// Static long-term credentials keyed by username
struct StaticAuth {
    keys: HashMap<String, Vec<u8>>,
}

impl StaticAuth {
    fn new(users: &[(&str, &str)]) -> Self {
        let keys = users
            .iter()
            .map(|(user, pass)| (user.to_string(), generate_auth_key(user, REALM, pass)))
            .collect();
        Self { keys }
    }
}

impl AuthHandler for StaticAuth {
    fn auth_handle(
        &self,
        username: &str,
        _realm: &str,
        _src_addr: SocketAddr,
    ) -> Result<Vec<u8>, turn_crate::Error> {
        self.keys
            .get(username)
            .cloned()
            .ok_or_else(|| turn_crate::Error::Other(format!("unknown user {username}")))
    }
}

async fn start_turn_server() -> anyhow::Result<(Server, SocketAddr)> {
    let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await?);
    let addr = socket.local_addr()?;

    let server = Server::new(ServerConfig {
        conn_configs: vec![ConnConfig {
            conn: socket,
            relay_addr_generator: Box::new(RelayAddressGeneratorRanges {
                relay_address: "127.0.0.1".parse()?,
                min_port: 49152,
                max_port: 65535,
                max_retries: 10,
                address: "127.0.0.1".to_string(),
                net: Arc::new(Net::new(None)),
            }),
        }],
        realm: REALM.to_string(),
        auth_handler: Arc::new(StaticAuth::new(&[("alice", "wonderland")])),
        channel_bind_timeout: Duration::from_secs(60),
        alloc_close_notify: None,
    })
    .await?;

    Ok((server, addr))
}

#[tokio::test]
async fn test_allocation_succeeds_with_valid_credentials() -> anyhow::Result<()> {
    let (server, addr) = start_turn_server().await?;

    let target = TurnTarget::new(addr.to_string(), "alice", "wonderland");
    let report = probe_allocation(&target, Duration::from_secs(5)).await?;

    assert_eq!(report.server, addr.to_string());
    assert!(report.relayed_address.ip().is_loopback());
    assert!(report.relayed_address.port() >= 49152);
    assert!(report.duration < Duration::from_secs(5));

    server.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_allocation_fails_with_wrong_password() -> anyhow::Result<()> {
    let (server, addr) = start_turn_server().await?;

    let target = TurnTarget::new(addr.to_string(), "alice", "looking-glass");
    let err = probe_allocation(&target, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            TurnError::AllocationFailed { .. } | TurnError::Timeout { .. }
        ),
        "unexpected error: {err}"
    );

    server.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_allocation_times_out_on_silent_server() -> anyhow::Result<()> {
    let silent = UdpSocket::bind("127.0.0.1:0").await?;
    let addr = silent.local_addr()?;

    let target = TurnTarget::new(addr.to_string(), "alice", "wonderland");
    let err = probe_allocation(&target, Duration::from_millis(500))
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            TurnError::Timeout { .. } | TurnError::AllocationFailed { .. }
        ),
        "unexpected error: {err}"
    );
    Ok(())
}

#[tokio::test]
async fn test_timed_out_probe_closes_client() -> anyhow::Result<()> {
    let silent = UdpSocket::bind("127.0.0.1:0").await?;
    let addr = silent.local_addr()?;
    let metrics = tokio::runtime::Handle::current().metrics();
    let baseline = metrics.num_alive_tasks();

    let target = TurnTarget::new(addr.to_string(), "alice", "wonderland");
    for _ in 0..3 {
        let err = probe_allocation(&target, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Timeout { .. }), "unexpected error: {err}");
    }

    // 客户端读循环在 close 之后退出
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while metrics.num_alive_tasks() > baseline && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(metrics.num_alive_tasks(), baseline);
    Ok(())
}
