//! STUN Binding 探测客户端
//!
//! 向 STUN 服务器发送 Binding Request，测量往返时延并读取服务器看到的映射地址。
//! 用于在不建立完整 PeerConnection 的情况下快速判断 STUN 服务器是否可用。

pub mod error;

// Re-export error types for convenience
pub use error::{Result, StunError};

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, trace};
use webrtc_stun::agent::TransactionId;
use webrtc_stun::message::{BINDING_REQUEST, BINDING_SUCCESS, Getter as _, Message};
use webrtc_stun::xoraddr::XorMappedAddress;

/// RFC 5389 建议的初始重传超时
const INITIAL_RTO: Duration = Duration::from_millis(500);

/// 单次 Binding 探测的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingResponse {
    /// 服务器观察到的本端地址（server-reflexive）
    pub mapped_address: SocketAddr,
    /// 从首次发送到收到成功响应的时间
    pub rtt: Duration,
    /// 实际发送的请求数（含重传）
    pub attempts: u32,
}

/// Checks if the given data could be a STUN message.
/// STUN messages (and TURN messages that are not ChannelData) have the first two bits as 00.
pub fn is_stun_message(data: &[u8]) -> bool {
    !data.is_empty() && (data[0] & 0xC0) == 0
}

/// 解析 `host:port` 为套接字地址，优先 IPv4
pub async fn resolve_server(host_port: &str) -> Result<SocketAddr> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host(host_port)
        .await
        .map_err(|_| StunError::AddressResolutionFailed {
            address: host_port.to_string(),
        })?
        .collect();

    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| StunError::AddressResolutionFailed {
            address: host_port.to_string(),
        })
}

/// 向 `server` 发送 Binding Request 并等待成功响应
///
/// 超时前按 500ms 起始、逐次翻倍的间隔重传。
pub async fn binding_request(server: SocketAddr, timeout: Duration) -> Result<BindingResponse> {
    let bind_addr: SocketAddr = if server.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };
    let socket = UdpSocket::bind(bind_addr).await?;
    binding_request_on(&socket, server, timeout).await
}

/// 在已有套接字上执行 Binding 探测
pub async fn binding_request_on(
    socket: &UdpSocket,
    server: SocketAddr,
    timeout: Duration,
) -> Result<BindingResponse> {
    let mut request = Message::new();
    request
        .build(&[Box::new(TransactionId::new()), Box::new(BINDING_REQUEST)])
        .map_err(|e| StunError::MessageEncodeFailed {
            reason: e.to_string(),
        })?;

    let started = Instant::now();
    let deadline = started + timeout;
    let mut rto = INITIAL_RTO;
    let mut attempts = 0u32;
    let mut buffer = vec![0u8; 1500];

    while Instant::now() < deadline {
        socket.send_to(&request.raw, server).await?;
        attempts += 1;
        debug!(%server, attempts, "Sent STUN binding request");

        let wait_until = (Instant::now() + rto).min(deadline);
        loop {
            let recv = tokio::time::timeout_at(wait_until, socket.recv_from(&mut buffer)).await;
            let Ok(received) = recv else {
                break;
            };
            let (len, from) = received?;

            if from != server || !is_stun_message(&buffer[..len]) {
                trace!(%from, len, "Ignoring unrelated datagram");
                continue;
            }

            let mut response = Message::new();
            if let Err(e) = response.write(&buffer[..len]) {
                debug!(%from, "Failed to parse STUN response: {}", e);
                continue;
            }
            if response.transaction_id != request.transaction_id {
                trace!(%from, "Ignoring STUN response for another transaction");
                continue;
            }

            return parse_binding_success(&response).map(|mapped_address| BindingResponse {
                mapped_address,
                rtt: started.elapsed(),
                attempts,
            });
        }

        rto *= 2;
    }

    Err(StunError::timeout(timeout.as_millis() as u64))
}

fn parse_binding_success(response: &Message) -> Result<SocketAddr> {
    if response.typ != BINDING_SUCCESS {
        return Err(StunError::UnexpectedResponse {
            message_type: response.typ.to_string(),
        });
    }

    let mut xor_addr = XorMappedAddress::default();
    xor_addr
        .get_from(response)
        .map_err(|e| StunError::MissingMappedAddress {
            reason: e.to_string(),
        })?;

    Ok(SocketAddr::new(xor_addr.ip, xor_addr.port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Minimal in-process STUN responder; drops the first `drop_first` requests.
    async fn spawn_responder(drop_first: u32) -> Result<(SocketAddr, Arc<AtomicU32>)> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let addr = socket.local_addr()?;
        let seen = Arc::new(AtomicU32::new(0));
        let seen_clone = seen.clone();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while let Ok((len, src)) = socket.recv_from(&mut buf).await {
                let count = seen_clone.fetch_add(1, Ordering::SeqCst) + 1;
                if count <= drop_first {
                    continue;
                }

                let mut request = Message::new();
                if request.write(&buf[..len]).is_err() || request.typ != BINDING_REQUEST {
                    continue;
                }

                let mut response = Message::new();
                response.set_type(BINDING_SUCCESS);
                response.transaction_id = request.transaction_id;
                let xor_addr = XorMappedAddress {
                    ip: src.ip(),
                    port: src.port(),
                };
                if response.build(&[Box::new(xor_addr)]).is_ok() {
                    let _ = socket.send_to(&response.raw, src).await;
                }
            }
        });

        Ok((addr, seen))
    }

    #[test]
    fn test_is_stun_message() {
        assert!(!is_stun_message(&[]));
        assert!(is_stun_message(&[0x00, 0x01]));
        assert!(!is_stun_message(&[0x40, 0x00]));
    }

    #[tokio::test]
    async fn test_binding_request_returns_mapped_address() -> Result<()> {
        let (server, _) = spawn_responder(0).await?;
        let client = UdpSocket::bind("127.0.0.1:0").await?;
        let client_addr = client.local_addr()?;

        let response = binding_request_on(&client, server, Duration::from_secs(2)).await?;

        assert_eq!(response.mapped_address, client_addr);
        assert_eq!(response.attempts, 1);
        assert!(response.rtt < Duration::from_secs(2));
        Ok(())
    }

    #[tokio::test]
    async fn test_binding_request_retransmits_after_loss() -> Result<()> {
        let (server, seen) = spawn_responder(1).await?;
        let client = UdpSocket::bind("127.0.0.1:0").await?;

        let response = binding_request_on(&client, server, Duration::from_secs(3)).await?;

        assert_eq!(response.attempts, 2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert!(response.rtt >= INITIAL_RTO);
        Ok(())
    }

    #[tokio::test]
    async fn test_binding_request_times_out_on_silent_server() -> Result<()> {
        // Bound but never answers
        let silent = UdpSocket::bind("127.0.0.1:0").await?;
        let server = silent.local_addr()?;

        let err = binding_request(server, Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "unexpected error: {err}");
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_server() -> Result<()> {
        let addr = resolve_server("127.0.0.1:3478").await?;
        assert_eq!(addr, "127.0.0.1:3478".parse::<SocketAddr>()?);

        let err = resolve_server("no-port-here").await.unwrap_err();
        assert!(matches!(err, StunError::AddressResolutionFailed { .. }));
        Ok(())
    }
}
