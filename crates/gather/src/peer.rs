//! webrtc-rs 实现的收集会话
//!
//! 只建立本地 PeerConnection：创建数据通道、生成 offer 并设为本地描述，
//! 这会触发 ICE 收集。不设置远端描述，因此不会真正建立连接。

use crate::candidate::{CandidateKind, GatheredCandidate};
use crate::error::{GatherError, Result};
use crate::plan::TestVariant;
use crate::session::{ConnectionState, GatheringState, IceSession, SessionFactory};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use turnprobe_common::{IceServer, TransportPolicy};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{API, APIBuilder};
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::policy::ice_transport_policy::RTCIceTransportPolicy;

/// 数据通道标签，仅用于产生 application m-line
const DATA_CHANNEL_LABEL: &str = "test";

/// 基于 webrtc-rs 的会话工厂，所有会话共享同一个 API 实例
pub struct WebRtcSessionFactory {
    api: API,
}

impl WebRtcSessionFactory {
    pub fn new() -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(GatherError::peer_connection)?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(GatherError::peer_connection)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self { api })
    }
}

fn to_rtc_configuration(variant: &TestVariant) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: variant.servers.iter().map(to_rtc_ice_server).collect(),
        ice_transport_policy: match variant.policy {
            TransportPolicy::All => RTCIceTransportPolicy::All,
            TransportPolicy::Relay => RTCIceTransportPolicy::Relay,
        },
        ..Default::default()
    }
}

fn to_rtc_ice_server(server: &IceServer) -> RTCIceServer {
    RTCIceServer {
        urls: server.urls.clone(),
        username: server.username.clone().unwrap_or_default(),
        credential: server.credential.clone().unwrap_or_default(),
        ..Default::default()
    }
}

fn to_gathered(candidate: &RTCIceCandidate) -> GatheredCandidate {
    GatheredCandidate {
        kind: CandidateKind::from_type_name(&candidate.typ.to_string().to_ascii_lowercase()),
        address: candidate.address.clone(),
        port: candidate.port,
        protocol: candidate.protocol.to_string().to_ascii_lowercase(),
    }
}

#[async_trait]
impl SessionFactory for WebRtcSessionFactory {
    async fn open(
        &self,
        variant: &TestVariant,
        candidates: UnboundedSender<GatheredCandidate>,
    ) -> Result<Box<dyn IceSession>> {
        if variant.servers.is_empty() {
            return Err(GatherError::EmptyVariant {
                name: variant.name.clone(),
            });
        }

        for server in &variant.servers {
            for url in &server.urls {
                info!("Added ICE server: {}", url);
            }
        }
        info!(
            "Created RTC configuration with {} ICE servers (policy: {})",
            variant.url_count(),
            variant.policy
        );

        let peer_connection = Arc::new(
            self.api
                .new_peer_connection(to_rtc_configuration(variant))
                .await
                .map_err(GatherError::peer_connection)?,
        );

        let session = WebRtcSession {
            peer_connection,
            gathering: Arc::new(AtomicU8::new(GatheringState::New.as_u8())),
            connection: Arc::new(AtomicU8::new(ConnectionState::New.as_u8())),
        };
        session.attach_handlers(&variant.name, candidates);

        if let Err(e) = session.start_gathering().await {
            if let Err(close_err) = session.peer_connection.close().await {
                debug!("Closing half-open peer connection failed: {}", close_err);
            }
            return Err(e);
        }

        info!(
            "Local description set, ICE gathering state: {}",
            session.gathering_state()
        );
        Ok(Box::new(session))
    }
}

struct WebRtcSession {
    peer_connection: Arc<RTCPeerConnection>,
    gathering: Arc<AtomicU8>,
    connection: Arc<AtomicU8>,
}

impl WebRtcSession {
    fn attach_handlers(&self, test_name: &str, candidates: UnboundedSender<GatheredCandidate>) {
        let name = test_name.to_string();
        self.peer_connection
            .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                if let Some(c) = candidate {
                    let gathered = to_gathered(&c);
                    info!("Found candidate: {}", gathered);
                    if gathered.is_relay() {
                        info!("Found relay candidate: {}:{}", gathered.address, gathered.port);
                    }
                    if candidates.send(gathered).is_err() {
                        debug!("[{}] candidate receiver dropped", name);
                    }
                }
                Box::pin(async {})
            }));

        let gathering = self.gathering.clone();
        self.peer_connection
            .on_ice_gathering_state_change(Box::new(move |state: RTCIceGathererState| {
                let mapped = match state {
                    RTCIceGathererState::Gathering => GatheringState::Gathering,
                    RTCIceGathererState::Complete => GatheringState::Complete,
                    RTCIceGathererState::Closed => GatheringState::Closed,
                    _ => GatheringState::New,
                };
                gathering.store(mapped.as_u8(), Ordering::SeqCst);
                info!("ICE gathering state changed to: {}", mapped);
                Box::pin(async {})
            }));

        let connection = self.connection.clone();
        self.peer_connection.on_ice_connection_state_change(Box::new(
            move |state: RTCIceConnectionState| {
                let mapped = match state {
                    RTCIceConnectionState::Checking => ConnectionState::Checking,
                    RTCIceConnectionState::Connected => ConnectionState::Connected,
                    RTCIceConnectionState::Completed => ConnectionState::Completed,
                    RTCIceConnectionState::Disconnected => ConnectionState::Disconnected,
                    RTCIceConnectionState::Failed => ConnectionState::Failed,
                    RTCIceConnectionState::Closed => ConnectionState::Closed,
                    _ => ConnectionState::New,
                };
                connection.store(mapped.as_u8(), Ordering::SeqCst);
                info!("ICE connection state changed to: {}", mapped);
                Box::pin(async {})
            },
        ));
    }

    async fn start_gathering(&self) -> Result<()> {
        self.peer_connection
            .create_data_channel(DATA_CHANNEL_LABEL, None)
            .await
            .map_err(|e| GatherError::DataChannelFailed {
                reason: e.to_string(),
            })?;

        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| GatherError::LocalDescriptionFailed {
                reason: format!("create offer: {e}"),
            })?;

        self.peer_connection
            .set_local_description(offer)
            .await
            .map_err(|e| GatherError::LocalDescriptionFailed {
                reason: e.to_string(),
            })?;

        Ok(())
    }
}

#[async_trait]
impl IceSession for WebRtcSession {
    fn gathering_state(&self) -> GatheringState {
        GatheringState::from_u8(self.gathering.load(Ordering::SeqCst))
    }

    fn connection_state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.connection.load(Ordering::SeqCst))
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection
            .close()
            .await
            .map_err(|e| GatherError::CloseFailed {
                reason: e.to_string(),
            })?;
        if self.gathering_state() == GatheringState::Gathering {
            warn!("Peer connection closed while ICE gathering was still running");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtc_configuration_mapping() {
        let variant = TestVariant::new(
            crate::plan::VariantKind::RelayForced,
            vec![
                IceServer::new(["turn:relay.example.org:3478"]).with_credentials("u", "p"),
                IceServer::new(["stun:stun.example.org"]),
            ],
            TransportPolicy::Relay,
        );

        let config = to_rtc_configuration(&variant);
        assert_eq!(config.ice_servers.len(), 2);
        assert_eq!(config.ice_servers[0].username, "u");
        assert_eq!(config.ice_servers[0].credential, "p");
        assert_eq!(config.ice_servers[1].username, "");
        assert_eq!(config.ice_transport_policy, RTCIceTransportPolicy::Relay);
    }

    #[tokio::test]
    async fn test_empty_variant_rejected() {
        let factory = WebRtcSessionFactory::new().unwrap();
        let variant = TestVariant::new(
            crate::plan::VariantKind::StunOnly,
            Vec::new(),
            TransportPolicy::All,
        );
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();

        let result = factory.open(&variant, tx).await;
        assert!(matches!(result, Err(GatherError::EmptyVariant { .. })));
    }
}
