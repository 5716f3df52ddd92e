//! ICE 候选收集探测
//!
//! 针对一份 ICE 服务器配置生成若干测试变体（完整配置、强制中继、仅 TURN、
//! 仅 STUN），逐个建立 PeerConnection 触发候选收集，并按变体的成功条件
//! 判定结果。协议细节全部交给 webrtc-rs。

pub mod candidate;
pub mod error;
pub mod peer;
pub mod plan;
pub mod probe;
pub mod session;

pub use candidate::{CandidateKind, GatheredCandidate};
pub use error::{GatherError, Result};
pub use peer::WebRtcSessionFactory;
pub use plan::{TestVariant, VariantKind, build_plan};
pub use probe::{ProbeOptions, ProbeReport, run_probe};
pub use session::{ConnectionState, GatheringState, IceSession, SessionFactory};
