//! 收集会话抽象
//!
//! 探测循环只依赖这里的两个 trait，webrtc-rs 的实现见 [`crate::peer`]，
//! 测试中用脚本化的假会话替换。

use crate::candidate::GatheredCandidate;
use crate::error::Result;
use crate::plan::TestVariant;
use async_trait::async_trait;
use serde::Serialize;
use strum::Display;
use tokio::sync::mpsc::UnboundedSender;

/// ICE 收集状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GatheringState {
    #[default]
    New,
    Gathering,
    Complete,
    Closed,
}

impl GatheringState {
    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Gathering,
            2 => Self::Complete,
            3 => Self::Closed,
            _ => Self::New,
        }
    }
}

/// ICE 连接状态
///
/// 探测不设置远端描述，正常情况下停留在 `new`，仅用于日志。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Checking,
            2 => Self::Connected,
            3 => Self::Completed,
            4 => Self::Disconnected,
            5 => Self::Failed,
            6 => Self::Closed,
            _ => Self::New,
        }
    }
}

/// 一次正在进行的候选收集
#[async_trait]
pub trait IceSession: Send + Sync {
    fn gathering_state(&self) -> GatheringState;

    fn connection_state(&self) -> ConnectionState;

    async fn close(&self) -> Result<()>;
}

/// 为每个测试变体打开新的收集会话
///
/// 实现需在返回前开始收集，收集到的候选通过 `candidates` 发送。
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(
        &self,
        variant: &TestVariant,
        candidates: UnboundedSender<GatheredCandidate>,
    ) -> Result<Box<dyn IceSession>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_codes_round_trip() {
        for state in [
            GatheringState::New,
            GatheringState::Gathering,
            GatheringState::Complete,
            GatheringState::Closed,
        ] {
            assert_eq!(GatheringState::from_u8(state.as_u8()), state);
        }
        assert_eq!(ConnectionState::from_u8(ConnectionState::Failed.as_u8()), ConnectionState::Failed);
        assert_eq!(ConnectionState::from_u8(200), ConnectionState::New);
        assert_eq!(GatheringState::Complete.to_string(), "complete");
    }
}
