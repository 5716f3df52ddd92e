//! 候选收集错误类型

use thiserror::Error;

/// ICE 收集探测错误枚举
#[derive(Error, Debug)]
pub enum GatherError {
    /// webrtc-rs API / PeerConnection 构建失败
    #[error("Failed to create peer connection: {reason}")]
    PeerConnectionFailed { reason: String },

    /// 数据通道创建失败（没有 m-line 就不会开始收集）
    #[error("Failed to create data channel: {reason}")]
    DataChannelFailed { reason: String },

    /// create_offer / set_local_description 失败
    #[error("Failed to set local description: {reason}")]
    LocalDescriptionFailed { reason: String },

    /// 关闭连接失败
    #[error("Failed to close peer connection: {reason}")]
    CloseFailed { reason: String },

    /// 变体中没有任何 ICE 服务器
    #[error("Test variant '{name}' has no ICE servers")]
    EmptyVariant { name: String },

    /// 未知的变体名
    #[error("Unknown test variant '{0}'")]
    UnknownVariant(String),
}

/// 收集探测专用的 Result 类型
pub type Result<T> = std::result::Result<T, GatherError>;

impl GatherError {
    pub fn peer_connection(reason: impl ToString) -> Self {
        Self::PeerConnectionFailed {
            reason: reason.to_string(),
        }
    }
}
