//! STUN 探测错误类型

use thiserror::Error;

/// STUN 探测错误枚举
#[derive(Error, Debug)]
pub enum StunError {
    // ========== 协议错误 ==========
    /// STUN 消息编码失败
    #[error("Failed to encode STUN message: {reason}")]
    MessageEncodeFailed { reason: String },

    /// 服务器返回了非 Binding Success 响应
    #[error("Unexpected STUN response type: {message_type}")]
    UnexpectedResponse { message_type: String },

    /// 响应中缺少 XOR-MAPPED-ADDRESS
    #[error("STUN response has no XOR-MAPPED-ADDRESS: {reason}")]
    MissingMappedAddress { reason: String },

    // ========== 网络错误 ==========
    /// 地址解析失败
    #[error("Address resolution failed: {address}")]
    AddressResolutionFailed { address: String },

    /// 不支持的传输方式（stuns:/TCP）
    #[error("Unsupported STUN transport for {url}")]
    UnsupportedTransport { url: String },

    // ========== 超时错误 ==========
    /// 所有重传均未收到响应
    #[error("STUN binding timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    // ========== 外部错误包装 ==========
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// STUN 探测专用的 Result 类型
pub type Result<T> = std::result::Result<T, StunError>;

impl StunError {
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
