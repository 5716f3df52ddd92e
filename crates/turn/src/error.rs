//! TURN 探测错误类型

use thiserror::Error;

/// TURN 分配探测错误枚举
#[derive(Error, Debug)]
pub enum TurnError {
    /// 客户端创建或监听失败
    #[error("Failed to set up TURN client for {server}: {reason}")]
    ClientSetupFailed { server: String, reason: String },

    /// Allocate 请求失败（认证失败、配额不足等）
    #[error("Allocation on {server} failed: {reason}")]
    AllocationFailed { server: String, reason: String },

    /// 探测超时
    #[error("TURN allocation on {server} timed out after {duration_ms}ms")]
    Timeout { server: String, duration_ms: u64 },

    /// 目前只探测 UDP
    #[error("Unsupported TURN transport for {url}, only UDP allocations are probed")]
    UnsupportedTransport { url: String },

    /// 缺少凭据
    #[error("Invalid credentials: {details}")]
    InvalidCredentials { details: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// TURN 探测专用的 Result 类型
pub type Result<T> = std::result::Result<T, TurnError>;
