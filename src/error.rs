//! 统一错误处理模型
//!
//! turnprobe 的顶层错误类型，聚合各子 crate 与依赖库的错误

use thiserror::Error;

/// 主应用的统一错误枚举
#[derive(Debug, Error)]
pub enum Error {
    // ========== 配置相关错误 ==========
    /// 工具配置或 ICE 配置解析错误
    #[error("Configuration error: {0}")]
    Config(#[from] turnprobe_common::ConfigError),

    /// 所有配置来源都失败
    #[error("No usable ICE configuration: {message}")]
    Source { message: String },

    // ========== 探测相关错误 ==========
    /// ICE 收集探测错误
    #[error("Gather error: {0}")]
    Gather(#[from] gather::GatherError),

    /// STUN 探测错误
    #[error("STUN probe error: {0}")]
    Stun(#[from] stun::StunError),

    /// TURN 探测错误
    #[error("TURN probe error: {0}")]
    Turn(#[from] turn::TurnError),

    // ========== 系统级错误 ==========
    /// I/O 操作错误
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化/反序列化错误
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// HTTP 请求错误
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Base64 解码错误
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    // ========== 业务逻辑错误 ==========
    /// 服务启动失败
    #[error("Service startup failed: {message}")]
    ServiceStartup { message: String },

    /// 配置验证失败
    #[error("Configuration validation failed: {message}")]
    Validation { message: String },

    // ========== 通用错误 ==========
    /// 自定义错误消息
    #[error("Application error: {message}")]
    Custom { message: String },
}

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// 创建自定义错误
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
        }
    }

    /// 创建服务启动失败错误
    pub fn service_startup(message: impl Into<String>) -> Self {
        Self::ServiceStartup {
            message: message.into(),
        }
    }

    /// 创建配置验证失败错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
