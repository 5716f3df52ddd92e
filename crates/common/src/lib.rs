//! turnprobe 通用基础组件
//!
//! 包含工具配置（TOML）、ICE 服务器模型与 URL 解析，以及共享错误类型

pub mod config;
pub mod error;
pub mod ice;

// Re-export commonly used types for convenience
pub use config::ProbeConfig;
pub use error::{ConfigError, Result};
pub use ice::{IceScheme, IceServer, IceUrl, RtcConfigDocument, TransportPolicy};
