//! # turnprobe
//!
//! TURN/STUN 服务器可达性诊断：按多种配置变体收集 ICE 候选并汇总，
//! 另含 STUN 延迟优选、TURN 分配探测、配置转换与配置下发接口。

pub mod allocate;
pub mod convert;
pub mod error;
pub mod observability;
pub mod optimize;
pub mod report;
pub mod runner;
pub mod service;
pub mod source;

// Re-export commonly used types
pub use error::{Error, Result};
pub use report::Summary;
pub use runner::ProbeRunner;
pub use source::{ConfigSource, LoadedConfig, SourceLoader};
pub use turnprobe_common::config::ProbeConfig;
