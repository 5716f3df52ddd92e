//! OpenTelemetry 追踪导出配置
//!
//! 仅在编译启用 `opentelemetry` feature 时生效，探测过程中的 span 通过 OTLP/gRPC 导出。

use serde::{Deserialize, Serialize};

fn default_service_name() -> String {
    "turnprobe".to_string()
}

fn default_endpoint() -> String {
    "http://127.0.0.1:4317".to_string()
}

/// `[observability.tracing]` 配置段
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    /// 是否导出追踪数据，默认关闭
    #[serde(default)]
    pub enable: bool,

    /// 上报到追踪后端的服务名
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// OTLP gRPC 端点，例如 Jaeger 的 `http://localhost:4317`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enable: false,
            service_name: default_service_name(),
            endpoint: default_endpoint(),
        }
    }
}

impl TracingConfig {
    /// 启用时端点必须是 http(s) URL
    pub fn validate(&self) -> Result<(), String> {
        if !self.enable {
            return Ok(());
        }
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err("observability.tracing.endpoint cannot be empty when tracing is enabled".to_string());
        }
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(format!(
                "observability.tracing.endpoint must be an http(s) URL, got '{endpoint}'"
            ));
        }
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enable
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_by_default() {
        let config = TracingConfig::default();
        assert!(!config.is_enabled());
        assert_eq!(config.service_name(), "turnprobe");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_enabled_requires_http_endpoint() {
        let mut config = TracingConfig {
            enable: true,
            endpoint: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.endpoint = "tempo:4317".to_string();
        assert!(config.validate().is_err());

        config.endpoint = "https://tempo:4317".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let config: TracingConfig = toml::from_str("enable = true").unwrap();
        assert!(config.is_enabled());
        assert_eq!(config.endpoint(), "http://127.0.0.1:4317");
    }
}
