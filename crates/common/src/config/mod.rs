//! 统一配置管理
//!
//! turnprobe 的所有可调参数都定义在这里，配置文件使用 TOML 格式。
//! 文件中省略的配置段全部使用默认值，因此空文件也是合法配置。

pub mod optimizer;
pub mod probe;
pub mod serve;
pub mod source;
pub mod tracing;

pub use optimizer::OptimizerConfig;
pub use probe::{ProbeSettings, VARIANT_NAMES};
pub use serve::ServeConfig;
pub use source::SourceConfig;
pub use tracing::TracingConfig;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// turnprobe 主配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// 实例名称，出现在日志与追踪资源属性中
    #[serde(default = "default_name")]
    pub name: String,

    /// ICE 服务器配置来源
    #[serde(default)]
    pub source: SourceConfig,

    /// 候选收集探测参数
    #[serde(default)]
    pub probe: ProbeSettings,

    /// STUN 优选参数
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// 配置下发接口参数
    #[serde(default)]
    pub serve: ServeConfig,

    /// 可观测性配置（日志 + 追踪）
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// 可观测性配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ObservabilityConfig {
    /// EnvFilter 语法的过滤级别（如 "info,webrtc_ice=warn"），RUST_LOG 优先
    #[serde(default = "default_filter_level")]
    pub filter_level: String,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub tracing: TracingConfig,
}

/// 日志配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    /// "console"（stderr，默认）或 "file"
    #[serde(default = "default_log_output")]
    pub output: String,

    /// output = "file" 时按天轮转
    #[serde(default)]
    pub rotate: bool,

    /// output = "file" 时的日志目录
    #[serde(default = "default_log_path")]
    pub path: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            filter_level: default_filter_level(),
            log: LogConfig::default(),
            tracing: TracingConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: default_log_output(),
            rotate: false,
            path: default_log_path(),
        }
    }
}

fn default_name() -> String {
    "turnprobe".to_string()
}

fn default_log_output() -> String {
    "console".to_string()
}

fn default_log_path() -> String {
    "logs/".to_string()
}

fn default_filter_level() -> String {
    // webrtc-rs 的 ICE/mDNS 模块在 info 级别非常嘈杂
    "info,webrtc_ice=warn,webrtc_mdns=warn,webrtc=warn".to_string()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            source: SourceConfig::default(),
            probe: ProbeSettings::default(),
            optimizer: OptimizerConfig::default(),
            serve: ServeConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ProbeConfig {
    pub fn tracing_config(&self) -> &TracingConfig {
        &self.observability.tracing
    }

    pub fn observability_config(&self) -> &ObservabilityConfig {
        &self.observability
    }

    pub fn log_config(&self) -> &LogConfig {
        &self.observability.log
    }

    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        if !path_ref.is_file() {
            return Err(ConfigError::FileNotFound {
                path: path_ref.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path_ref)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// 验证配置有效性
    ///
    /// 返回的问题列表中以 "Warning:" 开头的条目不阻止运行
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Instance name cannot be empty".to_string());
        }

        let main_level = self
            .observability
            .filter_level
            .split(',')
            .next()
            .unwrap_or("")
            .trim();
        if !["trace", "debug", "info", "warn", "error"].contains(&main_level) {
            errors.push(format!(
                "Invalid filter level '{}', must start with one of: trace, debug, info, warn, error",
                self.observability.filter_level
            ));
        }

        if !["console", "file"].contains(&self.observability.log.output.as_str()) {
            errors.push(format!(
                "Invalid log output '{}' (observability.log.output), must be 'console' or 'file'",
                self.observability.log.output
            ));
        }

        if let Err(e) = self.observability.tracing.validate() {
            errors.push(e);
        }

        self.source.collect_issues(&mut errors);
        self.probe.collect_issues(&mut errors);
        self.optimizer.collect_issues(&mut errors);
        self.serve.collect_issues(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_is_default_config() {
        let config = ProbeConfig::from_toml("").unwrap();
        assert_eq!(config.name, "turnprobe");
        assert_eq!(config.probe.gather_timeout_ms, 10_000);
        assert_eq!(config.probe.poll_interval_ms, 100);
        assert_eq!(config.probe.settle_delay_ms, 2_000);
        assert_eq!(config.source.env_var, "RTC_CONFIG");
        assert_eq!(config.optimizer.max_servers, 3);
        assert_eq!(config.serve.port, 3004);
    }

    #[test]
    fn test_default_config_only_warns() {
        let issues = ProbeConfig::default().validate().unwrap_err();
        assert!(issues.iter().all(|e| e.starts_with("Warning:")), "{issues:?}");
    }

    #[test]
    fn test_full_config_parses() {
        let toml = r#"
            name = "edge-check"

            [source]
            url = "https://example.org/api/get-config"
            file = "ice.json"
            use_fallback = true

            [probe]
            gather_timeout_ms = 5000
            variants = ["full", "turn-only"]
            strict = true

            [optimizer]
            max_servers = 2
            worker_url = "https://optimizer.example.org"

            [serve]
            port = 8080
            allowed_origins = ["https://app.example.org"]

            [serve.fallback_server]
            urls = "turn:relay.example.org:3478"
            username = "u"
            credential = "c"

            [observability]
            filter_level = "debug"

            [observability.log]
            output = "file"
            rotate = true
        "#;

        let config = ProbeConfig::from_toml(toml).unwrap();
        assert_eq!(config.name, "edge-check");
        assert_eq!(config.probe.variants, vec!["full", "turn-only"]);
        assert!(config.probe.strict);
        assert_eq!(
            config.serve.fallback_server.as_ref().unwrap().urls,
            vec!["turn:relay.example.org:3478"]
        );
        assert!(config.validate().is_ok(), "{:?}", config.validate());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = ProbeConfig::default();
        config.name = " ".to_string();
        config.probe.poll_interval_ms = 0;
        config.probe.variants = vec!["sideways".to_string()];
        config.observability.log.output = "syslog".to_string();
        config.serve.ip = "localhost".to_string();

        let issues = config.validate().unwrap_err();
        let fatal: Vec<_> = issues.iter().filter(|e| !e.starts_with("Warning:")).collect();
        assert_eq!(fatal.len(), 5, "{issues:?}");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = \"from-file\"").unwrap();
        let config = ProbeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.name, "from-file");

        let missing = ProbeConfig::from_file("/definitely/not/here.toml");
        assert!(matches!(missing, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let result = ProbeConfig::from_toml("name = [\n");
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_partial_toml_keeps_probe_defaults() {
        let parsed = ProbeConfig::from_toml("[probe]\nstrict = true\n").unwrap();
        assert!(parsed.probe.strict);
        assert_eq!(
            parsed.probe.gather_timeout_ms,
            ProbeConfig::default().probe.gather_timeout_ms
        );
    }
}
