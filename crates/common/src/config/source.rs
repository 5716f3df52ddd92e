use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// ICE 服务器配置来源
///
/// 依次尝试 `url`、`env_var`、`file`，第一个成功的来源生效。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// 配置服务 HTTP 地址，例如 `https://example.org/api/get-config`
    #[serde(default)]
    pub url: Option<String>,

    /// 存放 base64 编码 JSON 的环境变量名
    #[serde(default = "default_env_var")]
    pub env_var: String,

    /// 本地 JSON 配置文件
    #[serde(default = "default_file")]
    pub file: Option<PathBuf>,

    /// HTTP 请求超时（毫秒）
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// 所有来源失败时使用内置公共 STUN 服务器
    #[serde(default)]
    pub use_fallback: bool,
}

fn default_env_var() -> String {
    "RTC_CONFIG".to_string()
}

fn default_file() -> Option<PathBuf> {
    Some(PathBuf::from("xirsys-config.json"))
}

fn default_http_timeout_ms() -> u64 {
    5_000
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: None,
            env_var: default_env_var(),
            file: default_file(),
            http_timeout_ms: default_http_timeout_ms(),
            use_fallback: false,
        }
    }
}

impl SourceConfig {
    pub(crate) fn collect_issues(&self, errors: &mut Vec<String>) {
        if let Some(url) = &self.url
            && !url.starts_with("http://")
            && !url.starts_with("https://")
        {
            errors.push(format!("source.url must be an http(s) URL, got '{url}'"));
        }
        if self.env_var.trim().is_empty() {
            errors.push("source.env_var cannot be empty".to_string());
        }
        if self.url.is_none() && self.file.is_none() && !self.use_fallback {
            errors.push(
                "Warning: only source.env_var is configured and source.use_fallback is off"
                    .to_string(),
            );
        }
    }
}
