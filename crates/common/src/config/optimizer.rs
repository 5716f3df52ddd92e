use serde::{Deserialize, Serialize};
use std::time::Duration;

/// STUN 服务器优选参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// 单个 STUN 服务器的测试超时（毫秒）
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// 最多保留的服务器数量
    #[serde(default = "default_max_servers")]
    pub max_servers: usize,

    /// 可选的远程优选服务地址（POST `{worker_url}/api/optimize`）
    #[serde(default)]
    pub worker_url: Option<String>,
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_max_servers() -> usize {
    3
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_servers: default_max_servers(),
            worker_url: None,
        }
    }
}

impl OptimizerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub(crate) fn collect_issues(&self, errors: &mut Vec<String>) {
        if self.timeout_ms == 0 {
            errors.push("optimizer.timeout_ms must be greater than 0".to_string());
        }
        if self.max_servers == 0 {
            errors.push("optimizer.max_servers must be at least 1".to_string());
        }
        if let Some(url) = &self.worker_url
            && !url.starts_with("http://")
            && !url.starts_with("https://")
        {
            errors.push(format!(
                "optimizer.worker_url must be an http(s) URL, got '{url}'"
            ));
        }
    }
}
