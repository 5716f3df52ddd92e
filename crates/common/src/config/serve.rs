use crate::ice::IceServer;
use serde::{Deserialize, Serialize};

/// 配置下发接口（`turnprobe serve`）配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    /// 监听地址
    #[serde(default = "default_ip")]
    pub ip: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// 读取 base64 RTC 配置的环境变量名
    #[serde(default = "default_env_var")]
    pub env_var: String,

    /// 允许的跨域来源，第一个为主域名
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// 调试用：允许任意来源（`Access-Control-Allow-Origin: *`）
    #[serde(default)]
    pub cors_allow_all: bool,

    /// 环境变量缺失或无效时返回的 TURN 服务器
    #[serde(default)]
    pub fallback_server: Option<IceServer>,
}

fn default_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3004
}

fn default_env_var() -> String {
    "RTC_CONFIG".to_string()
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            ip: default_ip(),
            port: default_port(),
            env_var: default_env_var(),
            allowed_origins: Vec::new(),
            cors_allow_all: false,
            fallback_server: None,
        }
    }
}

impl ServeConfig {
    pub fn bind_addr(&self) -> String {
        if self.ip.contains(':') {
            format!("[{}]:{}", self.ip, self.port)
        } else {
            format!("{}:{}", self.ip, self.port)
        }
    }

    pub(crate) fn collect_issues(&self, errors: &mut Vec<String>) {
        if self.ip.parse::<std::net::IpAddr>().is_err() {
            errors.push(format!("serve.ip '{}' is not a valid IP address", self.ip));
        }
        if self.cors_allow_all {
            errors.push("Warning: serve.cors_allow_all is enabled (debug only)".to_string());
        } else if self.allowed_origins.is_empty() {
            errors.push(
                "Warning: serve.allowed_origins is empty, CORS responses will omit Allow-Origin"
                    .to_string(),
            );
        }
        if let Some(server) = &self.fallback_server
            && !server.has_turn()
        {
            errors.push("serve.fallback_server must contain a turn: or turns: URL".to_string());
        }
    }
}
