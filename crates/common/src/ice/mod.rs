//! ICE 服务器配置模型
//!
//! 与浏览器 `RTCConfiguration` 的 JSON 形式保持兼容，
//! 第三方配置服务（如 Xirsys）下发的数据直接反序列化为这里的类型。

mod url;

pub use url::{
    DEFAULT_PORT, DEFAULT_TLS_PORT, IceScheme, IceUrl, IceUrlError, Transport, provider_of,
};

use crate::error::ConfigError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use strum::Display;

/// ICE 传输策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransportPolicy {
    #[default]
    All,
    Relay,
}

/// 单个 ICE 服务器条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    /// 服务器 URL 列表，JSON 中可以是字符串或字符串数组
    #[serde(deserialize_with = "one_or_many")]
    pub urls: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn new(urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            username: None,
            credential: None,
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.credential = Some(credential.into());
        self
    }

    /// 解析全部 URL，忽略无法解析的条目
    pub fn parsed_urls(&self) -> impl Iterator<Item = IceUrl> + '_ {
        self.urls.iter().filter_map(|u| IceUrl::parse(u).ok())
    }

    pub fn has_turn(&self) -> bool {
        self.parsed_urls().any(|u| u.scheme.is_turn())
    }

    fn retain_urls(&self, keep: impl Fn(IceScheme) -> bool) -> Option<Self> {
        let urls: Vec<String> = self
            .urls
            .iter()
            .filter(|raw| IceUrl::parse(raw).is_ok_and(|u| keep(u.scheme)))
            .cloned()
            .collect();
        if urls.is_empty() {
            return None;
        }
        Some(Self {
            urls,
            username: self.username.clone(),
            credential: self.credential.clone(),
        })
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(url) => vec![url],
        OneOrMany::Many(urls) => urls,
    })
}

/// `RTCConfiguration` 的 JSON 表示
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtcConfigDocument {
    #[serde(default)]
    pub ice_servers: Vec<IceServer>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ice_transport_policy: Option<TransportPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ice_candidate_pool_size: Option<u8>,
}

impl RtcConfigDocument {
    pub fn new(ice_servers: Vec<IceServer>) -> Self {
        Self {
            ice_servers,
            ..Default::default()
        }
    }

    pub fn transport_policy(&self) -> TransportPolicy {
        self.ice_transport_policy.unwrap_or_default()
    }

    pub fn url_count(&self) -> usize {
        self.ice_servers.iter().map(|s| s.urls.len()).sum()
    }

    pub fn has_turn(&self) -> bool {
        self.ice_servers.iter().any(IceServer::has_turn)
    }

    /// 仅保留 TURN/TURNS URL
    pub fn turn_only(&self) -> Self {
        self.filtered(IceScheme::is_turn)
    }

    /// 仅保留 STUN/STUNS URL
    pub fn stun_only(&self) -> Self {
        self.filtered(IceScheme::is_stun)
    }

    fn filtered(&self, keep: impl Fn(IceScheme) -> bool + Copy) -> Self {
        Self {
            ice_servers: self
                .ice_servers
                .iter()
                .filter_map(|s| s.retain_urls(keep))
                .collect(),
            ice_transport_policy: self.ice_transport_policy,
            ice_candidate_pool_size: self.ice_candidate_pool_size,
        }
    }

    /// 展开为每个 URL 一个服务器条目（凭据随之复制）
    pub fn flatten(&self) -> Vec<IceServer> {
        self.ice_servers
            .iter()
            .flat_map(|server| {
                server.urls.iter().map(move |url| IceServer {
                    urls: vec![url.clone()],
                    username: server.username.clone(),
                    credential: server.credential.clone(),
                })
            })
            .collect()
    }

    /// 第一个包含 `turn:` / `turns:` URL 的服务器
    pub fn first_turn_server(&self) -> Option<&IceServer> {
        self.ice_servers.iter().find(|s| s.has_turn())
    }

    /// 验证配置有效性
    ///
    /// 以 "Warning:" 开头的条目为非致命问题
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.ice_servers.is_empty() {
            errors.push("RTC configuration has empty iceServers array".to_string());
        }

        let mut seen = HashSet::new();
        for (i, server) in self.ice_servers.iter().enumerate() {
            if server.urls.is_empty() {
                errors.push(format!("iceServers[{i}] has no urls"));
                continue;
            }

            for raw in &server.urls {
                if !seen.insert(raw.as_str()) {
                    errors.push(format!("Warning: duplicated ICE server URL: {raw}"));
                }

                match IceUrl::parse(raw) {
                    Ok(url) if url.scheme.is_turn() => {
                        let username_ok = server.username.as_deref().is_some_and(|u| !u.is_empty());
                        let credential_ok =
                            server.credential.as_deref().is_some_and(|c| !c.is_empty());
                        if !username_ok || !credential_ok {
                            errors.push(format!(
                                "iceServers[{i}]: TURN URL {raw} requires username and credential"
                            ));
                        }
                    }
                    Ok(_) => {}
                    Err(e) => errors.push(format!("iceServers[{i}]: {e}")),
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn has_fatal_issues(issues: &[String]) -> bool {
        issues.iter().any(|e| !e.starts_with("Warning:"))
    }
}

/// 解析配置服务返回的 JSON
///
/// 支持的格式：
/// - `{ "iceServers": [...] }`
/// - `{ "rtcConfig": { "iceServers": [...] } }`
/// - `{ "v": { "iceServers": [...] | {...} } }`（Xirsys API）
/// - 单个服务器对象 `{ "urls": ..., "username": ..., "credential": ... }`
pub fn parse_config_payload(payload: &str) -> Result<RtcConfigDocument, ConfigError> {
    let value: Value = serde_json::from_str(payload).map_err(|e| ConfigError::ParseError {
        source: Box::new(e),
    })?;
    document_from_value(value)
}

fn document_from_value(value: Value) -> Result<RtcConfigDocument, ConfigError> {
    let Value::Object(mut map) = value else {
        return Err(invalid_format("RTC configuration is not a JSON object"));
    };

    if map.get("iceServers").is_some_and(Value::is_array) {
        return from_json(Value::Object(map));
    }

    if let Some(inner) = map.remove("rtcConfig") {
        if inner.get("iceServers").is_some_and(Value::is_array) {
            return from_json(inner);
        }
        return Err(invalid_format("rtcConfig is missing an iceServers array"));
    }

    if let Some(Value::Object(mut envelope)) = map.remove("v") {
        return match envelope.remove("iceServers") {
            Some(servers @ Value::Array(_)) => Ok(RtcConfigDocument::new(from_json(servers)?)),
            Some(server @ Value::Object(_)) => Ok(RtcConfigDocument::new(vec![from_json(server)?])),
            _ => Err(invalid_format("provider envelope is missing iceServers")),
        };
    }

    if map.contains_key("urls") {
        let server: IceServer = from_json(Value::Object(map))?;
        return Ok(RtcConfigDocument::new(vec![server]));
    }

    Err(invalid_format("Invalid RTC configuration format"))
}

fn from_json<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, ConfigError> {
    serde_json::from_value(value).map_err(|e| ConfigError::ParseError {
        source: Box::new(e),
    })
}

fn invalid_format(message: &str) -> ConfigError {
    ConfigError::InvalidFormat {
        message: message.to_string(),
    }
}

/// 内置的公共 STUN 兜底配置
pub fn fallback_stun_document() -> RtcConfigDocument {
    RtcConfigDocument::new(vec![
        IceServer::new(["stun:stun.cloudflare.com:3478"]),
        IceServer::new(["stun:stun.l.google.com:19302"]),
    ])
}
