//! ICE 服务器 URL 解析
//!
//! 支持 RFC 7064 / RFC 7065 定义的 `stun:`、`stuns:`、`turn:`、`turns:` 格式：
//! `scheme:host[:port][?transport=udp|tcp]`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::Display;
use thiserror::Error;

/// STUN/TURN 默认端口
pub const DEFAULT_PORT: u16 = 3478;
/// STUNS/TURNS 默认端口
pub const DEFAULT_TLS_PORT: u16 = 5349;

/// URL 解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IceUrlError {
    #[error("Missing scheme in ICE URL: {url}")]
    MissingScheme { url: String },

    #[error("Unknown ICE URL scheme '{scheme}' in {url}")]
    UnknownScheme { scheme: String, url: String },

    #[error("Empty host in ICE URL: {url}")]
    EmptyHost { url: String },

    #[error("Invalid port '{port}' in ICE URL: {url}")]
    InvalidPort { port: String, url: String },

    #[error("Invalid query '{query}' in ICE URL: {url}")]
    InvalidQuery { query: String, url: String },
}

/// ICE URL 协议族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IceScheme {
    Stun,
    Stuns,
    Turn,
    Turns,
}

impl IceScheme {
    pub fn is_turn(self) -> bool {
        matches!(self, Self::Turn | Self::Turns)
    }

    pub fn is_stun(self) -> bool {
        matches!(self, Self::Stun | Self::Stuns)
    }

    /// TLS 变体（stuns/turns）
    pub fn is_secure(self) -> bool {
        matches!(self, Self::Stuns | Self::Turns)
    }

    fn default_port(self) -> u16 {
        if self.is_secure() {
            DEFAULT_TLS_PORT
        } else {
            DEFAULT_PORT
        }
    }
}

impl FromStr for IceScheme {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stun" => Ok(Self::Stun),
            "stuns" => Ok(Self::Stuns),
            "turn" => Ok(Self::Turn),
            "turns" => Ok(Self::Turns),
            _ => Err(()),
        }
    }
}

/// 传输协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Udp,
    Tcp,
}

/// 解析后的 ICE 服务器 URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IceUrl {
    pub scheme: IceScheme,
    pub host: String,
    pub port: u16,
    pub transport: Transport,
}

impl IceUrl {
    /// 解析 ICE URL
    pub fn parse(raw: &str) -> Result<Self, IceUrlError> {
        let url = raw.trim();
        let (scheme_str, rest) = url.split_once(':').ok_or_else(|| IceUrlError::MissingScheme {
            url: raw.to_string(),
        })?;

        let scheme = scheme_str
            .parse::<IceScheme>()
            .map_err(|_| IceUrlError::UnknownScheme {
                scheme: scheme_str.to_string(),
                url: raw.to_string(),
            })?;

        let (authority, query) = match rest.split_once('?') {
            Some((authority, query)) => (authority, Some(query)),
            None => (rest, None),
        };
        // Browsers tolerate "stun://host"; so do we.
        let authority = authority.trim_start_matches("//");

        let (host, port) = split_host_port(authority, raw)?;
        if host.is_empty() {
            return Err(IceUrlError::EmptyHost {
                url: raw.to_string(),
            });
        }

        let mut transport = if scheme.is_secure() {
            Transport::Tcp
        } else {
            Transport::Udp
        };

        if let Some(query) = query {
            transport = parse_transport(query, raw)?;
        }

        Ok(Self {
            scheme,
            host: host.to_string(),
            port: port.unwrap_or_else(|| scheme.default_port()),
            transport,
        })
    }

    /// `host:port`，IPv6 地址带方括号
    pub fn host_port(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn provider(&self) -> &'static str {
        provider_of(&self.host)
    }
}

impl fmt::Display for IceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.host_port())?;
        if self.scheme.is_turn() {
            write!(f, "?transport={}", self.transport)?;
        }
        Ok(())
    }
}

impl FromStr for IceUrl {
    type Err = IceUrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn split_host_port<'a>(authority: &'a str, raw: &str) -> Result<(&'a str, Option<u16>), IceUrlError> {
    // [v6]:port
    if let Some(stripped) = authority.strip_prefix('[') {
        let (host, tail) = stripped.split_once(']').ok_or_else(|| IceUrlError::EmptyHost {
            url: raw.to_string(),
        })?;
        let port = match tail.strip_prefix(':') {
            Some(port) => Some(parse_port(port, raw)?),
            None if tail.is_empty() => None,
            None => {
                return Err(IceUrlError::InvalidPort {
                    port: tail.to_string(),
                    url: raw.to_string(),
                });
            }
        };
        return Ok((host, port));
    }

    match authority.rsplit_once(':') {
        Some((host, port)) => Ok((host, Some(parse_port(port, raw)?))),
        None => Ok((authority, None)),
    }
}

fn parse_port(port: &str, raw: &str) -> Result<u16, IceUrlError> {
    match port.parse::<u16>() {
        Ok(p) if p != 0 => Ok(p),
        _ => Err(IceUrlError::InvalidPort {
            port: port.to_string(),
            url: raw.to_string(),
        }),
    }
}

fn parse_transport(query: &str, raw: &str) -> Result<Transport, IceUrlError> {
    let invalid = || IceUrlError::InvalidQuery {
        query: query.to_string(),
        url: raw.to_string(),
    };

    let (key, value) = query.split_once('=').ok_or_else(invalid)?;
    if !key.eq_ignore_ascii_case("transport") {
        return Err(invalid());
    }
    match value.to_ascii_lowercase().as_str() {
        "udp" => Ok(Transport::Udp),
        "tcp" => Ok(Transport::Tcp),
        _ => Err(invalid()),
    }
}

/// 根据主机名推断服务提供商
pub fn provider_of(url: &str) -> &'static str {
    const PROVIDERS: [&str; 6] = [
        "google",
        "cloudflare",
        "mozilla",
        "twilio",
        "xirsys",
        "expressturn",
    ];
    let lower = url.to_ascii_lowercase();
    PROVIDERS
        .iter()
        .find(|p| lower.contains(*p))
        .copied()
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stun_without_port() {
        let url = IceUrl::parse("stun:stun.services.mozilla.com").unwrap();
        assert_eq!(url.scheme, IceScheme::Stun);
        assert_eq!(url.host, "stun.services.mozilla.com");
        assert_eq!(url.port, DEFAULT_PORT);
        assert_eq!(url.transport, Transport::Udp);
        assert_eq!(url.provider(), "mozilla");
    }

    #[test]
    fn test_parse_turn_with_transport() {
        let url = IceUrl::parse("turn:bn-turn1.xirsys.com:80?transport=tcp").unwrap();
        assert_eq!(url.scheme, IceScheme::Turn);
        assert_eq!(url.port, 80);
        assert_eq!(url.transport, Transport::Tcp);
        assert_eq!(url.provider(), "xirsys");
        assert_eq!(url.to_string(), "turn:bn-turn1.xirsys.com:80?transport=tcp");
    }

    #[test]
    fn test_parse_turns_defaults() {
        let url = IceUrl::parse("turns:relay.example.org").unwrap();
        assert!(url.scheme.is_turn());
        assert!(url.scheme.is_secure());
        assert_eq!(url.port, DEFAULT_TLS_PORT);
        assert_eq!(url.transport, Transport::Tcp);
    }

    #[test]
    fn test_parse_ipv6_host() {
        let url = IceUrl::parse("stun:[2001:db8::1]:19302").unwrap();
        assert_eq!(url.host, "2001:db8::1");
        assert_eq!(url.port, 19302);
        assert_eq!(url.host_port(), "[2001:db8::1]:19302");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            IceUrl::parse("stun.l.google.com"),
            Err(IceUrlError::UnknownScheme { .. }) | Err(IceUrlError::MissingScheme { .. })
        ));
        assert!(matches!(
            IceUrl::parse("http:example.com"),
            Err(IceUrlError::UnknownScheme { .. })
        ));
        assert!(matches!(
            IceUrl::parse("turn::3478"),
            Err(IceUrlError::EmptyHost { .. })
        ));
        assert!(matches!(
            IceUrl::parse("turn:example.com:99999"),
            Err(IceUrlError::InvalidPort { .. })
        ));
        assert!(matches!(
            IceUrl::parse("turn:example.com?transport=sctp"),
            Err(IceUrlError::InvalidQuery { .. })
        ));
    }

    #[test]
    fn test_provider_detection() {
        assert_eq!(provider_of("stun:stun.l.google.com:19302"), "google");
        assert_eq!(provider_of("turn:relay1.expressturn.com:3480"), "expressturn");
        assert_eq!(provider_of("stun:stun.example.net"), "unknown");
    }
}
