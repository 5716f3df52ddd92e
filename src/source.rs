//! ICE 配置来源
//!
//! 按 URL → 环境变量（base64 JSON）→ 本地文件的顺序尝试，第一个成功的来源生效。
//! 全部失败时可退回内置的公共 STUN 配置。

use crate::error::{Error, Result};
use base64::prelude::*;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use turnprobe_common::config::SourceConfig;
use turnprobe_common::ice::{fallback_stun_document, parse_config_payload};
use turnprobe_common::{ConfigError, RtcConfigDocument};

/// 单个配置来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Url(String),
    Env(String),
    File(PathBuf),
    Fallback,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Url(url) => write!(f, "url {url}"),
            ConfigSource::Env(var) => write!(f, "env ${var}"),
            ConfigSource::File(path) => write!(f, "file {}", path.display()),
            ConfigSource::Fallback => write!(f, "built-in STUN fallback"),
        }
    }
}

/// 加载结果
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub source: ConfigSource,
    pub document: RtcConfigDocument,
}

pub struct SourceLoader {
    config: SourceConfig,
    client: reqwest::Client,
}

impl SourceLoader {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .build()?;
        Ok(Self { config, client })
    }

    /// 按尝试顺序列出已配置的来源（不含兜底）
    pub fn sources(&self) -> Vec<ConfigSource> {
        let mut sources = Vec::with_capacity(3);
        if let Some(url) = &self.config.url {
            sources.push(ConfigSource::Url(url.clone()));
        }
        if !self.config.env_var.trim().is_empty() {
            sources.push(ConfigSource::Env(self.config.env_var.clone()));
        }
        if let Some(path) = &self.config.file {
            sources.push(ConfigSource::File(path.clone()));
        }
        sources
    }

    pub async fn load(&self) -> Result<LoadedConfig> {
        let mut failures = Vec::new();

        for source in self.sources() {
            match self.load_from(&source).await {
                Ok(document) => {
                    info!(
                        "Loaded ICE configuration from {} ({} servers, {} URLs)",
                        source,
                        document.ice_servers.len(),
                        document.url_count()
                    );
                    return Ok(LoadedConfig { source, document });
                }
                Err(e) => {
                    warn!("Failed to load ICE configuration from {}: {}", source, e);
                    failures.push(format!("{source}: {e}"));
                }
            }
        }

        if self.config.use_fallback {
            warn!("Using built-in public STUN servers, TURN cannot be tested");
            return Ok(LoadedConfig {
                source: ConfigSource::Fallback,
                document: fallback_stun_document(),
            });
        }

        if failures.is_empty() {
            return Err(Error::unavailable("no configuration source is configured"));
        }
        Err(Error::unavailable(failures.join("; ")))
    }

    async fn load_from(&self, source: &ConfigSource) -> Result<RtcConfigDocument> {
        let document = match source {
            ConfigSource::Url(url) => self.fetch(url).await?,
            ConfigSource::Env(var) => {
                let raw = std::env::var(var).map_err(|_| ConfigError::EnvError { var: var.clone() })?;
                parse_config_payload(&decode_env_value(var, &raw)?)?
            }
            ConfigSource::File(path) => {
                if !path.is_file() {
                    return Err(ConfigError::FileNotFound {
                        path: path.display().to_string(),
                    }
                    .into());
                }
                parse_config_payload(&tokio::fs::read_to_string(path).await?)?
            }
            ConfigSource::Fallback => fallback_stun_document(),
        };

        check_document(&document)?;
        Ok(document)
    }

    async fn fetch(&self, url: &str) -> Result<RtcConfigDocument> {
        debug!("Fetching ICE configuration from {}", url);
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(parse_config_payload(&body)?)
    }
}

/// 解码环境变量中的 base64 JSON
pub fn decode_env_value(var: &str, raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: var.to_string(),
            value: "environment variable is empty".to_string(),
        }
        .into());
    }

    let bytes = BASE64_STANDARD.decode(trimmed)?;
    let decoded = String::from_utf8(bytes).map_err(|e| ConfigError::InvalidValue {
        field: var.to_string(),
        value: format!("decoded value is not UTF-8: {e}"),
    })?;

    if decoded.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: var.to_string(),
            value: "decodes to empty string".to_string(),
        }
        .into());
    }
    Ok(decoded)
}

/// 记录警告，遇到致命问题时返回错误
fn check_document(document: &RtcConfigDocument) -> Result<()> {
    let Err(issues) = document.validate() else {
        return Ok(());
    };

    let mut fatal = Vec::new();
    for issue in issues {
        if issue.starts_with("Warning:") {
            warn!("{}", issue);
        } else {
            fatal.push(issue);
        }
    }

    if fatal.is_empty() {
        Ok(())
    } else {
        Err(Error::validation(fatal.join("; ")))
    }
}
