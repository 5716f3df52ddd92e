//! 把 ICE 配置文件转换为 `RTC_CONFIG` 环境变量值

use crate::error::{Error, Result};
use base64::prelude::*;
use std::path::Path;
use tracing::{info, warn};
use turnprobe_common::RtcConfigDocument;
use turnprobe_common::ice::parse_config_payload;

#[derive(Debug, Clone)]
pub struct Conversion {
    pub document: RtcConfigDocument,
    /// 压缩后的原始 JSON
    pub minified: String,
    pub encoded: String,
}

impl Conversion {
    /// shell 可直接使用的赋值语句
    pub fn env_assignment(&self, var: &str) -> String {
        format!("{var}=\"{}\"", self.encoded)
    }
}

/// 校验并编码 JSON 文本
///
/// 编码的是输入 JSON 本身（去掉空白），不是解析后的规范化形式，
/// 因此 provider 的附加字段会原样保留。
pub fn encode_config(content: &str) -> Result<Conversion> {
    let document = parse_config_payload(content)?;

    if let Err(issues) = document.validate() {
        for issue in &issues {
            warn!("{}", issue);
        }
        if RtcConfigDocument::has_fatal_issues(&issues) {
            let fatal: Vec<&str> = issues
                .iter()
                .filter(|i| !i.starts_with("Warning:"))
                .map(String::as_str)
                .collect();
            return Err(Error::validation(format!(
                "{} problem(s) found in ICE configuration: {}",
                fatal.len(),
                fatal.join("; ")
            )));
        }
    }

    let value: serde_json::Value = serde_json::from_str(content)?;
    let minified = serde_json::to_string(&value)?;
    let encoded = BASE64_STANDARD.encode(&minified);

    for server in document.flatten() {
        info!("Added ICE server: {}", server.urls.join(", "));
    }

    Ok(Conversion {
        document,
        minified,
        encoded,
    })
}

pub fn convert_file(path: &Path) -> Result<Conversion> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::custom(format!("Failed to read {}: {e}", path.display()))
    })?;
    encode_config(&content)
}
