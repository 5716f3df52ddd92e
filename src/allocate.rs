//! TURN 分配检查
//!
//! 对配置中的每个 TURN URL 执行一次 Allocate，汇总为可打印的结果。

use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};
use turn::{TurnError, TurnTarget, probe_allocation};
use turnprobe_common::ice::Transport;
use turnprobe_common::{IceScheme, IceUrl, RtcConfigDocument};

/// 单个 TURN URL 的分配结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationResult {
    pub url: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relayed_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AllocationResult {
    fn failed(url: &str, error: impl ToString) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            relayed_address: None,
            mapped_address: None,
            duration_ms: None,
            error: Some(error.to_string()),
        }
    }
}

/// 把文档中的 TURN URL 展开为探测目标，重复 URL 只保留一次
///
/// 非 UDP 的 URL 直接给出 `UnsupportedTransport`。
pub fn plan_targets(doc: &RtcConfigDocument) -> Vec<(String, Result<TurnTarget, String>)> {
    let mut seen = Vec::new();
    let mut targets = Vec::new();

    for server in &doc.ice_servers {
        for raw in &server.urls {
            if seen.contains(raw) {
                continue;
            }
            let parsed = match IceUrl::parse(raw) {
                Ok(url) => url,
                Err(e) => {
                    seen.push(raw.clone());
                    targets.push((raw.clone(), Err(e.to_string())));
                    continue;
                }
            };
            if !parsed.scheme.is_turn() {
                continue;
            }
            seen.push(raw.clone());

            if parsed.scheme == IceScheme::Turns || parsed.transport != Transport::Udp {
                let err = TurnError::UnsupportedTransport { url: raw.clone() };
                targets.push((raw.clone(), Err(err.to_string())));
                continue;
            }

            targets.push((
                raw.clone(),
                Ok(TurnTarget::new(
                    parsed.host_port(),
                    server.username.clone().unwrap_or_default(),
                    server.credential.clone().unwrap_or_default(),
                )),
            ));
        }
    }

    targets
}

/// 依次探测所有 TURN URL
pub async fn check_all(doc: &RtcConfigDocument, timeout: Duration) -> Vec<AllocationResult> {
    let mut results = Vec::new();

    for (url, target) in plan_targets(doc) {
        let target = match target {
            Ok(target) => target,
            Err(reason) => {
                warn!("Skipping {}: {}", url, reason);
                results.push(AllocationResult::failed(&url, reason));
                continue;
            }
        };

        info!("Allocating relay on {} ({})", url, target.server);
        let result = match probe_allocation(&target, timeout).await {
            Ok(report) => AllocationResult {
                url,
                success: true,
                relayed_address: Some(report.relayed_address.to_string()),
                mapped_address: report.mapped_address.map(|addr| addr.to_string()),
                duration_ms: Some(report.duration.as_millis() as u64),
                error: None,
            },
            Err(e) => {
                warn!("Allocation via {} failed: {}", url, e);
                AllocationResult::failed(&url, e)
            }
        };
        results.push(result);
    }

    results
}

pub fn render_text(results: &[AllocationResult]) -> String {
    let rule = "=".repeat(60);
    let passed = results.iter().filter(|r| r.success).count();
    let mut out = format!("\n{rule}\nTURN ALLOCATION SUMMARY\n{rule}\n");
    out.push_str(&format!("Allocations succeeded: {}/{}\n\n", passed, results.len()));

    for result in results {
        if result.success {
            out.push_str(&format!("✅ {}\n", result.url));
            if let Some(relayed) = &result.relayed_address {
                out.push_str(&format!("  Relayed address: {relayed}\n"));
            }
            if let Some(mapped) = &result.mapped_address {
                out.push_str(&format!("  Mapped address: {mapped}\n"));
            }
            if let Some(ms) = result.duration_ms {
                out.push_str(&format!("  Duration: {ms}ms\n"));
            }
        } else {
            out.push_str(&format!("❌ {}\n", result.url));
            if let Some(error) = &result.error {
                out.push_str(&format!("  Error: {error}\n"));
            }
        }
    }

    if results.is_empty() {
        out.push_str("No TURN URLs in configuration\n");
    }
    out
}
