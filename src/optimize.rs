//! STUN 服务器优选
//!
//! 并行向每个 STUN URL 发送 Binding 请求，按往返时延排序后保留最快的若干个。
//! 配置了优选 worker 时先向其索取候选列表，再在本地验证。

use crate::error::Result;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::time::Duration;
use strum::Display;
use tracing::{debug, info, warn};
use turnprobe_common::config::OptimizerConfig;
use turnprobe_common::ice::{IceScheme, Transport};
use turnprobe_common::{IceServer, IceUrl, RtcConfigDocument};

/// 单个服务器的测试结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Connected,
    Failed,
    Timeout,
}

#[derive(Debug, Clone, Serialize)]
pub struct StunTestResult {
    pub url: String,
    /// 超时时等于超时时间
    pub latency_ms: u64,
    pub status: TestStatus,
    pub provider: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped_address: Option<SocketAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StunTestResult {
    fn failed(url: &str, latency: Duration, error: impl ToString) -> Self {
        Self {
            url: url.to_string(),
            latency_ms: latency.as_millis() as u64,
            status: TestStatus::Failed,
            provider: turnprobe_common::ice::provider_of(url),
            mapped_address: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedStunConfig {
    pub ice_servers: Vec<IceServer>,
    /// 仅包含连通的结果
    pub test_results: Vec<StunTestResult>,
    pub timestamp: String,
    pub is_optimized: bool,
}

impl OptimizedStunConfig {
    pub fn render_text(&self, all_results: &[StunTestResult]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "STUN latency results:");
        for r in all_results {
            let _ = match r.status {
                TestStatus::Connected => writeln!(
                    out,
                    "  ✅ {:<48} {:>6}ms  {}",
                    r.url, r.latency_ms, r.provider
                ),
                _ => writeln!(
                    out,
                    "  ❌ {:<48} {:>8}  {}",
                    r.url,
                    r.status,
                    r.error.as_deref().unwrap_or("")
                ),
            };
        }
        let _ = writeln!(out);
        if self.is_optimized {
            let _ = writeln!(out, "Selected servers:");
        } else {
            let _ = writeln!(out, "No server responded, keeping input servers:");
        }
        for server in &self.ice_servers {
            let _ = writeln!(out, "  {}", server.urls.join(", "));
        }
        out
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkerRequest<'a> {
    region: &'a str,
    max_servers: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkerResponse {
    #[serde(default)]
    ice_servers: Vec<IceServer>,
}

pub struct StunOptimizer {
    config: OptimizerConfig,
    client: reqwest::Client,
}

impl StunOptimizer {
    pub fn new(config: OptimizerConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { config, client })
    }

    /// 测试单个 STUN URL
    pub async fn test_server(&self, raw_url: &str) -> StunTestResult {
        let url = match IceUrl::parse(raw_url) {
            Ok(url) => url,
            Err(e) => return StunTestResult::failed(raw_url, Duration::ZERO, e),
        };

        if url.scheme != IceScheme::Stun || url.transport != Transport::Udp {
            return StunTestResult::failed(
                raw_url,
                Duration::ZERO,
                stun::StunError::UnsupportedTransport {
                    url: raw_url.to_string(),
                },
            );
        }

        let server = match stun::resolve_server(&url.host_port()).await {
            Ok(addr) => addr,
            Err(e) => return StunTestResult::failed(raw_url, Duration::ZERO, e),
        };

        let timeout = self.config.timeout();
        match stun::binding_request(server, timeout).await {
            Ok(response) => {
                debug!(
                    "{} answered in {:?} (mapped {})",
                    raw_url, response.rtt, response.mapped_address
                );
                StunTestResult {
                    url: raw_url.to_string(),
                    latency_ms: response.rtt.as_millis() as u64,
                    status: TestStatus::Connected,
                    provider: url.provider(),
                    mapped_address: Some(response.mapped_address),
                    error: None,
                }
            }
            Err(e) if e.is_timeout() => StunTestResult {
                status: TestStatus::Timeout,
                ..StunTestResult::failed(raw_url, timeout, "Connection timeout")
            },
            Err(e) => StunTestResult::failed(raw_url, Duration::ZERO, e),
        }
    }

    /// 并行测试
    pub async fn test_servers(&self, urls: &[String]) -> Vec<StunTestResult> {
        join_all(urls.iter().map(|url| self.test_server(url))).await
    }

    /// 向优选 worker 索取服务器列表，失败时返回空列表
    pub async fn worker_servers(&self) -> Vec<IceServer> {
        let Some(base) = &self.config.worker_url else {
            return Vec::new();
        };
        let endpoint = format!("{}/api/optimize", base.trim_end_matches('/'));

        let request = WorkerRequest {
            region: "auto",
            max_servers: self.config.max_servers,
        };
        let response = async {
            self.client
                .post(&endpoint)
                .json(&request)
                .send()
                .await?
                .error_for_status()?
                .json::<WorkerResponse>()
                .await
        }
        .await;

        match response {
            Ok(body) => {
                info!("Optimizer worker returned {} servers", body.ice_servers.len());
                body.ice_servers
            }
            Err(e) => {
                warn!("Failed to get optimized servers from worker: {}", e);
                Vec::new()
            }
        }
    }

    /// 对文档中的 STUN 服务器做优选
    pub async fn optimize(&self, doc: &RtcConfigDocument) -> (OptimizedStunConfig, Vec<StunTestResult>) {
        let worker_servers = self.worker_servers().await;
        let from_worker = !worker_servers.is_empty();

        let candidates = if from_worker {
            RtcConfigDocument::new(worker_servers).stun_only().flatten()
        } else {
            doc.stun_only().flatten()
        };
        let urls: Vec<String> = candidates.iter().flat_map(|s| s.urls.clone()).collect();
        info!("Testing {} STUN servers in parallel", urls.len());

        let results = self.test_servers(&urls).await;

        let mut connected: Vec<StunTestResult> = results
            .iter()
            .filter(|r| r.status == TestStatus::Connected)
            .cloned()
            .collect();
        connected.sort_by_key(|r| r.latency_ms);

        let ice_servers = if from_worker {
            candidates
        } else {
            let best: Vec<IceServer> = connected
                .iter()
                .take(self.config.max_servers)
                .map(|r| IceServer::new([r.url.clone()]))
                .collect();
            if best.is_empty() { candidates } else { best }
        };

        let config = OptimizedStunConfig {
            ice_servers,
            is_optimized: !connected.is_empty(),
            test_results: connected,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (config, results)
    }
}
