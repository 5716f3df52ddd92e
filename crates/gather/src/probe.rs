//! 候选收集探测循环

use crate::candidate::GatheredCandidate;
use crate::plan::TestVariant;
use crate::session::{GatheringState, SessionFactory};
use serde::{Serialize, Serializer};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{error, info, warn};
use turnprobe_common::config::ProbeSettings;

/// 探测时间参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    /// 等待收集完成的上限，超时不算错误
    pub gather_timeout: Duration,
    /// 轮询收集状态的间隔
    pub poll_interval: Duration,
    /// 收集结束后继续等待迟到候选的时间
    pub settle_delay: Duration,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            gather_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
            settle_delay: Duration::from_secs(2),
        }
    }
}

impl From<&ProbeSettings> for ProbeOptions {
    fn from(settings: &ProbeSettings) -> Self {
        Self {
            gather_timeout: settings.gather_timeout(),
            poll_interval: settings.poll_interval(),
            settle_delay: settings.settle_delay(),
        }
    }
}

/// 单个测试变体的结果
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub test_name: String,
    pub success: bool,
    #[serde(rename = "duration_secs", serialize_with = "as_secs_f64")]
    pub duration: Duration,
    pub total_candidates: usize,
    pub relay_candidates: usize,
    pub candidates: Vec<GatheredCandidate>,
    /// 收集在超时前未进入 complete
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn as_secs_f64<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl ProbeReport {
    /// 会话无法建立时的结果
    pub fn failed(variant: &TestVariant, error: impl ToString) -> Self {
        Self {
            test_name: variant.name.clone(),
            success: false,
            duration: Duration::ZERO,
            total_candidates: 0,
            relay_candidates: 0,
            candidates: Vec::new(),
            timed_out: false,
            error: Some(error.to_string()),
        }
    }
}

/// 对一个变体执行完整的收集探测
///
/// 错误不会向上传播，而是体现在返回的报告中，便于连续执行多个变体。
pub async fn run_probe(
    factory: &dyn SessionFactory,
    variant: &TestVariant,
    options: &ProbeOptions,
) -> ProbeReport {
    info!("Starting {} test...", variant.name);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let session = match factory.open(variant, tx).await {
        Ok(session) => session,
        Err(e) => {
            error!("Error in {}: {}", variant.name, e);
            return ProbeReport::failed(variant, e);
        }
    };

    let started = Instant::now();
    let deadline = started + options.gather_timeout;
    let mut timed_out = false;
    while session.gathering_state() != GatheringState::Complete {
        if Instant::now() >= deadline {
            timed_out = true;
            warn!(
                "{}: ICE gathering did not complete within {:?}",
                variant.name, options.gather_timeout
            );
            break;
        }
        tokio::time::sleep(options.poll_interval).await;
    }

    info!("Final ICE gathering state: {}", session.gathering_state());
    info!("ICE connection state: {}", session.connection_state());

    tokio::time::sleep(options.settle_delay).await;

    if let Err(e) = session.close().await {
        warn!("{}: {}", variant.name, e);
    }
    let duration = started.elapsed();
    drop(session);

    let mut candidates = Vec::new();
    while let Ok(candidate) = rx.try_recv() {
        candidates.push(candidate);
    }
    let relay_candidates = candidates.iter().filter(|c| c.is_relay()).count();

    let success = if variant.require_relay {
        relay_candidates > 0
    } else {
        !candidates.is_empty()
    };

    if success {
        info!(
            "{}: Found {} candidates ({} relay)",
            variant.name,
            candidates.len(),
            relay_candidates
        );
    } else {
        warn!("{}: No suitable candidates found", variant.name);
    }

    ProbeReport {
        test_name: variant.name.clone(),
        success,
        duration,
        total_candidates: candidates.len(),
        relay_candidates,
        candidates,
        timed_out,
        error: None,
    }
}
