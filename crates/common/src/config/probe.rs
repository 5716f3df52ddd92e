use serde::{Deserialize, Serialize};
use std::time::Duration;

/// ICE 候选收集探测参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSettings {
    /// 等待 ICE 收集完成的最长时间（毫秒）
    #[serde(default = "default_gather_timeout_ms")]
    pub gather_timeout_ms: u64,

    /// 轮询收集状态的间隔（毫秒）
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// 收集结束后继续等待迟到候选的时间（毫秒）
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// 要执行的测试变体，留空表示全部
    ///
    /// 可选值：full, relay-forced, turn-only, stun-only
    #[serde(default)]
    pub variants: Vec<String>,

    /// 任一变体失败时以非零状态退出
    #[serde(default)]
    pub strict: bool,
}

pub const VARIANT_NAMES: [&str; 4] = ["full", "relay-forced", "turn-only", "stun-only"];

fn default_gather_timeout_ms() -> u64 {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_settle_delay_ms() -> u64 {
    2_000
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            gather_timeout_ms: default_gather_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            variants: Vec::new(),
            strict: false,
        }
    }
}

impl ProbeSettings {
    pub fn gather_timeout(&self) -> Duration {
        Duration::from_millis(self.gather_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub(crate) fn collect_issues(&self, errors: &mut Vec<String>) {
        if self.gather_timeout_ms == 0 {
            errors.push("probe.gather_timeout_ms must be greater than 0".to_string());
        }
        if self.poll_interval_ms == 0 {
            errors.push("probe.poll_interval_ms must be greater than 0".to_string());
        } else if self.poll_interval_ms > self.gather_timeout_ms {
            errors.push(format!(
                "Warning: probe.poll_interval_ms ({}) exceeds gather_timeout_ms ({})",
                self.poll_interval_ms, self.gather_timeout_ms
            ));
        }
        for variant in &self.variants {
            if !VARIANT_NAMES.contains(&variant.as_str()) {
                errors.push(format!(
                    "Unknown probe variant '{variant}', must be one of: {}",
                    VARIANT_NAMES.join(", ")
                ));
            }
        }
    }
}
