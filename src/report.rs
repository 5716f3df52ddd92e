//! 测试结果汇总
//!
//! 文本格式保持与早期脚本输出一致，便于直接对比历史日志。

use gather::ProbeReport;
use serde::Serialize;
use std::fmt::Write as _;

const RULE_WIDTH: usize = 60;

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub passed: usize,
    pub total: usize,
    /// 百分比，无测试时为 0
    pub success_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub results: Vec<ProbeReport>,
}

impl Summary {
    pub fn from_reports(results: Vec<ProbeReport>) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.success).count();
        let success_rate = if total == 0 {
            0.0
        } else {
            passed as f64 / total as f64 * 100.0
        };
        Self {
            passed,
            total,
            success_rate,
            source: None,
            results,
        }
    }

    pub fn with_source(mut self, source: impl ToString) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// 没有执行任何测试时不算通过
    pub fn all_passed(&self) -> bool {
        self.total > 0 && self.passed == self.total
    }

    pub fn render_text(&self) -> String {
        let rule = "=".repeat(RULE_WIDTH);
        let mut out = String::new();

        // String 写入不会失败
        let _ = writeln!(out, "\n{rule}");
        let _ = writeln!(out, "TURN SERVER TEST SUMMARY");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Tests passed: {}/{}", self.passed, self.total);
        let _ = writeln!(out, "Overall success rate: {:.1}%", self.success_rate);
        let _ = writeln!(out);

        for result in &self.results {
            let status = if result.success { "✅ PASS" } else { "❌ FAIL" };
            let _ = writeln!(out, "{status} {}", result.test_name);
            match &result.error {
                Some(error) => {
                    let _ = writeln!(out, "  Error: {error}");
                }
                None => {
                    let _ = writeln!(out, "  Duration: {:.1}s", result.duration.as_secs_f64());
                    let _ = writeln!(
                        out,
                        "  Candidates: {} total, {} relay",
                        result.total_candidates, result.relay_candidates
                    );
                }
            }
            let _ = writeln!(out);
        }

        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
