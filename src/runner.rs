//! 依次执行测试计划中的各个变体

use gather::{ProbeOptions, ProbeReport, SessionFactory, TestVariant, run_probe};
use std::sync::Arc;
use tracing::{Instrument, info, info_span};

pub struct ProbeRunner {
    factory: Arc<dyn SessionFactory>,
    options: ProbeOptions,
}

impl ProbeRunner {
    pub fn new(factory: Arc<dyn SessionFactory>, options: ProbeOptions) -> Self {
        Self { factory, options }
    }

    /// 顺序执行，变体之间互不干扰（每个变体使用独立的 PeerConnection）
    pub async fn run(&self, plan: &[TestVariant]) -> Vec<ProbeReport> {
        info!("Starting TURN server connectivity tests ({} variants)", plan.len());

        let mut reports = Vec::with_capacity(plan.len());
        for (index, variant) in plan.iter().enumerate() {
            let span = info_span!("probe", variant = %variant.name, index);
            let report = run_probe(self.factory.as_ref(), variant, &self.options)
                .instrument(span)
                .await;
            reports.push(report);
        }
        reports
    }
}
