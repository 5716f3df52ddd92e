//! 使用真实 webrtc-rs 会话的收集测试

use gather::{
    CandidateKind, ProbeOptions, TestVariant, VariantKind, WebRtcSessionFactory, run_probe,
};
use std::time::Duration;
use turnprobe_common::{IceServer, TransportPolicy};

#[tokio::test(flavor = "multi_thread")]
async fn test_stun_only_gathering_completes_with_local_candidates() -> anyhow::Result<()> {
    let factory = WebRtcSessionFactory::new()?;
    // 本地没有 STUN 服务，srflx 请求超时后收集仍应正常结束
    let variant = TestVariant::new(
        VariantKind::StunOnly,
        vec![IceServer::new(["stun:127.0.0.1:3478"])],
        TransportPolicy::All,
    );
    let options = ProbeOptions {
        gather_timeout: Duration::from_secs(10),
        poll_interval: Duration::from_millis(100),
        settle_delay: Duration::from_millis(200),
    };

    let report = run_probe(&factory, &variant, &options).await;

    assert!(!report.timed_out, "gathering did not complete: {report:?}");
    assert!(report.error.is_none(), "unexpected error: {:?}", report.error);
    assert!(report.total_candidates > 0);
    assert_eq!(report.total_candidates, report.candidates.len());
    assert_eq!(report.relay_candidates, 0);
    assert!(
        report
            .candidates
            .iter()
            .all(|c| matches!(c.kind, CandidateKind::Host | CandidateKind::Srflx)),
        "unexpected candidate kinds: {:?}",
        report.candidates
    );
    Ok(())
}
