//! 测试变体与测试计划
//!
//! 同一份 ICE 配置按不同方式拆分后分别探测，用来区分“整体可用”与
//! “TURN 中继可用”“STUN 可用”：
//!
//! | 变体            | 服务器           | 传输策略     | 成功条件        |
//! |-----------------|------------------|--------------|-----------------|
//! | Full Config     | 全部             | 文档指定     | 任意候选        |
//! | Relay Forced    | 全部             | relay        | 至少一个 relay  |
//! | TURN-Only       | 仅 turn/turns    | all          | 至少一个 relay  |
//! | STUN-Only       | 仅 stun/stuns    | all          | 任意候选        |

use crate::error::GatherError;
use std::str::FromStr;
use strum::Display;
use tracing::debug;
use turnprobe_common::{IceServer, RtcConfigDocument, TransportPolicy};

/// 变体种类，配置与命令行中使用短名（`full`、`relay-forced`…）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum VariantKind {
    #[strum(to_string = "Full Config")]
    Full,
    #[strum(to_string = "Relay Forced")]
    RelayForced,
    #[strum(to_string = "TURN-Only")]
    TurnOnly,
    #[strum(to_string = "STUN-Only")]
    StunOnly,
}

impl VariantKind {
    pub const ALL: [VariantKind; 4] = [
        VariantKind::Full,
        VariantKind::RelayForced,
        VariantKind::TurnOnly,
        VariantKind::StunOnly,
    ];

    pub fn short_name(self) -> &'static str {
        match self {
            VariantKind::Full => "full",
            VariantKind::RelayForced => "relay-forced",
            VariantKind::TurnOnly => "turn-only",
            VariantKind::StunOnly => "stun-only",
        }
    }

    /// 解析一组短名；空列表表示全部变体
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<Self>, GatherError> {
        if names.is_empty() {
            return Ok(Self::ALL.to_vec());
        }
        let mut kinds = Vec::with_capacity(names.len());
        for name in names {
            let kind = name.as_ref().parse()?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }
}

impl FromStr for VariantKind {
    type Err = GatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.short_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| GatherError::UnknownVariant(s.to_string()))
    }
}

/// 一次候选收集测试的输入
#[derive(Debug, Clone, PartialEq)]
pub struct TestVariant {
    pub kind: VariantKind,
    /// 报告中显示的名称
    pub name: String,
    pub servers: Vec<IceServer>,
    pub policy: TransportPolicy,
    /// true 时只有 relay 候选才算成功
    pub require_relay: bool,
}

impl TestVariant {
    pub fn new(kind: VariantKind, servers: Vec<IceServer>, policy: TransportPolicy) -> Self {
        let require_relay = match kind {
            VariantKind::RelayForced | VariantKind::TurnOnly => true,
            VariantKind::Full => policy == TransportPolicy::Relay,
            VariantKind::StunOnly => false,
        };
        Self {
            kind,
            name: kind.to_string(),
            servers,
            policy,
            require_relay,
        }
    }

    pub fn url_count(&self) -> usize {
        self.servers.iter().map(|s| s.urls.len()).sum()
    }
}

/// 按 `kinds` 的顺序为 `doc` 生成测试计划
///
/// 拆分后为空的变体被跳过（例如纯 STUN 配置没有 TURN-Only 与 Relay Forced）。
pub fn build_plan(doc: &RtcConfigDocument, kinds: &[VariantKind]) -> Vec<TestVariant> {
    let mut plan = Vec::with_capacity(kinds.len());

    for &kind in kinds {
        let variant = match kind {
            VariantKind::Full => Some(TestVariant::new(
                kind,
                doc.ice_servers.clone(),
                doc.transport_policy(),
            )),
            VariantKind::RelayForced => doc.has_turn().then(|| {
                TestVariant::new(kind, doc.ice_servers.clone(), TransportPolicy::Relay)
            }),
            VariantKind::TurnOnly => non_empty(doc.turn_only())
                .map(|d| TestVariant::new(kind, d.ice_servers, TransportPolicy::All)),
            VariantKind::StunOnly => non_empty(doc.stun_only())
                .map(|d| TestVariant::new(kind, d.ice_servers, TransportPolicy::All)),
        };

        match variant {
            Some(v) if !v.servers.is_empty() => plan.push(v),
            _ => debug!("Skipping {} test: no matching ICE servers", kind),
        }
    }

    plan
}

fn non_empty(doc: RtcConfigDocument) -> Option<RtcConfigDocument> {
    (!doc.ice_servers.is_empty()).then_some(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed_document() -> RtcConfigDocument {
        RtcConfigDocument::new(vec![
            IceServer::new(["stun:stun.example.org:3478"]),
            IceServer::new([
                "turn:relay.example.org:3478?transport=udp",
                "turns:relay.example.org:5349?transport=tcp",
                "stun:relay.example.org:3478",
            ])
            .with_credentials("user", "pass"),
        ])
    }

    #[test]
    fn test_variant_names() {
        assert_eq!(VariantKind::Full.to_string(), "Full Config");
        assert_eq!(VariantKind::TurnOnly.to_string(), "TURN-Only");
        assert_eq!("relay-forced".parse::<VariantKind>().unwrap(), VariantKind::RelayForced);
        assert_eq!(" STUN-ONLY ".parse::<VariantKind>().unwrap(), VariantKind::StunOnly);
        assert!(matches!(
            "sideways".parse::<VariantKind>(),
            Err(GatherError::UnknownVariant(_))
        ));
    }

    #[test]
    fn test_parse_list_defaults_and_dedups() {
        let empty: [&str; 0] = [];
        assert_eq!(VariantKind::parse_list(&empty).unwrap(), VariantKind::ALL.to_vec());
        assert_eq!(
            VariantKind::parse_list(&["turn-only", "full", "turn-only"]).unwrap(),
            vec![VariantKind::TurnOnly, VariantKind::Full]
        );
    }

    #[test]
    fn test_full_plan_for_mixed_document() {
        let plan = build_plan(&mixed_document(), &VariantKind::ALL);
        let names: Vec<_> = plan.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["Full Config", "Relay Forced", "TURN-Only", "STUN-Only"]);

        let full = &plan[0];
        assert_eq!(full.url_count(), 4);
        assert_eq!(full.policy, TransportPolicy::All);
        assert!(!full.require_relay);

        let forced = &plan[1];
        assert_eq!(forced.policy, TransportPolicy::Relay);
        assert!(forced.require_relay);

        let turn_only = &plan[2];
        assert_eq!(turn_only.url_count(), 2);
        assert!(turn_only.require_relay);
        assert_eq!(turn_only.servers[0].username.as_deref(), Some("user"));

        let stun_only = &plan[3];
        assert_eq!(stun_only.url_count(), 2);
        assert!(!stun_only.require_relay);
    }

    #[test]
    fn test_stun_only_document_skips_relay_variants() {
        let doc = RtcConfigDocument::new(vec![IceServer::new(["stun:stun.example.org"])]);
        let plan = build_plan(&doc, &VariantKind::ALL);
        let kinds: Vec<_> = plan.iter().map(|v| v.kind).collect();
        assert_eq!(kinds, [VariantKind::Full, VariantKind::StunOnly]);
    }

    #[test]
    fn test_relay_policy_document_requires_relay_for_full() {
        let mut doc = mixed_document();
        doc.ice_transport_policy = Some(TransportPolicy::Relay);
        let plan = build_plan(&doc, &[VariantKind::Full]);
        assert_eq!(plan.len(), 1);
        assert!(plan[0].require_relay);
    }
}
