//! 收集到的 ICE 候选

use serde::Serialize;
use std::fmt;
use strum::{Display, EnumString};

/// 候选类型（RFC 8445 §5.1.1）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    Host,
    Srflx,
    Prflx,
    Relay,
    Unknown,
}

impl CandidateKind {
    /// 未识别的类型归为 Unknown
    pub fn from_type_name(name: &str) -> Self {
        name.parse().unwrap_or(Self::Unknown)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatheredCandidate {
    pub kind: CandidateKind,
    pub address: String,
    pub port: u16,
    /// "udp" / "tcp"
    pub protocol: String,
}

impl GatheredCandidate {
    pub fn new(kind: CandidateKind, address: impl Into<String>, port: u16) -> Self {
        Self {
            kind,
            address: address.into(),
            port,
            protocol: "udp".to_string(),
        }
    }

    pub fn is_relay(&self) -> bool {
        self.kind == CandidateKind::Relay
    }
}

impl fmt::Display for GatheredCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address.contains(':') {
            write!(f, "{} - [{}]:{}", self.kind, self.address, self.port)
        } else {
            write!(f, "{} - {}:{}", self.kind, self.address, self.port)
        }
    }
}
