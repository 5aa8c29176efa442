use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::topology::TopologyError;

/// Opaque identity of a process, used to query channel information.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub usize);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "process:{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelKind {
    Wan,
    Lan,
    Host,
    Fabric,
}

/// Fan-out/fan-in shape used for one collective step at a level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeShape {
    Flat,
    Binomial,
}

impl LevelKind {
    // latency dominates on the wide area, everything else fans out in log steps
    pub fn default_shape(self) -> TreeShape {
        match self {
            LevelKind::Wan => TreeShape::Flat,
            LevelKind::Lan | LevelKind::Host | LevelKind::Fabric => TreeShape::Binomial,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchKey(pub String);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelLevel {
    pub kind: LevelKind,
    pub key: MatchKey,
}

/// A communication capability reported for a process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Protocol {
    Tcp { hostname: String, lan: String },
    Fabric { session: String },
    Unrecognized(String),
}

pub const TCP_LEVELS: usize = 3;
pub const FABRIC_LEVELS: usize = 1;

impl Protocol {
    pub fn name(&self) -> &str {
        match self {
            Protocol::Tcp { .. } => "tcp",
            Protocol::Fabric { .. } => "fabric",
            Protocol::Unrecognized(kind) => kind.as_str(),
        }
    }

    pub fn level_cost(&self) -> Option<usize> {
        match self {
            Protocol::Tcp { .. } => Some(TCP_LEVELS),
            Protocol::Fabric { .. } => Some(FABRIC_LEVELS),
            Protocol::Unrecognized(_) => None,
        }
    }

    // coarse to fine
    fn push_levels(&self, levels: &mut Vec<ChannelLevel>) {
        match self {
            Protocol::Tcp { hostname, lan } => {
                levels.push(ChannelLevel {
                    kind: LevelKind::Wan,
                    key: MatchKey(String::new()),
                });
                levels.push(ChannelLevel {
                    kind: LevelKind::Lan,
                    key: MatchKey(lan.clone()),
                });
                levels.push(ChannelLevel {
                    kind: LevelKind::Host,
                    key: MatchKey(hostname.clone()),
                });
            }
            Protocol::Fabric { session } => levels.push(ChannelLevel {
                kind: LevelKind::Fabric,
                key: MatchKey(session.clone()),
            }),
            Protocol::Unrecognized(_) => {}
        }
    }
}

/// Expand a process's protocol list into its ordered communication levels.
pub fn expand_levels(
    process: ProcessId,
    protocols: &[Protocol],
) -> Result<Vec<ChannelLevel>, TopologyError> {
    if protocols.is_empty() {
        return Err(TopologyError::MissingChannelInfo(process));
    }
    let mut depth = 0;
    for protocol in protocols {
        depth += protocol
            .level_cost()
            .ok_or_else(|| TopologyError::UnrecognizedProtocol {
                process,
                kind: protocol.name().to_string(),
            })?;
    }
    let mut levels = Vec::with_capacity(depth);
    for protocol in protocols {
        protocol.push_levels(&mut levels);
    }
    debug_assert_eq!(levels.len(), depth);
    Ok(levels)
}

/// Source of per-process channel information.
///
/// Answers must be deterministic and identical at every process of a group
/// for the group's lifetime. Matching must be symmetric and transitive within
/// a level; model construction rejects providers that violate this.
pub trait ChannelInfoProvider {
    fn protocols(&self, process: ProcessId) -> Option<Vec<Protocol>>;

    fn levels(&self, process: ProcessId) -> Result<Vec<ChannelLevel>, TopologyError> {
        let protocols = self
            .protocols(process)
            .ok_or(TopologyError::MissingChannelInfo(process))?;
        expand_levels(process, &protocols)
    }

    fn level_match(&self, a: &ChannelLevel, b: &ChannelLevel) -> bool {
        match a.kind {
            LevelKind::Wan => true,
            LevelKind::Lan | LevelKind::Host | LevelKind::Fabric => a.key == b.key,
        }
    }

    fn tree_shape(&self, kind: LevelKind) -> TreeShape {
        kind.default_shape()
    }
}

/// Channel information fixed up front, e.g. loaded from a topology file.
#[derive(Clone, Debug, Default)]
pub struct StaticChannelInfo {
    protocols: HashMap<ProcessId, Vec<Protocol>>,
    shapes: HashMap<LevelKind, TreeShape>,
}

impl StaticChannelInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, process: ProcessId, protocols: Vec<Protocol>) {
        self.protocols.insert(process, protocols);
    }

    pub fn with_process(mut self, process: ProcessId, protocols: Vec<Protocol>) -> Self {
        self.insert(process, protocols);
        self
    }

    pub fn with_shape(mut self, kind: LevelKind, shape: TreeShape) -> Self {
        self.shapes.insert(kind, shape);
        self
    }

    pub fn num_processes(&self) -> usize {
        self.protocols.len()
    }
}

impl ChannelInfoProvider for StaticChannelInfo {
    fn protocols(&self, process: ProcessId) -> Option<Vec<Protocol>> {
        self.protocols.get(&process).cloned()
    }

    fn tree_shape(&self, kind: LevelKind) -> TreeShape {
        self.shapes
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.default_shape())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp(host: &str, lan: &str) -> Protocol {
        Protocol::Tcp {
            hostname: host.to_string(),
            lan: lan.to_string(),
        }
    }

    #[test]
    fn tcp_and_fabric_expand_coarse_to_fine() {
        let protocols = vec![
            tcp("h0", "l0"),
            Protocol::Fabric {
                session: "s0".to_string(),
            },
        ];
        let levels = expand_levels(ProcessId(0), &protocols).unwrap();
        let kinds: Vec<_> = levels.iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LevelKind::Wan,
                LevelKind::Lan,
                LevelKind::Host,
                LevelKind::Fabric
            ]
        );
        assert_eq!(levels[2].key, MatchKey("h0".to_string()));
    }

    #[test]
    fn unrecognized_protocol_is_rejected() {
        let protocols = vec![tcp("h0", "l0"), Protocol::Unrecognized("udt".to_string())];
        let err = expand_levels(ProcessId(3), &protocols).unwrap_err();
        assert!(matches!(
            err,
            TopologyError::UnrecognizedProtocol { process: ProcessId(3), ref kind } if kind == "udt"
        ));
    }

    #[test]
    fn missing_process_is_rejected() {
        let info = StaticChannelInfo::new().with_process(ProcessId(0), vec![tcp("h", "l")]);
        assert!(matches!(
            info.levels(ProcessId(1)),
            Err(TopologyError::MissingChannelInfo(ProcessId(1)))
        ));
    }

    #[test]
    fn wan_always_matches() {
        let info = StaticChannelInfo::new();
        let a = ChannelLevel {
            kind: LevelKind::Wan,
            key: MatchKey("x".to_string()),
        };
        let b = ChannelLevel {
            kind: LevelKind::Wan,
            key: MatchKey("y".to_string()),
        };
        assert!(info.level_match(&a, &b));
        let c = ChannelLevel {
            kind: LevelKind::Lan,
            key: MatchKey("x".to_string()),
        };
        let d = ChannelLevel {
            kind: LevelKind::Lan,
            key: MatchKey("y".to_string()),
        };
        assert!(!info.level_match(&c, &d));
    }

    #[test]
    fn shape_overrides() {
        let info = StaticChannelInfo::new().with_shape(LevelKind::Lan, TreeShape::Flat);
        assert_eq!(info.tree_shape(LevelKind::Lan), TreeShape::Flat);
        assert_eq!(info.tree_shape(LevelKind::Wan), TreeShape::Flat);
        assert_eq!(info.tree_shape(LevelKind::Host), TreeShape::Binomial);
    }
}
