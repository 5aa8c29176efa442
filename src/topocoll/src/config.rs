use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channel::{LevelKind, ProcessId, Protocol, StaticChannelInfo, TreeShape};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Reading topology file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parsing topology file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("{process}: {kind} protocol is missing `{field}`")]
    MissingField {
        process: ProcessId,
        kind: String,
        field: &'static str,
    },
    #[error("{0} is listed more than once")]
    DuplicateProcess(ProcessId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolConfig {
    pub kind: String,
    pub hostname: Option<String>,
    pub lan: Option<String>,
    pub session: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessConfig {
    // defaults to the entry's position
    pub id: Option<usize>,
    pub protocols: Vec<ProtocolConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologyConfig {
    #[serde(default)]
    pub shapes: HashMap<LevelKind, TreeShape>,
    pub processes: Vec<ProcessConfig>,
}

impl ProtocolConfig {
    fn to_protocol(&self, process: ProcessId) -> Result<Protocol, ConfigError> {
        let field = |value: &Option<String>, field: &'static str| {
            value.clone().ok_or_else(|| ConfigError::MissingField {
                process,
                kind: self.kind.clone(),
                field,
            })
        };
        let protocol = match self.kind.as_str() {
            "tcp" => Protocol::Tcp {
                hostname: field(&self.hostname, "hostname")?,
                lan: field(&self.lan, "lan")?,
            },
            "fabric" => Protocol::Fabric {
                session: field(&self.session, "session")?,
            },
            other => Protocol::Unrecognized(other.to_string()),
        };
        Ok(protocol)
    }
}

impl TopologyConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config = toml::from_str(content)?;
        Ok(config)
    }

    /// Group members in file order.
    pub fn members(&self) -> Vec<ProcessId> {
        self.processes
            .iter()
            .enumerate()
            .map(|(i, p)| ProcessId(p.id.unwrap_or(i)))
            .collect()
    }
}

impl StaticChannelInfo {
    pub fn from_config(config: &TopologyConfig) -> Result<Self, ConfigError> {
        let mut info = StaticChannelInfo::new();
        let mut seen = HashSet::new();
        for (process, entry) in config.members().into_iter().zip(&config.processes) {
            if !seen.insert(process) {
                return Err(ConfigError::DuplicateProcess(process));
            }
            let protocols = entry
                .protocols
                .iter()
                .map(|p| p.to_protocol(process))
                .collect::<Result<Vec<_>, _>>()?;
            info.insert(process, protocols);
        }
        for (&kind, &shape) in &config.shapes {
            info = info.with_shape(kind, shape);
        }
        Ok(info)
    }
}
