// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Provisioning manifest: the PDNs, tables and rules to install.

use crate::MAX_PDN;
use crate::engine::EngineConfig;
use crate::errors::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::debug;

/// IP protocol number of a rule. Manifests may spell common protocols by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProtocolRepr", into = "u8")]
pub struct Protocol(pub u8);

impl Protocol {
    pub const ICMP: Protocol = Protocol(1);
    pub const TCP: Protocol = Protocol(6);
    pub const UDP: Protocol = Protocol(17);
}

impl From<Protocol> for u8 {
    fn from(value: Protocol) -> Self {
        value.0
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Protocol::ICMP => write!(f, "icmp"),
            Protocol::TCP => write!(f, "tcp"),
            Protocol::UDP => write!(f, "udp"),
            Protocol(other) => write!(f, "{other}"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProtocolRepr {
    Number(u8),
    Name(String),
}

impl TryFrom<ProtocolRepr> for Protocol {
    type Error = ConfigError;
    fn try_from(value: ProtocolRepr) -> Result<Self, Self::Error> {
        match value {
            ProtocolRepr::Number(n) => Ok(Protocol(n)),
            ProtocolRepr::Name(name) => match name.to_ascii_lowercase().as_str() {
                "icmp" => Ok(Protocol::ICMP),
                "tcp" => Ok(Protocol::TCP),
                "udp" => Ok(Protocol::UDP),
                _ => Err(ConfigError::UnknownProtocol(name)),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PdnConfig {
    pub index: u8,
    pub public_ip: Ipv4Addr,
    #[serde(default)]
    pub src_metadata: u32,
    #[serde(default)]
    pub dst_metadata: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RuleConfig {
    pub private_ip: Ipv4Addr,
    pub private_port: u16,
    pub target_ip: Ipv4Addr,
    pub target_port: u16,
    pub public_port: u16,
    pub protocol: Protocol,
    #[serde(default)]
    pub timestamp: u32,
    #[serde(default)]
    pub pdn_index: u8,
    #[serde(default)]
    pub redirect: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TableConfig {
    pub public_ip: Ipv4Addr,
    pub entries: u16,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct NatManifest {
    pub engine: EngineConfig,
    pub pdns: Vec<PdnConfig>,
    pub tables: Vec<TableConfig>,
}

fn check_pdn_index(index: u8) -> ConfigResult {
    if usize::from(index) >= MAX_PDN {
        return Err(ConfigError::PdnOutOfRange(index));
    }
    Ok(())
}

impl NatManifest {
    /// Parse and validate a manifest.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let manifest: NatManifest = serde_yaml_ng::from_str(yaml)?;
        manifest.validate()?;
        debug!(
            "Loaded manifest: {} pdns, {} tables",
            manifest.pdns.len(),
            manifest.tables.len()
        );
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> ConfigResult {
        self.engine.validate()?;

        let mut seen = BTreeSet::new();
        for pdn in &self.pdns {
            check_pdn_index(pdn.index)?;
            if !seen.insert(pdn.index) {
                return Err(ConfigError::DuplicatePdn(pdn.index));
            }
        }

        if self.tables.len() > self.engine.max_tables {
            return Err(ConfigError::TooManyTables {
                count: self.tables.len(),
                max: self.engine.max_tables,
            });
        }
        for table in &self.tables {
            if table.entries == 0 {
                return Err(ConfigError::ZeroEntries(table.public_ip));
            }
            for rule in &table.rules {
                check_pdn_index(rule.pdn_index)?;
            }
        }
        Ok(())
    }
}
