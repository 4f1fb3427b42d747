// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Type for configuration / validation failures.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use thiserror::Error;

/// The reasons why we may reject a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed manifest: {0}")]
    Parse(#[from] serde_yaml_ng::Error),
    #[error("Invalid NAT device name '{0}'")]
    BadDeviceName(String),
    #[error("At least one table is required, got max-tables {0}")]
    BadMaxTables(usize),
    #[error("PDN index {0} out of range [0, {max})", max = crate::MAX_PDN)]
    PdnOutOfRange(u8),
    #[error("PDN {0} is defined more than once")]
    DuplicatePdn(u8),
    #[error("Table for {0} requests zero entries")]
    ZeroEntries(Ipv4Addr),
    #[error("{count} tables requested but the engine supports {max}")]
    TooManyTables { count: usize, max: usize },
    #[error("Unknown protocol '{0}'")]
    UnknownProtocol(String),
}

pub type ConfigResult = Result<(), ConfigError>;
