// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Engine-wide settings

use crate::errors::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};

/// Name of the device node through which table regions are reserved.
pub const DEFAULT_NAT_DEVICE: &str = "ipaNatTable";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct EngineConfig {
    pub nat_device: String,
    /// How many tables may be allocated at the same time. The coprocessor supports one.
    pub max_tables: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            nat_device: DEFAULT_NAT_DEVICE.to_string(),
            max_tables: 1,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> ConfigResult {
        if self.nat_device.is_empty() || self.nat_device.contains('/') {
            return Err(ConfigError::BadDeviceName(self.nat_device.clone()));
        }
        if self.max_tables == 0 {
            return Err(ConfigError::BadMaxTables(self.max_tables));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.nat_device, "ipaNatTable");
        assert_eq!(config.max_tables, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn reject_bad_values() {
        let mut config = EngineConfig {
            nat_device: "dev/nat".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::BadDeviceName(_))));
        config.nat_device = String::new();
        assert!(matches!(config.validate(), Err(ConfigError::BadDeviceName(_))));
        config.nat_device = DEFAULT_NAT_DEVICE.to_string();
        config.max_tables = 0;
        assert!(matches!(config.validate(), Err(ConfigError::BadMaxTables(0))));
    }
}
