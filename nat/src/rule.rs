// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use config::RuleConfig;
use std::net::Ipv4Addr;

/// A translation requested by a client: packets from `private_ip:private_port` to
/// `target_ip:target_port` leave with the public address of PDN `pdn_index` and `public_port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatRule {
    pub private_ip: Ipv4Addr,
    pub private_port: u16,
    pub target_ip: Ipv4Addr,
    pub target_port: u16,
    pub public_port: u16,
    pub protocol: u8,
    /// Only the low 24 bits are kept by the hardware.
    pub timestamp: u32,
    pub pdn_index: u8,
    pub redirect: bool,
}

impl From<&RuleConfig> for NatRule {
    fn from(config: &RuleConfig) -> Self {
        Self {
            private_ip: config.private_ip,
            private_port: config.private_port,
            target_ip: config.target_ip,
            target_port: config.target_port,
            public_port: config.public_port,
            protocol: config.protocol.into(),
            timestamp: config.timestamp,
            pdn_index: config.pdn_index,
            redirect: config.redirect,
        }
    }
}
