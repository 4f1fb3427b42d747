// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Packet Data Network contexts

use crate::errors::NatError;
use std::net::Ipv4Addr;

pub use config::MAX_PDN;

/// Public address and hardware tagging metadata of a PDN. A PDN whose public address is
/// unspecified is not provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdnEntry {
    pub public_ip: Ipv4Addr,
    pub src_metadata: u32,
    pub dst_metadata: u32,
}

impl PdnEntry {
    #[must_use]
    pub fn new(public_ip: Ipv4Addr) -> Self {
        Self {
            public_ip,
            src_metadata: 0,
            dst_metadata: 0,
        }
    }

    #[must_use]
    pub fn is_provisioned(&self) -> bool {
        !self.public_ip.is_unspecified()
    }
}

impl Default for PdnEntry {
    fn default() -> Self {
        Self::new(Ipv4Addr::UNSPECIFIED)
    }
}

#[derive(Debug, Default)]
pub(crate) struct PdnTable {
    entries: [PdnEntry; MAX_PDN],
}

impl PdnTable {
    pub(crate) fn check_index(index: u8) -> Result<usize, NatError> {
        let slot = usize::from(index);
        if slot >= MAX_PDN {
            return Err(NatError::PdnOutOfRange(index));
        }
        Ok(slot)
    }

    pub(crate) fn get(&self, index: u8) -> Result<&PdnEntry, NatError> {
        Ok(&self.entries[Self::check_index(index)?])
    }

    /// The PDN a rule may be attached to.
    pub(crate) fn provisioned(&self, index: u8) -> Result<PdnEntry, NatError> {
        let entry = self.get(index)?;
        if !entry.is_provisioned() {
            return Err(NatError::PdnUnprovisioned(index));
        }
        Ok(*entry)
    }

    pub(crate) fn set(&mut self, index: u8, entry: PdnEntry) -> Result<(), NatError> {
        self.entries[Self::check_index(index)?] = entry;
        Ok(())
    }

    pub(crate) fn set_public_ip(&mut self, index: u8, public_ip: Ipv4Addr) -> Result<(), NatError> {
        self.entries[Self::check_index(index)?].public_ip = public_ip;
        Ok(())
    }
}
