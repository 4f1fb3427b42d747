// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Collaborators of the engine: the coprocessor control channel and the mapping of the regions
//! it reserves.

use crate::handle::TableKind;
use nix::errno::Errno;
use std::fmt::Display;
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Coprocessor generation code, as reported by the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HwVersion(pub u32);

impl HwVersion {
    pub const V3_0: HwVersion = HwVersion(10);
    pub const V3_5_1: HwVersion = HwVersion(13);
    pub const V4_0: HwVersion = HwVersion(14);
}

impl Display for HwVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "hw generation {}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HwError {
    #[error("{command} failed: {errno}")]
    Command { command: &'static str, errno: Errno },
    #[error("cannot map {}: {source}", .path.display())]
    Map {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("region of {actual} bytes cannot hold {expected} bytes of tables")]
    RegionSize { expected: usize, actual: usize },
    #[error("cannot flush region: {0}")]
    Flush(std::io::Error),
}

impl HwError {
    #[must_use]
    pub fn command(command: &'static str, errno: Errno) -> Self {
        HwError::Command { command, errno }
    }
}

/// A region reserved by the coprocessor for a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    /// Device or file backing the region.
    pub device: PathBuf,
    /// Byte offset of the region in the coprocessor's address space.
    pub offset: u32,
    pub size: usize,
}

/// Dimensions and placement of a table, handed to the coprocessor before first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitCommand {
    pub table_index: u8,
    pub rules_offset: u32,
    pub expansion_rules_offset: u32,
    pub index_offset: u32,
    pub index_expansion_offset: u32,
    /// Hash mask of the base table, that is its entry count minus one.
    pub table_entries: u16,
    pub expansion_entries: u16,
    pub public_ip: Ipv4Addr,
}

/// Write of a row's flag word, carried out by the coprocessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaCommand {
    pub table_index: u8,
    pub target: TableKind,
    /// Byte offset of the flag word, within the target sub-table.
    pub offset: u32,
    pub data: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteCommand {
    pub table_index: u8,
    pub public_ip: Ipv4Addr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdnCommand {
    pub pdn_index: u8,
    pub public_ip: Ipv4Addr,
    pub src_metadata: u32,
    pub dst_metadata: u32,
}

/// The coprocessor control channel. Every call is synchronous.
pub trait NatHardware: Send + Sync {
    /// # Errors
    ///
    /// Fails if the version cannot be read.
    fn hw_version(&self) -> Result<HwVersion, HwError>;

    /// Reserve `size` bytes for a table, through `device`.
    ///
    /// # Errors
    ///
    /// Fails if the coprocessor cannot provide the region.
    fn reserve(&self, device: &str, size: usize) -> Result<Reservation, HwError>;

    /// # Errors
    ///
    /// Fails if the coprocessor rejects the command.
    fn init_table(&self, cmd: &InitCommand) -> Result<(), HwError>;

    /// # Errors
    ///
    /// Fails if the coprocessor rejects the command.
    fn commit(&self, cmd: &DmaCommand) -> Result<(), HwError>;

    /// # Errors
    ///
    /// Fails if the coprocessor rejects the command.
    fn delete_table(&self, cmd: &DeleteCommand) -> Result<(), HwError>;

    /// # Errors
    ///
    /// Fails if the coprocessor rejects the command.
    fn modify_pdn(&self, cmd: &PdnCommand) -> Result<(), HwError>;
}

/// A mapped table region.
pub trait SharedRegion: Send {
    fn bytes(&self) -> &[u8];
    fn bytes_mut(&mut self) -> &mut [u8];

    /// Push pending writes to the backing device.
    ///
    /// # Errors
    ///
    /// Fails if the backing device reports an error.
    fn flush(&mut self) -> Result<(), HwError> {
        Ok(())
    }
}

/// Maps reserved regions into the process.
pub trait RegionMapper: Send + Sync {
    /// # Errors
    ///
    /// Fails if the region cannot be mapped or is smaller than the reservation.
    fn map(&self, reservation: &Reservation) -> Result<Box<dyn SharedRegion>, HwError>;

    /// Release a region. Pending writes are flushed first.
    ///
    /// # Errors
    ///
    /// Fails if flushing fails. The region is released regardless.
    fn unmap(&self, mut region: Box<dyn SharedRegion>) -> Result<(), HwError> {
        region.flush()
    }
}
