// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Errors returned by the NAT engine

use crate::hw::HwError;
use crate::sizing::SizingError;
use nix::errno::Errno;

/// Coarse classification of a [`NatError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    ResourceExhausted,
    Io,
    Lock,
}

#[derive(Debug, thiserror::Error)]
pub enum NatError {
    #[error("invalid table handle {0}")]
    InvalidTable(u16),
    #[error("invalid rule handle {0}")]
    InvalidRule(u16),
    #[error("PDN index {0} out of range")]
    PdnOutOfRange(u8),
    #[error("PDN {0} is not provisioned")]
    PdnUnprovisioned(u8),
    #[error("cannot size table: {0}")]
    Sizing(#[from] SizingError),
    #[error("no free table slot")]
    NoTableSlot,
    #[error("expansion table is full")]
    ExpansionFull,
    #[error("index expansion table is full")]
    IndexExpansionFull,
    #[error("no free rule handle")]
    NoFreeHandle,
    #[error("corrupted chain at entry {0}")]
    CorruptChain(u16),
    #[error(transparent)]
    Hardware(#[from] HwError),
    #[error("lock poisoned: {0}")]
    Lock(&'static str),
}

impl NatError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            NatError::InvalidTable(_)
            | NatError::InvalidRule(_)
            | NatError::PdnOutOfRange(_)
            | NatError::PdnUnprovisioned(_) => ErrorKind::InvalidArgument,
            NatError::Sizing(_)
            | NatError::NoTableSlot
            | NatError::ExpansionFull
            | NatError::IndexExpansionFull
            | NatError::NoFreeHandle => ErrorKind::ResourceExhausted,
            NatError::CorruptChain(_) | NatError::Hardware(_) => ErrorKind::Io,
            NatError::Lock(_) => ErrorKind::Lock,
        }
    }

    /// The errno a C caller of the driver would have seen for this error.
    #[must_use]
    pub fn errno(&self) -> Errno {
        match self.kind() {
            ErrorKind::InvalidArgument => Errno::EINVAL,
            ErrorKind::ResourceExhausted => Errno::ENOMEM,
            ErrorKind::Io => Errno::EIO,
            ErrorKind::Lock => Errno::EDEADLK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping() {
        assert_eq!(NatError::InvalidRule(3).errno(), Errno::EINVAL);
        assert_eq!(NatError::PdnUnprovisioned(1).errno(), Errno::EINVAL);
        assert_eq!(
            NatError::from(SizingError::ZeroEntries).errno(),
            Errno::ENOMEM
        );
        assert_eq!(NatError::ExpansionFull.errno(), Errno::ENOMEM);
        assert_eq!(
            NatError::from(HwError::command("commit", Errno::EFAULT)).errno(),
            Errno::EIO
        );
        assert_eq!(NatError::Lock("tables").kind(), ErrorKind::Lock);
    }
}
