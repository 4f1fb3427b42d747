// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Table and rule handles
//!
//! A rule handle given to callers is a 1-based position in the table's allocation map. The cell
//! at that position holds a [`RuleId`]: the slot of the translation row within its sub-table,
//! shifted left by one, with the low bit set when the row lives in the expansion table.

use crate::errors::NatError;
use std::fmt::Display;
use std::num::NonZeroU16;

pub const RULE_ID_TABLE_TYPE_BITS: u16 = 1;
pub const RULE_ID_TABLE_TYPE_MASK: u16 = 0x1;

/// Opaque handle to a table, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableHandle(NonZeroU16);

impl TableHandle {
    #[must_use]
    pub fn new(raw: u16) -> Option<Self> {
        NonZeroU16::new(raw).map(Self)
    }

    pub(crate) fn from_slot(slot: usize) -> Option<Self> {
        u16::try_from(slot + 1).ok().and_then(Self::new)
    }

    #[must_use]
    pub fn as_u16(self) -> u16 {
        self.0.get()
    }

    pub(crate) fn slot(self) -> usize {
        usize::from(self.0.get() - 1)
    }
}

/// Opaque handle to a rule of a table. 0 is never a valid handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleHandle(NonZeroU16);

impl RuleHandle {
    #[must_use]
    pub fn new(raw: u16) -> Option<Self> {
        NonZeroU16::new(raw).map(Self)
    }

    #[must_use]
    pub fn as_u16(self) -> u16 {
        self.0.get()
    }
}

impl Display for TableHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for RuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which translation sub-table a row lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Base,
    Expansion,
}

/// Packed location of a translation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleId(u16);

impl RuleId {
    /// Encode an absolute table entry. Entries at or past `base_entries` are in the expansion
    /// table.
    #[must_use]
    pub fn encode(entry: u16, base_entries: u16) -> Self {
        if entry >= base_entries {
            let slot = entry - base_entries;
            Self((slot << RULE_ID_TABLE_TYPE_BITS) | RULE_ID_TABLE_TYPE_MASK)
        } else {
            Self(entry << RULE_ID_TABLE_TYPE_BITS)
        }
    }

    #[must_use]
    pub fn decode(self) -> (TableKind, u16) {
        let kind = if self.0 & RULE_ID_TABLE_TYPE_MASK == 0 {
            TableKind::Base
        } else {
            TableKind::Expansion
        };
        (kind, self.0 >> RULE_ID_TABLE_TYPE_BITS)
    }

    /// Absolute table entry of the row.
    #[must_use]
    pub fn entry(self, base_entries: u16) -> u16 {
        match self.decode() {
            (TableKind::Base, slot) => slot,
            (TableKind::Expansion, slot) => base_entries + slot,
        }
    }

    #[must_use]
    pub fn as_u16(self) -> u16 {
        self.0
    }
}

/// Allocation map from rule handles to rule ids.
#[derive(Debug)]
pub(crate) struct RuleIdMap {
    cells: Vec<Option<RuleId>>,
}

impl RuleIdMap {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            cells: vec![None; len],
        }
    }

    /// First free cell, scanning from the start of the map.
    pub(crate) fn free_cell(&self) -> Result<usize, NatError> {
        self.cells
            .iter()
            .position(Option::is_none)
            .ok_or(NatError::NoFreeHandle)
    }

    pub(crate) fn assign(&mut self, cell: usize, id: RuleId) -> Result<RuleHandle, NatError> {
        let handle = u16::try_from(cell + 1)
            .ok()
            .and_then(RuleHandle::new)
            .ok_or(NatError::NoFreeHandle)?;
        let slot = self.cells.get_mut(cell).ok_or(NatError::NoFreeHandle)?;
        *slot = Some(id);
        Ok(handle)
    }

    pub(crate) fn lookup(&self, handle: RuleHandle) -> Result<RuleId, NatError> {
        self.cells
            .get(usize::from(handle.as_u16() - 1))
            .copied()
            .flatten()
            .ok_or(NatError::InvalidRule(handle.as_u16()))
    }

    pub(crate) fn release(&mut self, handle: RuleHandle) -> Result<RuleId, NatError> {
        self.cells
            .get_mut(usize::from(handle.as_u16() - 1))
            .and_then(Option::take)
            .ok_or(NatError::InvalidRule(handle.as_u16()))
    }
}
