// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Placement of the four sub-tables inside a table region
//!
//! ```text
//! | base rules | expansion rules | index | index expansion |
//! ```
//!
//! Translation and index entries are numbered across base and expansion: entries
//! `0..base_entries` are base rows, the following ones are expansion rows. Since both parts are
//! contiguous, the byte offset of an entry only depends on its number.

use crate::handle::TableKind;
use crate::hw::{DmaCommand, InitCommand};
use crate::row::FLAGS_WORD_OFFSET;
use crate::sizing::{INDEX_ROW_SIZE, TRANSLATION_ROW_SIZE, TableSizing};
use std::net::Ipv4Addr;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TableLayout {
    pub(crate) sizing: TableSizing,
    /// Offset of the region in the coprocessor's address space.
    pub(crate) region_offset: u32,
}

#[allow(clippy::cast_possible_truncation)]
fn as_offset(bytes: usize) -> u32 {
    // regions hold at most 64k rows of 36 bytes
    bytes as u32
}

impl TableLayout {
    pub(crate) fn new(sizing: TableSizing, region_offset: u32) -> Self {
        Self {
            sizing,
            region_offset,
        }
    }

    pub(crate) fn base_entries(&self) -> u16 {
        self.sizing.base_entries
    }

    pub(crate) fn expansion_entries(&self) -> u16 {
        self.sizing.expansion_entries
    }

    /// Number of translation (or index) entries, base and expansion.
    pub(crate) fn total_entries(&self) -> u16 {
        self.base_entries() + self.expansion_entries()
    }

    pub(crate) fn expansion_range(&self) -> Range<u16> {
        self.base_entries()..self.total_entries()
    }

    pub(crate) fn is_expansion(&self, entry: u16) -> bool {
        entry >= self.base_entries()
    }

    pub(crate) fn region_size(&self) -> usize {
        self.sizing.region_size()
    }

    pub(crate) fn expansion_rules_offset(&self) -> usize {
        usize::from(self.base_entries()) * TRANSLATION_ROW_SIZE
    }

    pub(crate) fn index_offset(&self) -> usize {
        usize::from(self.total_entries()) * TRANSLATION_ROW_SIZE
    }

    pub(crate) fn index_expansion_offset(&self) -> usize {
        self.index_offset() + usize::from(self.base_entries()) * INDEX_ROW_SIZE
    }

    /// Bytes of translation entry `entry` within the region.
    pub(crate) fn translation_row(&self, entry: u16) -> Option<Range<usize>> {
        (entry < self.total_entries()).then(|| {
            let start = usize::from(entry) * TRANSLATION_ROW_SIZE;
            start..start + TRANSLATION_ROW_SIZE
        })
    }

    /// Bytes of index entry `entry` within the region.
    pub(crate) fn index_row(&self, entry: u16) -> Option<Range<usize>> {
        (entry < self.total_entries()).then(|| {
            let start = self.index_offset() + usize::from(entry) * INDEX_ROW_SIZE;
            start..start + INDEX_ROW_SIZE
        })
    }

    /// Sub-table and slot within that sub-table of a translation entry.
    pub(crate) fn locate(&self, entry: u16) -> (TableKind, u16) {
        if self.is_expansion(entry) {
            (TableKind::Expansion, entry - self.base_entries())
        } else {
            (TableKind::Base, entry)
        }
    }

    pub(crate) fn init_command(&self, table_index: u8, public_ip: Ipv4Addr) -> InitCommand {
        let hw = |offset: usize| self.region_offset + as_offset(offset);
        InitCommand {
            table_index,
            rules_offset: hw(0),
            expansion_rules_offset: hw(self.expansion_rules_offset()),
            index_offset: hw(self.index_offset()),
            index_expansion_offset: hw(self.index_expansion_offset()),
            table_entries: self.base_entries() - 1,
            expansion_entries: self.expansion_entries(),
            public_ip,
        }
    }

    /// Command writing `flags` into the flags word of translation entry `entry`.
    pub(crate) fn flags_command(&self, table_index: u8, entry: u16, flags: u32) -> DmaCommand {
        let (target, slot) = self.locate(entry);
        let offset = usize::from(slot) * TRANSLATION_ROW_SIZE + FLAGS_WORD_OFFSET;
        DmaCommand {
            table_index,
            target,
            offset: self.region_offset + as_offset(offset),
            data: flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn layout() -> TableLayout {
        // 8 base, 2 expansion
        TableLayout::new(TableSizing::for_entries(10).unwrap(), 0x1000)
    }

    #[test]
    fn sub_table_offsets() {
        let layout = layout();
        assert_eq!(layout.expansion_rules_offset(), 8 * 32);
        assert_eq!(layout.index_offset(), 10 * 32);
        assert_eq!(layout.index_expansion_offset(), 10 * 32 + 8 * 4);
        assert_eq!(layout.region_size(), 10 * 36);

        assert_eq!(layout.translation_row(9), Some(288..320));
        assert_eq!(layout.translation_row(10), None);
        assert_eq!(layout.index_row(0), Some(320..324));
        assert_eq!(layout.index_row(9), Some(356..360));
        assert_eq!(layout.index_row(10), None);
    }

    #[test]
    fn init_command() {
        let cmd = layout().init_command(0, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(
            cmd,
            InitCommand {
                table_index: 0,
                rules_offset: 0x1000,
                expansion_rules_offset: 0x1000 + 256,
                index_offset: 0x1000 + 320,
                index_expansion_offset: 0x1000 + 352,
                table_entries: 7,
                expansion_entries: 2,
                public_ip: Ipv4Addr::new(10, 0, 0, 1),
            }
        );
    }

    #[test]
    fn flags_command_targets_sub_table() {
        let layout = layout();
        let cmd = layout.flags_command(0, 3, 1 << 31);
        assert_eq!(cmd.target, TableKind::Base);
        assert_eq!(cmd.offset, 0x1000 + 3 * 32 + 16);

        let cmd = layout.flags_command(0, 9, 0);
        assert_eq!(cmd.target, TableKind::Expansion);
        assert_eq!(cmd.offset, 0x1000 + 32 + 16);
        assert_eq!(cmd.data, 0);
    }
}
