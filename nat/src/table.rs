// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-table state and rule placement

use crate::arena::TableArena;
use crate::chain::{Chain, IndexChain, Placement, TranslationChain};
use crate::checksum::{ip_checksum_delta, tcp_udp_checksum_delta};
use crate::errors::NatError;
use crate::handle::{RuleHandle, RuleId, RuleIdMap, TableHandle};
use crate::hash::{dst_hash, src_hash};
use crate::hw::{DeleteCommand, HwVersion, NatHardware, Reservation};
use crate::layout::TableLayout;
use crate::pdn::PdnEntry;
use crate::row::{ENABLE_FLAG, IndexRow, TranslationRow};
use crate::rule::NatRule;
use roaring::RoaringBitmap;
use std::net::Ipv4Addr;
use tracing::{debug, error, warn};

const IPPROTO_TCP: u8 = 6;
const IPPROTO_UDP: u8 = 17;

/// Occupancy of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    pub base_entries: u16,
    pub expansion_entries: u16,
    pub base_in_use: u16,
    pub expansion_in_use: u16,
}

#[derive(Debug)]
pub(crate) struct TableCache {
    handle: TableHandle,
    public_ip: Ipv4Addr,
    version: HwVersion,
    reservation: Reservation,
    /// `None` once the table is deleted.
    arena: Option<TableArena>,
    rule_ids: RuleIdMap,
    index_expansion_prev: Vec<u16>,
    index_in_use: RoaringBitmap,
    base_in_use: u16,
    expansion_in_use: u16,
}

impl TableCache {
    /// Wrap a freshly mapped region. The sub-tables are zeroed.
    pub(crate) fn new(
        handle: TableHandle,
        public_ip: Ipv4Addr,
        version: HwVersion,
        reservation: Reservation,
        mut arena: TableArena,
    ) -> Self {
        arena.reset();
        let layout = *arena.layout();
        Self {
            handle,
            public_ip,
            version,
            reservation,
            arena: Some(arena),
            rule_ids: RuleIdMap::new(usize::from(layout.total_entries())),
            index_expansion_prev: vec![0; usize::from(layout.expansion_entries())],
            index_in_use: RoaringBitmap::new(),
            base_in_use: 0,
            expansion_in_use: 0,
        }
    }

    pub(crate) fn table_index(&self) -> u8 {
        // tables are created in slots below `u8::MAX`
        u8::try_from(self.handle.slot()).unwrap_or(u8::MAX)
    }

    pub(crate) fn reservation(&self) -> &Reservation {
        &self.reservation
    }

    fn arena(&self) -> Result<&TableArena, NatError> {
        self.arena
            .as_ref()
            .ok_or(NatError::InvalidTable(self.handle.as_u16()))
    }

    fn layout(&self) -> Result<TableLayout, NatError> {
        Ok(*self.arena()?.layout())
    }

    /// Detach the region from the table. Every later operation fails with an invalid table
    /// error.
    pub(crate) fn retire(&mut self) -> Option<TableArena> {
        self.arena.take()
    }

    pub(crate) fn delete_command(&self) -> DeleteCommand {
        DeleteCommand {
            table_index: self.table_index(),
            public_ip: self.public_ip,
        }
    }

    /// Build the translation row of `rule`, leaving the links to the caller.
    fn translation_row(rule: &NatRule, pdn: &PdnEntry, index_entry: u16) -> TranslationRow {
        let public_ip = pdn.public_ip.to_bits();
        let private_ip = rule.private_ip.to_bits();

        let mut row = TranslationRow::default();
        row.set_private_ip(private_ip);
        row.set_target_ip(rule.target_ip.to_bits());
        row.set_public_port(rule.public_port);
        row.set_private_port(rule.private_port);
        row.set_target_port(rule.target_port);
        row.set_ip_chksum(ip_checksum_delta(public_ip, private_ip).as_u16());
        row.set_redirect(rule.redirect);
        row.set_time_stamp(rule.timestamp);
        row.set_protocol(rule.protocol);
        row.set_indx_tbl_entry(index_entry);
        row.set_pdn_index(rule.pdn_index);
        if matches!(rule.protocol, IPPROTO_TCP | IPPROTO_UDP) {
            let delta =
                tcp_udp_checksum_delta(public_ip, rule.public_port, private_ip, rule.private_port);
            row.set_tcp_udp_chksum(delta.as_u16());
        }
        row
    }

    /// Insert `rule` and hand its translation row to the hardware.
    pub(crate) fn add_rule<H: NatHardware>(
        &mut self,
        hw: &H,
        rule: &NatRule,
        pdn: &PdnEntry,
    ) -> Result<RuleHandle, NatError> {
        let layout = self.layout()?;
        let table_index = self.table_index();
        let cell = self.rule_ids.free_cell()?;

        let size = layout.base_entries();
        let dst_bucket = dst_hash(
            pdn.public_ip.to_bits(),
            rule.target_ip.to_bits(),
            rule.target_port,
            rule.public_port,
            rule.protocol,
            size,
            self.version,
        );
        let src_bucket = src_hash(
            rule.private_ip.to_bits(),
            rule.private_port,
            rule.target_ip.to_bits(),
            rule.target_port,
            rule.protocol,
            size,
        );

        let arena = self
            .arena
            .as_mut()
            .ok_or(NatError::InvalidTable(self.handle.as_u16()))?;
        let translations = TranslationChain { arena };
        let placement = translations.place(dst_bucket - 1)?;
        let indexes = IndexChain {
            arena: translations.arena,
            prev: &mut self.index_expansion_prev,
            in_use: &mut self.index_in_use,
        };
        let index_placement = indexes.place(src_bucket - 1)?;
        let entry = placement.entry();
        let index_entry = index_placement.entry();
        debug!(
            "Placing rule in table {table_index}: entry {entry} ({placement:?}), index entry {index_entry} ({index_placement:?})"
        );

        let mut row = Self::translation_row(rule, pdn, index_entry);
        let written = self.write_rows(&mut row, placement, index_placement);
        let committed = written.and_then(|()| {
            let cmd = layout.flags_command(table_index, entry, row.flags() | ENABLE_FLAG);
            hw.commit(&cmd).map_err(NatError::from)
        });
        if let Err(e) = committed {
            error!("Failed to insert rule in table {table_index}: {e}");
            if let Err(rollback) = self.unlink_rows(entry, index_entry) {
                warn!("Failed to roll back entry {entry} of table {table_index}: {rollback}");
            }
            return Err(e);
        }

        row.set_enabled(true);
        let arena = self
            .arena
            .as_mut()
            .ok_or(NatError::InvalidTable(self.handle.as_u16()))?;
        arena.write_translation(entry, &row)?;
        if layout.is_expansion(entry) {
            self.expansion_in_use += 1;
        } else {
            self.base_in_use += 1;
        }
        self.rule_ids
            .assign(cell, RuleId::encode(entry, layout.base_entries()))
    }

    fn write_rows(
        &mut self,
        row: &mut TranslationRow,
        placement: Placement,
        index_placement: Placement,
    ) -> Result<(), NatError> {
        let arena = self
            .arena
            .as_mut()
            .ok_or(NatError::InvalidTable(self.handle.as_u16()))?;
        let entry = placement.entry();
        let index_entry = index_placement.entry();

        if let Placement::Head { next, .. } = placement {
            row.set_next_index(next);
        }
        arena.write_translation(entry, row)?;
        let mut translations = TranslationChain { arena };
        translations.link(placement)?;
        // linking may have recorded the predecessor in the row
        *row = translations.arena.translation(entry)?;

        let index_next = match index_placement {
            Placement::Head { next, .. } => next,
            Placement::Chained { .. } => 0,
        };
        let mut indexes = IndexChain {
            arena: translations.arena,
            prev: &mut self.index_expansion_prev,
            in_use: &mut self.index_in_use,
        };
        indexes
            .arena
            .write_index(index_entry, &IndexRow::new(entry, index_next))?;
        indexes.in_use.insert(u32::from(index_entry));
        indexes.link(index_placement)
    }

    fn unlink_rows(&mut self, entry: u16, index_entry: u16) -> Result<(), NatError> {
        let arena = self
            .arena
            .as_mut()
            .ok_or(NatError::InvalidTable(self.handle.as_u16()))?;
        let mut translations = TranslationChain { arena };
        let unlinked = translations.unlink(entry);
        let mut indexes = IndexChain {
            arena: translations.arena,
            prev: &mut self.index_expansion_prev,
            in_use: &mut self.index_in_use,
        };
        unlinked.and(indexes.unlink(index_entry))
    }

    fn entry_of(&self, handle: RuleHandle) -> Result<(TableLayout, u16, TranslationRow), NatError> {
        let layout = self.layout()?;
        let entry = self.rule_ids.lookup(handle)?.entry(layout.base_entries());
        let row = self.arena()?.translation(entry)?;
        if !row.enabled() {
            return Err(NatError::InvalidRule(handle.as_u16()));
        }
        Ok((layout, entry, row))
    }

    /// Disable a rule in hardware, then take its rows out of their chains.
    pub(crate) fn delete_rule<H: NatHardware>(
        &mut self,
        hw: &H,
        handle: RuleHandle,
    ) -> Result<(), NatError> {
        let (layout, entry, row) = self.entry_of(handle)?;
        let table_index = self.table_index();
        let cmd = layout.flags_command(table_index, entry, row.flags() & !ENABLE_FLAG);
        hw.commit(&cmd).inspect_err(|e| {
            error!("Failed to disable entry {entry} of table {table_index}: {e}");
        })?;

        self.rule_ids.release(handle)?;
        if layout.is_expansion(entry) {
            self.expansion_in_use -= 1;
        } else {
            self.base_in_use -= 1;
        }
        debug!("Removing entry {entry} of table {table_index}");
        self.unlink_rows(entry, row.indx_tbl_entry())
    }

    pub(crate) fn timestamp(&self, handle: RuleHandle) -> Result<u32, NatError> {
        let (_, _, row) = self.entry_of(handle)?;
        Ok(row.time_stamp())
    }

    /// The rule as currently programmed in hardware.
    pub(crate) fn rule(&self, handle: RuleHandle) -> Result<NatRule, NatError> {
        let (_, _, row) = self.entry_of(handle)?;
        Ok(NatRule {
            private_ip: Ipv4Addr::from_bits(row.private_ip()),
            private_port: row.private_port(),
            target_ip: Ipv4Addr::from_bits(row.target_ip()),
            target_port: row.target_port(),
            public_port: row.public_port(),
            protocol: row.protocol(),
            timestamp: row.time_stamp(),
            pdn_index: row.pdn_index(),
            redirect: row.redirect(),
        })
    }

    pub(crate) fn stats(&self) -> Result<TableStats, NatError> {
        let layout = self.layout()?;
        Ok(TableStats {
            base_entries: layout.base_entries(),
            expansion_entries: layout.expansion_entries(),
            base_in_use: self.base_in_use,
            expansion_in_use: self.expansion_in_use,
        })
    }

    /// Entries of the translation chain of bucket row `head`.
    #[cfg(test)]
    pub(crate) fn translation_chain(&mut self, head: u16) -> Result<Vec<u16>, NatError> {
        let arena = self
            .arena
            .as_mut()
            .ok_or(NatError::InvalidTable(self.handle.as_u16()))?;
        TranslationChain { arena }.walk(head)
    }

    /// Entries of the index chain of bucket row `head`.
    #[cfg(test)]
    pub(crate) fn index_chain(&mut self, head: u16) -> Result<Vec<u16>, NatError> {
        let arena = self
            .arena
            .as_mut()
            .ok_or(NatError::InvalidTable(self.handle.as_u16()))?;
        IndexChain {
            arena,
            prev: &mut self.index_expansion_prev,
            in_use: &mut self.index_in_use,
        }
        .walk(head)
    }

    /// Raw view of the table's rows, for tests.
    #[cfg(test)]
    pub(crate) fn translation_row_at(&self, entry: u16) -> Result<TranslationRow, NatError> {
        self.arena()?.translation(entry)
    }

    #[cfg(test)]
    pub(crate) fn index_row_at(&self, entry: u16) -> Result<IndexRow, NatError> {
        self.arena()?.index(entry)
    }

    #[cfg(test)]
    pub(crate) fn index_in_use(&self) -> &RoaringBitmap {
        &self.index_in_use
    }
}
