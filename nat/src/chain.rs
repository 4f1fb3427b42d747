// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Collision chains
//!
//! Each bucket of the base (or index) table heads a singly-linked list of expansion rows. A
//! `next` link of 0 terminates a list: links only ever point into the expansion part, which
//! starts at `base_entries >= 2`. Expansion rows also record their predecessor so that they can
//! be spliced out.

use crate::arena::TableArena;
use crate::errors::NatError;
use crate::row::{IndexRow, TranslationRow};
use roaring::RoaringBitmap;
use std::ops::Range;

/// Where a new row goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    /// The bucket head is free. `next` is the link it keeps from a previous occupant.
    Head { entry: u16, next: u16 },
    /// Appended to the chain of the bucket, after `prev`.
    Chained { entry: u16, prev: u16 },
}

impl Placement {
    pub(crate) fn entry(self) -> u16 {
        match self {
            Placement::Head { entry, .. } | Placement::Chained { entry, .. } => entry,
        }
    }
}

/// Link structure of one family of rows (translation or index).
pub(crate) trait Chain {
    fn expansion(&self) -> Range<u16>;
    fn in_use(&self, entry: u16) -> Result<bool, NatError>;
    fn next(&self, entry: u16) -> Result<u16, NatError>;
    fn set_next(&mut self, entry: u16, next: u16) -> Result<(), NatError>;
    /// Predecessor of an expansion entry.
    fn prev(&self, entry: u16) -> Result<u16, NatError>;
    fn set_prev(&mut self, entry: u16, prev: u16) -> Result<(), NatError>;
    /// Free the row, leaving only `next` behind.
    fn clear(&mut self, entry: u16, next: u16) -> Result<(), NatError>;
    fn full_error(&self) -> NatError;

    fn checked_next(&self, entry: u16) -> Result<u16, NatError> {
        let next = self.next(entry)?;
        if next != 0 && !self.expansion().contains(&next) {
            return Err(NatError::CorruptChain(entry));
        }
        Ok(next)
    }

    /// Last row of the chain starting at `head`.
    fn tail(&self, head: u16) -> Result<u16, NatError> {
        let mut entry = head;
        // a chain cannot be longer than the expansion table
        for _ in 0..=self.expansion().len() {
            match self.checked_next(entry)? {
                0 => return Ok(entry),
                next => entry = next,
            }
        }
        Err(NatError::CorruptChain(head))
    }

    fn free_expansion(&self) -> Result<u16, NatError> {
        for entry in self.expansion() {
            if !self.in_use(entry)? {
                return Ok(entry);
            }
        }
        Err(self.full_error())
    }

    /// Choose the row for a new entry hashing to bucket row `head`.
    fn place(&self, head: u16) -> Result<Placement, NatError> {
        if !self.in_use(head)? {
            let next = self.checked_next(head)?;
            return Ok(Placement::Head { entry: head, next });
        }
        let prev = self.tail(head)?;
        let entry = self.free_expansion()?;
        Ok(Placement::Chained { entry, prev })
    }

    /// Hook a row written at `placement` into its chain.
    fn link(&mut self, placement: Placement) -> Result<(), NatError> {
        if let Placement::Chained { entry, prev } = placement {
            self.set_prev(entry, prev)?;
            self.set_next(prev, entry)?;
        }
        Ok(())
    }

    /// Take `entry` out of its chain and free it.
    fn unlink(&mut self, entry: u16) -> Result<(), NatError> {
        let next = self.checked_next(entry)?;
        if self.expansion().contains(&entry) {
            let prev = self.prev(entry)?;
            self.set_next(prev, next)?;
            if next != 0 {
                self.set_prev(next, prev)?;
            }
            self.clear(entry, 0)
        } else {
            self.clear(entry, next)
        }
    }

    /// Entries of the chain starting at `head`, head included.
    fn walk(&self, head: u16) -> Result<Vec<u16>, NatError> {
        let mut entries = vec![head];
        let mut entry = head;
        while let next @ 1.. = self.checked_next(entry)? {
            if entries.len() > self.expansion().len() {
                return Err(NatError::CorruptChain(head));
            }
            entries.push(next);
            entry = next;
        }
        Ok(entries)
    }
}

/// Chains of the base and expansion translation tables. A row is in use when enabled.
pub(crate) struct TranslationChain<'a> {
    pub(crate) arena: &'a mut TableArena,
}

impl TranslationChain<'_> {
    fn update(
        &mut self,
        entry: u16,
        f: impl FnOnce(&mut TranslationRow),
    ) -> Result<(), NatError> {
        let mut row = self.arena.translation(entry)?;
        f(&mut row);
        self.arena.write_translation(entry, &row)
    }
}

impl Chain for TranslationChain<'_> {
    fn expansion(&self) -> Range<u16> {
        self.arena.layout().expansion_range()
    }

    fn in_use(&self, entry: u16) -> Result<bool, NatError> {
        Ok(self.arena.translation(entry)?.enabled())
    }

    fn next(&self, entry: u16) -> Result<u16, NatError> {
        Ok(self.arena.translation(entry)?.next_index())
    }

    fn set_next(&mut self, entry: u16, next: u16) -> Result<(), NatError> {
        self.update(entry, |row| row.set_next_index(next))
    }

    fn prev(&self, entry: u16) -> Result<u16, NatError> {
        Ok(self.arena.translation(entry)?.prev_index())
    }

    fn set_prev(&mut self, entry: u16, prev: u16) -> Result<(), NatError> {
        self.update(entry, |row| row.set_prev_index(prev))
    }

    fn clear(&mut self, entry: u16, next: u16) -> Result<(), NatError> {
        self.arena
            .write_translation(entry, &TranslationRow::link_only(next))
    }

    fn full_error(&self) -> NatError {
        NatError::ExpansionFull
    }
}

/// Chains of the index and index expansion tables. Index rows have no room for a predecessor
/// or an occupancy flag, both are kept on the side.
pub(crate) struct IndexChain<'a> {
    pub(crate) arena: &'a mut TableArena,
    /// Predecessors of the index expansion rows.
    pub(crate) prev: &'a mut [u16],
    pub(crate) in_use: &'a mut RoaringBitmap,
}

impl IndexChain<'_> {
    fn meta_slot(&self, entry: u16) -> Result<usize, NatError> {
        let range = self.expansion();
        if !range.contains(&entry) {
            return Err(NatError::CorruptChain(entry));
        }
        Ok(usize::from(entry - range.start))
    }

    fn update(&mut self, entry: u16, f: impl FnOnce(&mut IndexRow)) -> Result<(), NatError> {
        let mut row = self.arena.index(entry)?;
        f(&mut row);
        self.arena.write_index(entry, &row)
    }
}

impl Chain for IndexChain<'_> {
    fn expansion(&self) -> Range<u16> {
        self.arena.layout().expansion_range()
    }

    fn in_use(&self, entry: u16) -> Result<bool, NatError> {
        Ok(self.in_use.contains(u32::from(entry)))
    }

    fn next(&self, entry: u16) -> Result<u16, NatError> {
        Ok(self.arena.index(entry)?.next_index())
    }

    fn set_next(&mut self, entry: u16, next: u16) -> Result<(), NatError> {
        self.update(entry, |row| row.set_next_index(next))
    }

    fn prev(&self, entry: u16) -> Result<u16, NatError> {
        Ok(self.prev[self.meta_slot(entry)?])
    }

    fn set_prev(&mut self, entry: u16, prev: u16) -> Result<(), NatError> {
        let slot = self.meta_slot(entry)?;
        self.prev[slot] = prev;
        Ok(())
    }

    fn clear(&mut self, entry: u16, next: u16) -> Result<(), NatError> {
        self.in_use.remove(u32::from(entry));
        if let Ok(slot) = self.meta_slot(entry) {
            self.prev[slot] = 0;
        }
        self.arena.write_index(entry, &IndexRow::new(0, next))
    }

    fn full_error(&self) -> NatError {
        NatError::IndexExpansionFull
    }
}
