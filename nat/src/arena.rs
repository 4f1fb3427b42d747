// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Row access to a mapped table region

use crate::errors::NatError;
use crate::hw::{HwError, SharedRegion};
use crate::layout::TableLayout;
use crate::row::{IndexRow, TranslationRow};

pub(crate) struct TableArena {
    region: Box<dyn SharedRegion>,
    layout: TableLayout,
}

impl std::fmt::Debug for TableArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableArena")
            .field("len", &self.region.bytes().len())
            .field("layout", &self.layout)
            .finish()
    }
}

impl TableArena {
    pub(crate) fn new(region: Box<dyn SharedRegion>, layout: TableLayout) -> Result<Self, HwError> {
        let actual = region.bytes().len();
        let expected = layout.region_size();
        if actual < expected {
            return Err(HwError::RegionSize { expected, actual });
        }
        Ok(Self { region, layout })
    }

    pub(crate) fn layout(&self) -> &TableLayout {
        &self.layout
    }

    /// Zero the four sub-tables.
    pub(crate) fn reset(&mut self) {
        let size = self.layout.region_size();
        self.region.bytes_mut()[..size].fill(0);
    }

    pub(crate) fn into_region(self) -> Box<dyn SharedRegion> {
        self.region
    }

    pub(crate) fn translation(&self, entry: u16) -> Result<TranslationRow, NatError> {
        let range = self
            .layout
            .translation_row(entry)
            .ok_or(NatError::CorruptChain(entry))?;
        Ok(TranslationRow::from_bytes(&self.region.bytes()[range]))
    }

    pub(crate) fn write_translation(
        &mut self,
        entry: u16,
        row: &TranslationRow,
    ) -> Result<(), NatError> {
        let range = self
            .layout
            .translation_row(entry)
            .ok_or(NatError::CorruptChain(entry))?;
        row.write_to(&mut self.region.bytes_mut()[range]);
        Ok(())
    }

    pub(crate) fn index(&self, entry: u16) -> Result<IndexRow, NatError> {
        let range = self
            .layout
            .index_row(entry)
            .ok_or(NatError::CorruptChain(entry))?;
        Ok(IndexRow::from_bytes(&self.region.bytes()[range]))
    }

    pub(crate) fn write_index(&mut self, entry: u16, row: &IndexRow) -> Result<(), NatError> {
        let range = self
            .layout
            .index_row(entry)
            .ok_or(NatError::CorruptChain(entry))?;
        row.write_to(&mut self.region.bytes_mut()[range]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::{RegionMapper, Reservation};
    use crate::mmap::HeapMapper;
    use crate::sizing::TableSizing;

    fn arena(entries: u16) -> TableArena {
        let sizing = TableSizing::for_entries(entries).unwrap();
        let layout = TableLayout::new(sizing, 0);
        let region = HeapMapper
            .map(&Reservation {
                device: "heap".into(),
                offset: 0,
                size: sizing.region_size(),
            })
            .unwrap();
        TableArena::new(region, layout).unwrap()
    }

    #[test]
    fn rows_do_not_overlap() {
        let mut arena = arena(10);
        let total = arena.layout().total_entries();
        for entry in 0..total {
            let mut row = TranslationRow::default();
            row.set_private_ip(u32::from(entry) + 1);
            row.set_tcp_udp_chksum(entry + 1);
            arena.write_translation(entry, &row).unwrap();
            arena
                .write_index(entry, &IndexRow::new(entry + 1, entry + 2))
                .unwrap();
        }
        for entry in 0..total {
            let row = arena.translation(entry).unwrap();
            assert_eq!(row.private_ip(), u32::from(entry) + 1);
            assert_eq!(row.tcp_udp_chksum(), entry + 1);
            let index = arena.index(entry).unwrap();
            assert_eq!((index.tbl_entry(), index.next_index()), (entry + 1, entry + 2));
        }
        assert!(matches!(
            arena.translation(total),
            Err(NatError::CorruptChain(_))
        ));
        assert!(matches!(
            arena.write_index(total, &IndexRow::default()),
            Err(NatError::CorruptChain(_))
        ));

        arena.reset();
        assert!(arena.into_region().bytes().iter().all(|b| *b == 0));
    }

    #[test]
    fn region_too_small() {
        let layout = TableLayout::new(TableSizing::for_entries(10).unwrap(), 0);
        let region = HeapMapper
            .map(&Reservation {
                device: "heap".into(),
                offset: 0,
                size: 16,
            })
            .unwrap();
        assert!(matches!(
            TableArena::new(region, layout),
            Err(HwError::RegionSize {
                expected: 360,
                actual: 16
            })
        ));
    }
}
