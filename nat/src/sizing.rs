// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Table dimensioning
//!
//! A request for `n` entries is split between the base table (80%, rounded up to a power of
//! two so that hashes can be masked) and the expansion table (20%, rounded up to an even count).
//! The index table mirrors both dimensions.

use tracing::debug;

/// Size in bytes of a base or expansion translation row.
pub const TRANSLATION_ROW_SIZE: usize = 32;
/// Size in bytes of an index or index expansion row.
pub const INDEX_ROW_SIZE: usize = 4;

/// Largest base table: every base slot must fit the 15-bit slot field of a rule handle.
pub const MAX_BASE_ENTRIES: u32 = 1 << 15;
/// Largest expansion table.
pub const MAX_EXPANSION_ENTRIES: u32 = 1 << 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SizingError {
    #[error("a table needs at least one entry")]
    ZeroEntries,
    #[error("{0} entries exceed the largest table the hardware can address")]
    TooLarge(u32),
}

/// Round `num` up to the nearest power of two. 1 is special-cased to 2, the smallest table the
/// hardware accepts.
///
/// # Errors
///
/// Fails with [`SizingError::ZeroEntries`] for 0, and with [`SizingError::TooLarge`] if the
/// result exceeds [`MAX_BASE_ENTRIES`].
pub fn nearest_power_of_two(num: u32) -> Result<u32, SizingError> {
    match num {
        0 => Err(SizingError::ZeroEntries),
        1 => Ok(2),
        n => {
            let pow = n.checked_next_power_of_two().ok_or(SizingError::TooLarge(n))?;
            if pow > MAX_BASE_ENTRIES {
                return Err(SizingError::TooLarge(pow));
            }
            Ok(pow)
        }
    }
}

/// Round `num` up to the nearest even number, and to at least 2.
#[must_use]
pub fn nearest_even(num: u32) -> u32 {
    if num < 2 { 2 } else { num + (num & 1) }
}

/// The dimensions of one NAT table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSizing {
    pub base_entries: u16,
    pub expansion_entries: u16,
}

impl TableSizing {
    /// Compute the dimensions of a table able to hold `requested` entries.
    ///
    /// A request for 0 entries is refused instead of being rounded up to the smallest table.
    ///
    /// # Errors
    ///
    /// Fails if `requested` is 0 or if the table would be too large to address.
    pub fn for_entries(requested: u16) -> Result<Self, SizingError> {
        if requested == 0 {
            return Err(SizingError::ZeroEntries);
        }
        let requested = u32::from(requested);

        let base = (requested * 4 / 5).max(1);
        let base_entries = nearest_power_of_two(base)?;

        let expansion_entries = nearest_even(requested / 5);
        if expansion_entries > MAX_EXPANSION_ENTRIES {
            return Err(SizingError::TooLarge(expansion_entries));
        }

        debug!(
            "Sizing for {requested} entries: base {base_entries}, expansion {expansion_entries}"
        );
        Ok(Self {
            base_entries: u16::try_from(base_entries).map_err(|_| SizingError::TooLarge(base))?,
            expansion_entries: u16::try_from(expansion_entries)
                .map_err(|_| SizingError::TooLarge(expansion_entries))?,
        })
    }

    #[must_use]
    pub fn total_entries(&self) -> usize {
        usize::from(self.base_entries) + usize::from(self.expansion_entries)
    }

    /// Bytes needed for the four sub-tables.
    #[must_use]
    pub fn region_size(&self) -> usize {
        self.total_entries() * (TRANSLATION_ROW_SIZE + INDEX_ROW_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_of_two_rounding() {
        assert_eq!(nearest_power_of_two(0), Err(SizingError::ZeroEntries));
        assert_eq!(nearest_power_of_two(1), Ok(2));
        assert_eq!(nearest_power_of_two(2), Ok(2));
        assert_eq!(nearest_power_of_two(3), Ok(4));
        assert_eq!(nearest_power_of_two(80), Ok(128));
        assert_eq!(nearest_power_of_two(32768), Ok(32768));
        assert_eq!(nearest_power_of_two(32769), Err(SizingError::TooLarge(65536)));
    }

    #[test]
    fn even_rounding() {
        assert_eq!(nearest_even(0), 2);
        assert_eq!(nearest_even(1), 2);
        assert_eq!(nearest_even(2), 2);
        assert_eq!(nearest_even(3), 4);
        assert_eq!(nearest_even(20), 20);
    }

    #[test]
    fn table_dimensions() {
        let sizing = TableSizing::for_entries(10).unwrap();
        assert_eq!(sizing.base_entries, 8);
        assert_eq!(sizing.expansion_entries, 2);
        assert_eq!(sizing.region_size(), 10 * 36);

        let sizing = TableSizing::for_entries(1).unwrap();
        assert_eq!((sizing.base_entries, sizing.expansion_entries), (2, 2));

        let sizing = TableSizing::for_entries(100).unwrap();
        assert_eq!((sizing.base_entries, sizing.expansion_entries), (128, 20));

        let sizing = TableSizing::for_entries(40961).unwrap();
        assert_eq!(sizing.base_entries, 32768);

        assert_eq!(TableSizing::for_entries(0), Err(SizingError::ZeroEntries));
        assert!(matches!(
            TableSizing::for_entries(40962),
            Err(SizingError::TooLarge(_))
        ));
    }

    #[test]
    fn sizing_invariants() {
        bolero::check!().with_type().for_each(|requested: &u16| {
            let Ok(sizing) = TableSizing::for_entries(*requested) else {
                assert!(*requested == 0 || u32::from(*requested) * 4 / 5 > MAX_BASE_ENTRIES);
                return;
            };
            let base = u32::from(sizing.base_entries);
            assert!(base.is_power_of_two());
            assert!(base >= 2);
            assert!(base >= u32::from(*requested) * 4 / 5);
            assert_eq!(sizing.expansion_entries % 2, 0);
            assert!(sizing.expansion_entries >= 2);
        });
    }
}
