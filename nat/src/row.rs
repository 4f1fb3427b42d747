// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Hardware row formats
//!
//! Rows are sequences of little-endian 32-bit words. Fields are described by their word, bit
//! offset and width, and only ever accessed through shift and mask.

use crate::sizing::{INDEX_ROW_SIZE, TRANSLATION_ROW_SIZE};

#[derive(Debug, Clone, Copy)]
struct Field {
    word: usize,
    shift: u32,
    width: u32,
}

impl Field {
    const fn new(word: usize, shift: u32, width: u32) -> Self {
        Self { word, shift, width }
    }

    const fn mask(self) -> u32 {
        if self.width == 32 {
            u32::MAX
        } else {
            ((1 << self.width) - 1) << self.shift
        }
    }

    fn get(self, words: &[u32]) -> u32 {
        (words[self.word] & self.mask()) >> self.shift
    }

    fn set(self, words: &mut [u32], value: u32) {
        let word = &mut words[self.word];
        *word = (*word & !self.mask()) | ((value << self.shift) & self.mask());
    }
}

const PRIVATE_IP: Field = Field::new(0, 0, 32);
const TARGET_IP: Field = Field::new(1, 0, 32);
const NEXT_INDEX: Field = Field::new(2, 0, 16);
const PUBLIC_PORT: Field = Field::new(2, 16, 16);
const PRIVATE_PORT: Field = Field::new(3, 0, 16);
const TARGET_PORT: Field = Field::new(3, 16, 16);
const IP_CHKSUM: Field = Field::new(4, 0, 16);
const REDIRECT: Field = Field::new(4, 30, 1);
const ENABLE: Field = Field::new(4, 31, 1);
const TIME_STAMP: Field = Field::new(5, 0, 24);
const PROTOCOL: Field = Field::new(5, 24, 8);
const PREV_INDEX: Field = Field::new(6, 0, 16);
const INDX_TBL_ENTRY: Field = Field::new(6, 16, 16);
const PDN_INDEX: Field = Field::new(7, 0, 3);
const TCP_UDP_CHKSUM: Field = Field::new(7, 16, 16);

/// Word of a translation row holding the enable and redirect flags.
pub(crate) const FLAGS_WORD: usize = 4;
pub(crate) const FLAGS_WORD_OFFSET: usize = FLAGS_WORD * 4;
/// Value of the flags word bit marking a row as live.
pub(crate) const ENABLE_FLAG: u32 = 1 << 31;

const TRANSLATION_WORDS: usize = TRANSLATION_ROW_SIZE / 4;

fn read_words<const N: usize>(bytes: &[u8]) -> [u32; N] {
    let mut words = [0u32; N];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    words
}

fn write_words(words: &[u32], bytes: &mut [u8]) {
    for (word, chunk) in words.iter().zip(bytes.chunks_exact_mut(4)) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
}

macro_rules! accessors {
    ($($get:ident, $set:ident, $field:ident, $ty:ty;)*) => {
        $(
            #[allow(clippy::cast_possible_truncation)]
            pub(crate) fn $get(&self) -> $ty {
                $field.get(&self.words) as $ty
            }
            pub(crate) fn $set(&mut self, value: $ty) {
                $field.set(&mut self.words, u32::from(value));
            }
        )*
    };
}

/// A base or expansion translation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct TranslationRow {
    words: [u32; TRANSLATION_WORDS],
}

impl TranslationRow {
    pub(crate) fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            words: read_words(bytes),
        }
    }

    pub(crate) fn write_to(&self, bytes: &mut [u8]) {
        write_words(&self.words, bytes);
    }

    accessors! {
        next_index, set_next_index, NEXT_INDEX, u16;
        public_port, set_public_port, PUBLIC_PORT, u16;
        private_port, set_private_port, PRIVATE_PORT, u16;
        target_port, set_target_port, TARGET_PORT, u16;
        ip_chksum, set_ip_chksum, IP_CHKSUM, u16;
        protocol, set_protocol, PROTOCOL, u8;
        prev_index, set_prev_index, PREV_INDEX, u16;
        indx_tbl_entry, set_indx_tbl_entry, INDX_TBL_ENTRY, u16;
        pdn_index, set_pdn_index, PDN_INDEX, u8;
        tcp_udp_chksum, set_tcp_udp_chksum, TCP_UDP_CHKSUM, u16;
    }

    pub(crate) fn private_ip(&self) -> u32 {
        PRIVATE_IP.get(&self.words)
    }

    pub(crate) fn set_private_ip(&mut self, value: u32) {
        PRIVATE_IP.set(&mut self.words, value);
    }

    pub(crate) fn target_ip(&self) -> u32 {
        TARGET_IP.get(&self.words)
    }

    pub(crate) fn set_target_ip(&mut self, value: u32) {
        TARGET_IP.set(&mut self.words, value);
    }

    pub(crate) fn time_stamp(&self) -> u32 {
        TIME_STAMP.get(&self.words)
    }

    /// Stores the low 24 bits of `value`.
    pub(crate) fn set_time_stamp(&mut self, value: u32) {
        TIME_STAMP.set(&mut self.words, value);
    }

    pub(crate) fn enabled(&self) -> bool {
        ENABLE.get(&self.words) != 0
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        ENABLE.set(&mut self.words, u32::from(enabled));
    }

    pub(crate) fn redirect(&self) -> bool {
        REDIRECT.get(&self.words) != 0
    }

    pub(crate) fn set_redirect(&mut self, redirect: bool) {
        REDIRECT.set(&mut self.words, u32::from(redirect));
    }

    pub(crate) fn flags(&self) -> u32 {
        self.words[FLAGS_WORD]
    }

    /// A row holding nothing but a chain link.
    pub(crate) fn link_only(next_index: u16) -> Self {
        let mut row = Self::default();
        row.set_next_index(next_index);
        row
    }
}

/// An index or index expansion row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct IndexRow {
    words: [u32; INDEX_ROW_SIZE / 4],
}

const TBL_ENTRY: Field = Field::new(0, 0, 16);
const INDEX_NEXT: Field = Field::new(0, 16, 16);

impl IndexRow {
    pub(crate) fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            words: read_words(bytes),
        }
    }

    pub(crate) fn write_to(&self, bytes: &mut [u8]) {
        write_words(&self.words, bytes);
    }

    pub(crate) fn new(tbl_entry: u16, next_index: u16) -> Self {
        let mut row = Self::default();
        row.set_tbl_entry(tbl_entry);
        row.set_next_index(next_index);
        row
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn tbl_entry(&self) -> u16 {
        TBL_ENTRY.get(&self.words) as u16
    }

    pub(crate) fn set_tbl_entry(&mut self, value: u16) {
        TBL_ENTRY.set(&mut self.words, u32::from(value));
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn next_index(&self) -> u16 {
        INDEX_NEXT.get(&self.words) as u16
    }

    pub(crate) fn set_next_index(&mut self, value: u16) {
        INDEX_NEXT.set(&mut self.words, u32::from(value));
    }
}
