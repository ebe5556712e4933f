//! Fixup-site packing for the emitted relocation directory.
//!
//! The loader processes relocation blocks in file order and applies every
//! entry linearly; stacked fixups on one word compose additively. To keep
//! overlapping rewrites correct, packed blocks are emitted in *reverse*
//! order of the rewrite queue: each queued block's sites open new packed
//! blocks at the front of the list while the queue itself is walked
//! forward. That front insertion is a correctness requirement, not a data
//! structure preference.

use std::collections::VecDeque;

use crate::pe::RELOC_BLOCK_SPAN;

/// An in-progress relocation block: a begin RVA plus 12-bit offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedBlock {
    /// RVA all recorded offsets are relative to
    pub begin_rva: u32,
    /// 12-bit offsets of the recorded fixup sites
    pub offsets: Vec<u16>,
}

/// Accumulator for [`PackedBlock`]s with front-insertion semantics.
#[derive(Debug, Default)]
pub struct PackedBlocks {
    blocks: VecDeque<PackedBlock>,
}

impl PackedBlocks {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new packed block at `rva`, in front of every earlier one.
    ///
    /// Called once per rewrite block, before its first site is recorded.
    pub fn open(&mut self, rva: u32) {
        self.blocks.push_front(PackedBlock {
            begin_rva: rva,
            offsets: Vec::new(),
        });
    }

    /// Records a fixup site at `rva` into the current (front) block.
    ///
    /// When the site falls 4096 or more bytes past the current block's
    /// begin RVA, a fresh block is opened at `rva` first; the 12-bit offset
    /// field cannot reach further.
    ///
    /// # Panics
    ///
    /// Panics if no block has been opened; the emitter always calls
    /// [`PackedBlocks::open`] before recording.
    pub fn record(&mut self, rva: u32) {
        let mut rva_offset = rva - self.blocks.front().expect("no open packed block").begin_rva;
        if rva_offset >= RELOC_BLOCK_SPAN {
            self.open(rva);
            rva_offset = 0;
        }

        self.blocks
            .front_mut()
            .expect("no open packed block")
            .offsets
            .push(rva_offset as u16);
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of packed blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Iterates the blocks in emission order (reverse of queue order).
    pub fn iter(&self) -> impl Iterator<Item = &PackedBlock> {
        self.blocks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_offsets_relative_to_begin() {
        let mut packed = PackedBlocks::new();
        packed.open(0x1040);
        packed.record(0x1040);
        packed.record(0x1044);

        let blocks: Vec<_> = packed.iter().collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].begin_rva, 0x1040);
        assert_eq!(blocks[0].offsets, vec![0, 4]);
    }

    #[test]
    fn splits_at_block_span() {
        let mut packed = PackedBlocks::new();
        packed.open(0x1000);

        // 1250 word sites spanning 5000 bytes: must split into two blocks.
        let mut rva = 0x1000_u32;
        for _ in 0..1250 {
            packed.record(rva);
            rva += 4;
        }

        assert_eq!(packed.len(), 2);
        let blocks: Vec<_> = packed.iter().collect();
        // Newest block sits at the front.
        assert_eq!(blocks[0].begin_rva, 0x2000);
        assert_eq!(blocks[0].offsets.len(), 226);
        assert_eq!(blocks[0].offsets[0], 0);
        assert_eq!(blocks[1].begin_rva, 0x1000);
        assert_eq!(blocks[1].offsets.len(), 1024);
        assert_eq!(*blocks[1].offsets.last().unwrap(), 4092);
    }

    #[test]
    fn queue_order_reverses_in_emission() {
        let mut packed = PackedBlocks::new();
        packed.open(0x1000);
        packed.record(0x1000);
        packed.open(0x3000);
        packed.record(0x3000);

        let begins: Vec<_> = packed.iter().map(|b| b.begin_rva).collect();
        assert_eq!(begins, vec![0x3000, 0x1000]);
    }

    #[test]
    fn every_offset_fits_twelve_bits() {
        let mut packed = PackedBlocks::new();
        packed.open(0x1FFC);
        let mut rva = 0x1FFC_u32;
        for _ in 0..2048 {
            packed.record(rva);
            rva += 4;
        }

        for block in packed.iter() {
            for &offset in &block.offsets {
                assert!(u32::from(offset) < RELOC_BLOCK_SPAN);
            }
        }
    }
}
