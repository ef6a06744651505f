//! Heuristic recognition of ext2 single-indirect blocks.
//!
//! Without an inode there is no authority saying which blocks hold pointers,
//! so a block is judged purely on the shape of its first entries: pointers
//! must be in range, and either form a long consecutive run or a short
//! prefix followed by nothing but zero padding.

use crate::layout::pointers;
use crate::types::IndirectKind;

/// Number of leading entries inspected.
pub const CLASSIFY_WINDOW: usize = 32;
/// A run of more consecutive steps than this is taken as a genuine block.
pub const GENUINE_RUN: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct IndirectClassifier {
    block_count: u32,
    strict: bool,
}

impl IndirectClassifier {
    pub fn new(block_count: u32) -> Self {
        Self {
            block_count,
            strict: false,
        }
    }

    /// In strict mode a short block must start right after its predecessor.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Classifies the block stored at `index`.
    ///
    /// In strict mode the expected predecessor is the block itself: ext2
    /// allocates a single-indirect block just ahead of the first data block
    /// it maps.
    pub fn classify_at(&self, index: u32, block: &[u8]) -> Option<IndirectKind> {
        let predecessor = self.strict.then_some(index);
        classify(block, self.block_count, predecessor)
    }
}

/// Classifies `block` as an array of little-endian block pointers.
///
/// `expected_predecessor`, when given, requires a short block's first entry
/// to equal `expected_predecessor + 1`.
pub fn classify(
    block: &[u8],
    block_count: u32,
    expected_predecessor: Option<u32>,
) -> Option<IndirectKind> {
    let window = (block.len() / 4).min(CLASSIFY_WINDOW);
    let mut stop = window;
    let mut first = 0u32;
    let mut previous: Option<u32> = None;
    let mut run = 0usize;

    for (i, entry) in pointers(block).take(window).enumerate() {
        if entry == 0 {
            stop = i;
            break;
        }
        if entry >= block_count {
            return None;
        }
        if i == 0 {
            first = entry;
        }

        run = match previous {
            Some(p) if p.checked_add(1) == Some(entry) => run + 1,
            _ => 0,
        };
        if run > GENUINE_RUN {
            return Some(IndirectKind::Genuine);
        }
        previous = Some(entry);
    }

    // Need at least one pointer, and zero padding inside the window.
    if stop == 0 || stop == window {
        return None;
    }

    if let Some(predecessor) = expected_predecessor {
        if predecessor.checked_add(1) != Some(first) {
            return None;
        }
    }

    pointers(block)
        .skip(stop)
        .all(|entry| entry == 0)
        .then_some(IndirectKind::FakeShort)
}
