//! Reconstruction of a carved file from scan evidence.
//!
//! The engine assumes the file was laid out the way ext2 allocates a
//! mostly contiguous file: twelve direct blocks starting at the start
//! candidate, then one single-indirect block, then a double-indirect block
//! whose entries are single-indirect blocks. Which indirect candidates belong
//! to the file is decided by pointer continuity alone.

use std::io::Write;

use tracing::{debug, info, warn};

use crate::block::BlockAccessor;
use crate::error::{CoreError, Result};
use crate::layout::{pointers, read_u32_le};
use crate::scan::ScanReport;
use crate::signature::HEADER_ADJUSTMENT;
use crate::traits::BlockSource;
use crate::types::{IndirectCandidate, StartCandidate};

/// Direct pointers in an ext2 inode; the start block occupies the first.
pub const DIRECT_POINTERS: u32 = 12;

#[derive(Debug, Clone, Default)]
pub struct RecoveryConfig {
    /// Which start candidate to reconstruct, in scan order.
    pub start_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    Header,
    DirectBlocks,
    FirstIndirectSearch,
    FirstIndirectWalk { indirect: u32 },
    SecondIndirectSearch,
    DoubleIndirectWalk { double: u32 },
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryOutcome {
    pub start_block: u32,
    pub declared_length: u64,
    pub bytes_written: u64,
    pub blocks_written: u64,
    pub indirect_block: Option<u32>,
    pub double_indirect_block: Option<u32>,
    /// False when the block lists ran out before the declared length.
    pub complete: bool,
}

pub struct RecoveryEngine<'a> {
    report: &'a ScanReport,
    config: RecoveryConfig,
}

impl<'a> RecoveryEngine<'a> {
    pub fn new(report: &'a ScanReport, config: RecoveryConfig) -> Self {
        Self { report, config }
    }

    pub fn start_candidate(&self) -> Result<StartCandidate> {
        let starts = &self.report.start_candidates;
        if starts.is_empty() {
            return Err(CoreError::NoStartCandidate);
        }
        starts
            .get(self.config.start_index)
            .copied()
            .ok_or(CoreError::StartCandidateOutOfRange {
                index: self.config.start_index,
                available: starts.len(),
            })
    }

    /// Streams the reconstructed file into `out`.
    ///
    /// On a fatal error whatever was already written stays in `out`.
    pub fn recover<S, W>(
        &self,
        accessor: &mut BlockAccessor<S>,
        out: &mut W,
    ) -> Result<RecoveryOutcome>
    where
        S: BlockSource,
        W: Write,
    {
        let start = self.start_candidate()?;
        let mut run = Reconstruction {
            buffer: accessor.block_buffer(),
            accessor,
            out,
            remaining: 0,
            current: start.block,
            outcome: RecoveryOutcome {
                start_block: start.block,
                declared_length: 0,
                bytes_written: 0,
                blocks_written: 0,
                indirect_block: None,
                double_indirect_block: None,
                complete: false,
            },
        };

        let mut state = RecoveryState::Header;
        while state != RecoveryState::Done {
            debug!(?state, current = run.current, remaining = run.remaining, "recovery step");
            state = match state {
                RecoveryState::Header => {
                    run.header(start.block)?;
                    run.unless_done(RecoveryState::DirectBlocks)
                }
                RecoveryState::DirectBlocks => {
                    run.direct_blocks(start.block)?;
                    run.unless_done(RecoveryState::FirstIndirectSearch)
                }
                RecoveryState::FirstIndirectSearch => {
                    let candidates = &self.report.indirect_candidates;
                    let candidate = find_single_indirect(candidates, run.current)
                        .ok_or(CoreError::IndirectNotFound { after: run.current })?;
                    info!(block = candidate.block, kind = %candidate.kind, "single-indirect block");
                    run.outcome.indirect_block = Some(candidate.block);
                    RecoveryState::FirstIndirectWalk {
                        indirect: candidate.block,
                    }
                }
                RecoveryState::FirstIndirectWalk { indirect } => {
                    run.walk_indirect(indirect)?;
                    run.unless_done(RecoveryState::SecondIndirectSearch)
                }
                RecoveryState::SecondIndirectSearch => {
                    let (double, single) =
                        find_double_indirect(&self.report.indirect_candidates, run.current)
                            .ok_or(CoreError::DoubleIndirectNotFound { after: run.current })?;
                    info!(
                        block = double.block,
                        first_single = single.block,
                        "double-indirect block"
                    );
                    run.outcome.double_indirect_block = Some(double.block);
                    RecoveryState::DoubleIndirectWalk {
                        double: double.block,
                    }
                }
                RecoveryState::DoubleIndirectWalk { double } => {
                    run.walk_double_indirect(double)?;
                    RecoveryState::Done
                }
                RecoveryState::Done => RecoveryState::Done,
            };
        }

        run.out.flush()?;
        run.outcome.complete = run.remaining == 0;
        if !run.outcome.complete {
            warn!(
                remaining = run.remaining,
                "block lists exhausted, output is incomplete"
            );
        }
        info!(
            bytes = run.outcome.bytes_written,
            blocks = run.outcome.blocks_written,
            "recovery finished"
        );
        Ok(run.outcome)
    }
}

struct Reconstruction<'r, S, W> {
    accessor: &'r mut BlockAccessor<S>,
    out: &'r mut W,
    buffer: Vec<u8>,
    remaining: u64,
    /// Last data block written.
    current: u32,
    outcome: RecoveryOutcome,
}

impl<S: BlockSource, W: Write> Reconstruction<'_, S, W> {
    fn unless_done(&self, next: RecoveryState) -> RecoveryState {
        if self.remaining == 0 {
            RecoveryState::Done
        } else {
            next
        }
    }

    fn header(&mut self, start: u32) -> Result<()> {
        let read = self.accessor.read_block(start, &mut self.buffer)?;
        let size = read_u32_le(&self.buffer[..read], 4).map_err(|_| CoreError::ShortRead {
            block: start,
            expected: 8,
            actual: read,
        })?;
        self.remaining = u64::from(size) + HEADER_ADJUSTMENT;
        self.outcome.declared_length = self.remaining;
        info!(block = start, declared_length = self.remaining, "file header");
        self.write_buffer(start, read)
    }

    fn direct_blocks(&mut self, start: u32) -> Result<()> {
        for i in 1..DIRECT_POINTERS {
            if self.remaining == 0 {
                break;
            }
            let block = start.checked_add(i).ok_or(CoreError::PointerOutOfRange {
                pointer: u32::MAX,
                block_count: self.accessor.geometry().block_count,
            })?;
            self.emit(block)?;
        }
        Ok(())
    }

    fn walk_indirect(&mut self, indirect: u32) -> Result<()> {
        for pointer in self.read_pointers(indirect)? {
            if self.remaining == 0 {
                break;
            }
            if pointer == 0 {
                self.emit_hole()?;
            } else {
                self.emit(pointer)?;
            }
        }
        Ok(())
    }

    /// Stops at the first zero entry instead of padding a whole range.
    fn walk_double_indirect(&mut self, double: u32) -> Result<()> {
        for (slot, single) in self.read_pointers(double)?.into_iter().enumerate() {
            if self.remaining == 0 {
                break;
            }
            if single == 0 {
                warn!(
                    block = double,
                    slot,
                    remaining = self.remaining,
                    "double-indirect block ends early"
                );
                break;
            }
            self.walk_indirect(single)?;
        }
        Ok(())
    }

    fn read_pointers(&mut self, block: u32) -> Result<Vec<u32>> {
        self.check_pointer(block)?;
        self.accessor.read_block_exact(block, &mut self.buffer)?;
        Ok(pointers(&self.buffer).collect())
    }

    fn check_pointer(&self, pointer: u32) -> Result<()> {
        let block_count = self.accessor.geometry().block_count;
        if pointer >= block_count {
            return Err(CoreError::PointerOutOfRange {
                pointer,
                block_count,
            });
        }
        Ok(())
    }

    fn emit(&mut self, block: u32) -> Result<()> {
        self.check_pointer(block)?;
        let read = self.accessor.read_block(block, &mut self.buffer)?;
        self.write_buffer(block, read)?;
        self.current = block;
        Ok(())
    }

    /// Writes the part of the freshly read `block` that is still owed.
    /// A short read is fine as long as it covers the remaining length.
    fn write_buffer(&mut self, block: u32, read: usize) -> Result<()> {
        let take = self.take();
        if read < take {
            return Err(CoreError::ShortRead {
                block,
                expected: take,
                actual: read,
            });
        }
        self.out.write_all(&self.buffer[..take])?;
        self.account(take);
        Ok(())
    }

    fn emit_hole(&mut self) -> Result<()> {
        warn!(after = self.current, "zero pointer, writing hole");
        self.buffer.fill(0);
        let take = self.take();
        self.out.write_all(&self.buffer[..take])?;
        self.account(take);
        Ok(())
    }

    #[inline]
    fn take(&self) -> usize {
        self.remaining.min(self.accessor.block_size() as u64) as usize
    }

    #[inline]
    fn account(&mut self, written: usize) {
        self.remaining -= written as u64;
        self.outcome.bytes_written += written as u64;
        self.outcome.blocks_written += 1;
    }
}

/// How a candidate chain lines up with the last data block written.
/// Earlier variants win; the lowest block index breaks ties within one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Continuation {
    /// Pointer blocks right after `current`, data right after them.
    Interleaved,
    /// First data block is `current + 1`; pointer blocks live elsewhere.
    Exact,
    /// Only the double-indirect block sits between `current` and the data.
    Detached,
}

fn single_continuation(candidate: &IndirectCandidate, current: u32) -> Option<Continuation> {
    let next = current.checked_add(1)?;
    if candidate.block == next && Some(candidate.first_pointer) == next.checked_add(1) {
        Some(Continuation::Interleaved)
    } else if candidate.first_pointer == next {
        Some(Continuation::Exact)
    } else {
        None
    }
}

fn double_continuation(
    double: &IndirectCandidate,
    single: &IndirectCandidate,
    current: u32,
) -> Option<Continuation> {
    if single.block == double.block {
        return None;
    }
    let next = current.checked_add(1)?;
    let after = next.checked_add(1);
    if double.block == next
        && Some(single.block) == after
        && Some(single.first_pointer) == after.and_then(|b| b.checked_add(1))
    {
        Some(Continuation::Interleaved)
    } else if single.first_pointer == next {
        Some(Continuation::Exact)
    } else if double.block == next && Some(single.first_pointer) == after {
        Some(Continuation::Detached)
    } else {
        None
    }
}

/// Best-ranked candidate whose block list picks up right after `current`.
pub fn find_single_indirect(
    candidates: &[IndirectCandidate],
    current: u32,
) -> Option<&IndirectCandidate> {
    let matching: Vec<_> = candidates
        .iter()
        .filter_map(|c| Some((single_continuation(c, current)?, c)))
        .collect();
    let (rank, chosen) = matching.iter().min_by_key(|(rank, c)| (*rank, c.block))?;
    if matching.len() > 1 {
        debug!(
            chosen = chosen.block,
            ?rank,
            others = matching.len() - 1,
            "several single-indirect candidates continue"
        );
    }
    Some(*chosen)
}

/// Best-ranked candidate pointing at another candidate that continues
/// after `current`. Returns the double-indirect block and its first entry.
///
/// `candidates` must be sorted by block index, as [`ScanReport`] keeps them.
pub fn find_double_indirect(
    candidates: &[IndirectCandidate],
    current: u32,
) -> Option<(&IndirectCandidate, &IndirectCandidate)> {
    let matching: Vec<_> = candidates
        .iter()
        .filter_map(|double| {
            let single = candidates
                .binary_search_by_key(&double.first_pointer, |c| c.block)
                .ok()
                .map(|i| &candidates[i])?;
            Some((double_continuation(double, single, current)?, double, single))
        })
        .collect();
    let &(rank, double, single) = matching
        .iter()
        .min_by_key(|(rank, double, _)| (*rank, double.block))?;
    if matching.len() > 1 {
        debug!(
            chosen = double.block,
            ?rank,
            others = matching.len() - 1,
            "several double-indirect candidates continue"
        );
    }
    Some((double, single))
}
