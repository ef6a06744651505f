use tracing::{debug, info};

use crate::block::BlockAccessor;
use crate::classifier::IndirectClassifier;
use crate::error::Result;
use crate::layout::pointers;
use crate::signature::SignatureScanner;
use crate::traits::BlockSource;
use crate::types::{IndirectCandidate, IndirectKind, StartCandidate};

#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// Require short indirect blocks to point at the block right after them.
    pub strict: bool,
    /// Log a marker with the block's classification when the pass reaches it.
    pub break_at: Option<u32>,
}

/// Evidence collected by one pass over the partition.
///
/// Both lists are in strictly increasing block order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub indirect_candidates: Vec<IndirectCandidate>,
    pub start_candidates: Vec<StartCandidate>,
    pub blocks_scanned: u64,
}

impl ScanReport {
    pub fn genuine_count(&self) -> usize {
        self.count_kind(IndirectKind::Genuine)
    }

    pub fn fake_short_count(&self) -> usize {
        self.count_kind(IndirectKind::FakeShort)
    }

    fn count_kind(&self, kind: IndirectKind) -> usize {
        self.indirect_candidates
            .iter()
            .filter(|c| c.kind == kind)
            .count()
    }
}

/// Walks every block of the filesystem once, classifying each on its own.
#[derive(Debug, Clone)]
pub struct PartitionScanner {
    classifier: IndirectClassifier,
    signature: SignatureScanner,
    config: ScanConfig,
}

impl PartitionScanner {
    pub fn new(block_count: u32, signature: SignatureScanner, config: ScanConfig) -> Self {
        Self {
            classifier: IndirectClassifier::new(block_count).strict(config.strict),
            signature,
            config,
        }
    }

    pub fn scan<S: BlockSource>(&self, accessor: &mut BlockAccessor<S>) -> Result<ScanReport> {
        self.scan_with_progress(accessor, |_| {})
    }

    /// Runs the pass, calling `on_block` after each block is judged.
    ///
    /// A block that cannot be read in full aborts the pass with `ShortRead`.
    pub fn scan_with_progress<S, F>(
        &self,
        accessor: &mut BlockAccessor<S>,
        mut on_block: F,
    ) -> Result<ScanReport>
    where
        S: BlockSource,
        F: FnMut(u32),
    {
        let block_count = accessor.geometry().block_count;
        let mut buffer = accessor.block_buffer();
        let mut report = ScanReport::default();

        for index in 0..block_count {
            accessor.read_block_exact(index, &mut buffer)?;

            let kind = self.classifier.classify_at(index, &buffer);
            if let Some(kind) = kind {
                let first_pointer = pointers(&buffer).next().unwrap_or(0);
                debug!(block = index, %kind, first_pointer, "indirect candidate");
                report.indirect_candidates.push(IndirectCandidate {
                    block: index,
                    kind,
                    first_pointer,
                });
            }

            let is_start = self.signature.matches(&buffer);
            if is_start {
                let declared_length = self.signature.declared_length(&buffer).unwrap_or(0);
                debug!(block = index, declared_length, "start candidate");
                report.start_candidates.push(StartCandidate {
                    block: index,
                    declared_length,
                });
            }

            if self.config.break_at == Some(index) {
                info!(
                    block = index,
                    indirect = kind.map_or("none", |k| k.name()),
                    start = is_start,
                    "break marker reached"
                );
            }

            report.blocks_scanned += 1;
            on_block(index);
        }

        info!(
            blocks = report.blocks_scanned,
            starts = report.start_candidates.len(),
            indirect = report.indirect_candidates.len(),
            genuine = report.genuine_count(),
            fake_short = report.fake_short_count(),
            "scan finished"
        );
        Ok(report)
    }
}
