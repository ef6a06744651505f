#![allow(dead_code)]

use e2carve_core::layout::{EXT2_SUPER_MAGIC, PARTITION_TABLE_OFFSET};
use e2carve_core::{
    BlockAccessor, Geometry, GeometryConfig, PartitionScanner, RecoveryConfig, RecoveryEngine,
    RecoveryOutcome, Result, ScanConfig, ScanReport, SignatureScanner,
};

pub const BLOCK_SIZE: usize = 1024;
pub const POINTERS_PER_BLOCK: usize = BLOCK_SIZE / 4;
pub const PARTITION_LBA: u32 = 8;
pub const PARTITION_OFFSET: usize = PARTITION_LBA as usize * 512;

/// MBR + ext2 image with 1 KiB blocks; the superblock occupies block 1.
pub struct ImageBuilder {
    data: Vec<u8>,
}

impl ImageBuilder {
    pub fn new(block_count: u32) -> Self {
        let mut data = vec![0u8; PARTITION_OFFSET + block_count as usize * BLOCK_SIZE];
        data[PARTITION_TABLE_OFFSET] = 0x80;
        data[PARTITION_TABLE_OFFSET + 4] = 0x83;
        data[PARTITION_TABLE_OFFSET + 8..PARTITION_TABLE_OFFSET + 12]
            .copy_from_slice(&PARTITION_LBA.to_le_bytes());
        data[PARTITION_TABLE_OFFSET + 12..PARTITION_TABLE_OFFSET + 16]
            .copy_from_slice(&(block_count * 2).to_le_bytes());
        data[510] = 0x55;
        data[511] = 0xAA;

        let sb = PARTITION_OFFSET + 1024;
        data[sb..sb + 4].copy_from_slice(&64u32.to_le_bytes());
        data[sb + 4..sb + 8].copy_from_slice(&block_count.to_le_bytes());
        data[sb + 0x18..sb + 0x1C].copy_from_slice(&0u32.to_le_bytes());
        data[sb + 0x38..sb + 0x3A].copy_from_slice(&EXT2_SUPER_MAGIC.to_le_bytes());
        Self { data }
    }

    pub fn block_mut(&mut self, block: u32) -> &mut [u8] {
        let start = PARTITION_OFFSET + block as usize * BLOCK_SIZE;
        &mut self.data[start..start + BLOCK_SIZE]
    }

    pub fn put_pointers(&mut self, block: u32, entries: &[u32]) -> &mut Self {
        let dst = self.block_mut(block);
        dst.fill(0);
        for (i, e) in entries.iter().enumerate() {
            dst[i * 4..i * 4 + 4].copy_from_slice(&e.to_le_bytes());
        }
        self
    }

    /// Writes `file` across `blocks`, zero-padding the last one.
    pub fn put_file(&mut self, file: &[u8], blocks: &[u32]) -> &mut Self {
        for (chunk, &block) in file.chunks(BLOCK_SIZE).zip(blocks) {
            let dst = self.block_mut(block);
            dst.fill(0);
            dst[..chunk.len()].copy_from_slice(chunk);
        }
        self
    }

    pub fn put_layout(&mut self, file: &[u8], layout: &Layout) -> &mut Self {
        self.put_file(file, &layout.data);
        for (block, entries) in &layout.metadata {
            self.put_pointers(*block, entries);
        }
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.data.clone()
    }
}

/// A RIFF/WEBP file of `len` bytes whose payload never contains zero bytes,
/// so no data block can pass as an indirect block.
pub fn webp_file(len: usize, seed: u8) -> Vec<u8> {
    assert!(len >= 12);
    let mut file = Vec::with_capacity(len);
    file.extend_from_slice(b"RIFF");
    file.extend_from_slice(&((len - 8) as u32).to_le_bytes());
    file.extend_from_slice(b"WEBP");
    let mut i = 0usize;
    while file.len() < len {
        file.push(((i.wrapping_mul(131) + seed as usize * 7 + 17) % 251 + 1) as u8);
        i += 1;
    }
    file
}

pub fn blocks_for(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE)
}

/// Physical placement of a file's data and pointer blocks.
#[derive(Debug, Default)]
pub struct Layout {
    pub data: Vec<u32>,
    pub metadata: Vec<(u32, Vec<u32>)>,
    pub indirect: Option<u32>,
    pub double: Option<u32>,
}

/// Contiguous allocation the way ext2 does it: each pointer block sits just
/// before the data it maps.
pub fn ext2_layout(start: u32, blocks: usize) -> Layout {
    let mut next = start;
    let mut alloc = move || {
        let b = next;
        next += 1;
        b
    };
    let mut layout = Layout::default();
    let direct = blocks.min(12);
    for _ in 0..direct {
        layout.data.push(alloc());
    }
    let mut left = blocks - direct;

    if left > 0 {
        let ind = alloc();
        let count = left.min(POINTERS_PER_BLOCK);
        let entries: Vec<u32> = (0..count).map(|_| alloc()).collect();
        layout.data.extend(&entries);
        layout.metadata.push((ind, entries));
        layout.indirect = Some(ind);
        left -= count;
    }

    if left > 0 {
        let dind = alloc();
        let mut singles = Vec::new();
        while left > 0 {
            let single = alloc();
            let count = left.min(POINTERS_PER_BLOCK);
            let entries: Vec<u32> = (0..count).map(|_| alloc()).collect();
            layout.data.extend(&entries);
            layout.metadata.push((single, entries));
            singles.push(single);
            left -= count;
        }
        layout.metadata.push((dind, singles));
        layout.double = Some(dind);
    }
    layout
}

/// Data blocks fully contiguous, pointer blocks parked at `meta_base`.
pub fn detached_layout(start: u32, blocks: usize, meta_base: u32) -> Layout {
    let mut layout = Layout {
        data: (start..start + blocks as u32).collect(),
        ..Layout::default()
    };
    let mut mapped = layout.data.iter().copied().skip(12).peekable();
    let mut meta = meta_base;

    if mapped.peek().is_some() {
        let entries: Vec<u32> = mapped.by_ref().take(POINTERS_PER_BLOCK).collect();
        layout.metadata.push((meta, entries));
        layout.indirect = Some(meta);
        meta += 1;
    }

    if mapped.peek().is_some() {
        let dind = meta;
        meta += 1;
        let mut singles = Vec::new();
        while mapped.peek().is_some() {
            let entries: Vec<u32> = mapped.by_ref().take(POINTERS_PER_BLOCK).collect();
            layout.metadata.push((meta, entries));
            singles.push(meta);
            meta += 1;
        }
        layout.metadata.push((dind, singles));
        layout.double = Some(dind);
    }
    layout
}

pub fn open(image: Vec<u8>) -> BlockAccessor<Vec<u8>> {
    let mut image = image;
    let geometry = Geometry::probe(&mut image, &GeometryConfig::default()).unwrap();
    BlockAccessor::new(image, geometry)
}

pub fn scan(accessor: &mut BlockAccessor<Vec<u8>>, strict: bool) -> ScanReport {
    let config = ScanConfig {
        strict,
        break_at: None,
    };
    PartitionScanner::new(
        accessor.geometry().block_count,
        SignatureScanner::webp(),
        config,
    )
    .scan(accessor)
    .unwrap()
}

/// Scans and reconstructs in one go, returning whatever was written even
/// when recovery fails.
pub fn carve(image: Vec<u8>, start_index: usize) -> (Result<RecoveryOutcome>, Vec<u8>) {
    let mut accessor = open(image);
    let report = scan(&mut accessor, false);
    let mut out = Vec::new();
    let engine = RecoveryEngine::new(&report, RecoveryConfig { start_index });
    let result = engine.recover(&mut accessor, &mut out);
    (result, out)
}
