use tracing::{info, warn};

use crate::error::{CoreError, Result};
use crate::layout::{
    MasterBootRecord, PartitionEntry, Superblock, EXT2_SUPER_MAGIC, MBR_SIZE, SUPERBLOCK_OFFSET,
    SUPERBLOCK_SIZE,
};
use crate::traits::BlockSource;

#[derive(Debug, Clone, Default)]
pub struct GeometryConfig {
    /// Treat a superblock magic mismatch as fatal instead of logging it.
    pub require_magic: bool,
}

/// Where the filesystem lives on the device and how it is cut into blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub partition: PartitionEntry,
    pub superblock: Superblock,
    pub partition_offset: u64,
    pub block_size: u32,
    pub block_count: u32,
}

impl Geometry {
    /// Reads the MBR and the superblock of the first partition.
    pub fn probe<S: BlockSource + ?Sized>(source: &mut S, config: &GeometryConfig) -> Result<Self> {
        let sector = read_region(source, 0, MBR_SIZE, "MBR")?;
        let mbr = MasterBootRecord::parse(&sector)?;
        if !mbr.has_boot_signature() {
            warn!(
                signature = %format!("{:#06x}", mbr.boot_signature),
                "MBR boot signature missing, using first partition entry anyway"
            );
        }

        let partition = mbr.first_partition;
        let partition_offset = partition.byte_offset();
        info!(
            lba = partition.lba,
            offset = %format!("{:#010x}", partition_offset),
            type_code = %format!("{:#04x}", partition.type_code),
            "first partition"
        );

        let raw = read_region(
            source,
            partition_offset + SUPERBLOCK_OFFSET,
            SUPERBLOCK_SIZE,
            "superblock",
        )?;
        let superblock = Superblock::parse(&raw)?;

        if !superblock.is_magic_valid() {
            if config.require_magic {
                return Err(CoreError::MagicMismatch {
                    found: superblock.magic,
                    expected: EXT2_SUPER_MAGIC,
                });
            }
            warn!(
                found = %format!("{:#06x}", superblock.magic),
                "superblock magic mismatch, geometry may be wrong"
            );
        }

        let geometry = Self::new(partition, superblock)?;
        info!(
            block_size = geometry.block_size,
            block_count = geometry.block_count,
            inode_count = superblock.inode_count,
            "superblock"
        );
        Ok(geometry)
    }

    pub fn new(partition: PartitionEntry, superblock: Superblock) -> Result<Self> {
        let block_size = superblock.block_size()?;
        if superblock.block_count == 0 {
            return Err(CoreError::Geometry("superblock reports zero blocks".into()));
        }

        Ok(Self {
            partition,
            superblock,
            partition_offset: partition.byte_offset(),
            block_size,
            block_count: superblock.block_count,
        })
    }

    /// Number of 32-bit block pointers an indirect block holds.
    #[inline]
    pub fn pointers_per_block(&self) -> usize {
        self.block_size as usize / 4
    }

    /// Absolute device offset of a partition-relative block.
    #[inline]
    pub fn block_offset(&self, block: u32) -> u64 {
        self.partition_offset + u64::from(block) * u64::from(self.block_size)
    }

    #[inline]
    pub fn partition_bytes(&self) -> u64 {
        u64::from(self.block_count) * u64::from(self.block_size)
    }
}

fn read_region<S: BlockSource + ?Sized>(
    source: &mut S,
    offset: u64,
    len: usize,
    what: &str,
) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = source.read_chunk(offset + filled as u64, &mut buffer[filled..])?;
        if n == 0 {
            return Err(CoreError::Geometry(format!(
                "{what} read returned {filled} of {len} bytes"
            )));
        }
        filled += n;
    }
    Ok(buffer)
}
