//! Fixed-offset decoders for the MBR partition table and the ext2 superblock.
//!
//! Every multi-byte field is assembled explicitly as little-endian so the
//! result does not depend on the host byte order.

use crate::error::{CoreError, Result};

pub const SECTOR_SIZE: u64 = 512;
pub const MBR_SIZE: usize = 512;
pub const PARTITION_TABLE_OFFSET: usize = 446;
pub const PARTITION_ENTRY_SIZE: usize = 16;
const BOOT_SIGNATURE_OFFSET: usize = 510;
const BOOT_SIGNATURE: u16 = 0xAA55;

pub const SUPERBLOCK_OFFSET: u64 = 1024;
pub const SUPERBLOCK_SIZE: usize = 1024;
pub const EXT2_SUPER_MAGIC: u16 = 0xEF53;
/// Largest block size ext2 supports is 64 KiB.
const MAX_LOG_BLOCK_SIZE: u32 = 6;

#[inline]
fn field<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N]> {
    data.get(offset..offset + N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(CoreError::OutOfBounds {
            offset: (offset + N) as u64,
            max: data.len() as u64,
        })
}

pub fn read_u16_le(data: &[u8], offset: usize) -> Result<u16> {
    let [b0, b1] = field::<2>(data, offset)?;
    Ok(u16::from(b0) | (u16::from(b1) << 8))
}

pub fn read_u32_le(data: &[u8], offset: usize) -> Result<u32> {
    let [b0, b1, b2, b3] = field::<4>(data, offset)?;
    Ok(u32::from(b0) | (u32::from(b1) << 8) | (u32::from(b2) << 16) | (u32::from(b3) << 24))
}

/// Iterates a block as densely packed little-endian 32-bit block pointers.
pub fn pointers(block: &[u8]) -> impl Iterator<Item = u32> + '_ {
    block.chunks_exact(4).map(|c| {
        u32::from(c[0]) | (u32::from(c[1]) << 8) | (u32::from(c[2]) << 16) | (u32::from(c[3]) << 24)
    })
}

/// Legacy cylinder-head-sector address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Chs {
    pub head: u8,
    pub sector: u8,
    /// 10-bit cylinder: the two high bits live in the top of the sector byte.
    pub cylinder: u16,
}

impl Chs {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let [head, sector_cyl, cyl_lo] = field::<3>(data, 0)?;
        Ok(Self {
            head,
            sector: sector_cyl & 0x3F,
            cylinder: (u16::from(sector_cyl & 0xC0) << 2) | u16::from(cyl_lo),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionEntry {
    pub boot_flag: u8,
    pub start_chs: Chs,
    pub type_code: u8,
    pub end_chs: Chs,
    pub lba: u32,
    pub sector_count: u32,
}

impl PartitionEntry {
    pub fn parse(entry: &[u8]) -> Result<Self> {
        if entry.len() < PARTITION_ENTRY_SIZE {
            return Err(CoreError::OutOfBounds {
                offset: PARTITION_ENTRY_SIZE as u64,
                max: entry.len() as u64,
            });
        }

        Ok(Self {
            boot_flag: entry[0],
            start_chs: Chs::parse(&entry[1..4])?,
            type_code: entry[4],
            end_chs: Chs::parse(&entry[5..8])?,
            lba: read_u32_le(entry, 8)?,
            sector_count: read_u32_le(entry, 12)?,
        })
    }

    /// Absolute byte offset of the partition on the device.
    #[inline]
    pub fn byte_offset(&self) -> u64 {
        u64::from(self.lba) * SECTOR_SIZE
    }

    #[inline]
    pub fn byte_len(&self) -> u64 {
        u64::from(self.sector_count) * SECTOR_SIZE
    }

    #[inline]
    pub fn is_bootable(&self) -> bool {
        self.boot_flag == 0x80
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.type_code == 0 && self.sector_count == 0
    }
}

/// The first sector of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterBootRecord {
    pub first_partition: PartitionEntry,
    pub boot_signature: u16,
}

impl MasterBootRecord {
    pub fn parse(sector: &[u8]) -> Result<Self> {
        if sector.len() < MBR_SIZE {
            return Err(CoreError::Geometry(format!(
                "MBR too small: {} of {} bytes",
                sector.len(),
                MBR_SIZE
            )));
        }

        let table = &sector[PARTITION_TABLE_OFFSET..PARTITION_TABLE_OFFSET + PARTITION_ENTRY_SIZE];
        Ok(Self {
            first_partition: PartitionEntry::parse(table)?,
            boot_signature: read_u16_le(sector, BOOT_SIGNATURE_OFFSET)?,
        })
    }

    #[inline]
    pub fn has_boot_signature(&self) -> bool {
        self.boot_signature == BOOT_SIGNATURE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub inode_count: u32,
    pub block_count: u32,
    pub log_block_size: u32,
    pub magic: u16,
}

impl Superblock {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < SUPERBLOCK_SIZE {
            return Err(CoreError::Geometry(format!(
                "Superblock too small: {} of {} bytes",
                data.len(),
                SUPERBLOCK_SIZE
            )));
        }

        Ok(Self {
            inode_count: read_u32_le(data, 0x00)?,
            block_count: read_u32_le(data, 0x04)?,
            log_block_size: read_u32_le(data, 0x18)?,
            magic: read_u16_le(data, 0x38)?,
        })
    }

    /// Block size in bytes, `1 << (log_block_size + 10)`.
    pub fn block_size(&self) -> Result<u32> {
        if self.log_block_size > MAX_LOG_BLOCK_SIZE {
            return Err(CoreError::Geometry(format!(
                "implausible block size exponent {}",
                self.log_block_size
            )));
        }
        Ok(1u32 << (self.log_block_size + 10))
    }

    #[inline]
    pub fn is_magic_valid(&self) -> bool {
        self.magic == EXT2_SUPER_MAGIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn superblock_bytes(block_count: u32, log_block_size: u32, magic: u16) -> Vec<u8> {
        let mut data = vec![0u8; SUPERBLOCK_SIZE];
        data[0..4].copy_from_slice(&128u32.to_le_bytes());
        data[4..8].copy_from_slice(&block_count.to_le_bytes());
        data[0x18..0x1C].copy_from_slice(&log_block_size.to_le_bytes());
        data[0x38..0x3A].copy_from_slice(&magic.to_le_bytes());
        data
    }

    #[test]
    fn test_chs_decodes_split_cylinder() {
        let chs = Chs::parse(&[0x01, 0x81, 0x02]).unwrap();
        assert_eq!(chs.head, 1);
        assert_eq!(chs.sector, 1);
        assert_eq!(chs.cylinder, 0x202);
    }

    #[test]
    fn test_chs_max_values() {
        let chs = Chs::parse(&[0xFE, 0xFF, 0xFF]).unwrap();
        assert_eq!(chs.head, 0xFE);
        assert_eq!(chs.sector, 0x3F);
        assert_eq!(chs.cylinder, 0x3FF);
    }

    #[test]
    fn test_partition_lba_is_little_endian() {
        let entry = [
            0x80, 0x20, 0x21, 0x00, 0x83, 0x8A, 0x88, 0x82, 0x00, 0x08, 0x00, 0x00, 0x00, 0xF8,
            0x0F, 0x00,
        ];
        let part = PartitionEntry::parse(&entry).unwrap();
        assert!(part.is_bootable());
        assert_eq!(part.type_code, 0x83);
        assert_eq!(part.lba, 2048);
        assert_eq!(part.byte_offset(), 1_048_576);
        assert_eq!(part.sector_count, 0x000F_F800);
        assert_eq!(part.start_chs.head, 0x20);
        assert_eq!(part.start_chs.sector, 0x21);
        assert_eq!(part.end_chs.cylinder, 0x282);
    }

    #[test]
    fn test_partition_entry_too_short() {
        assert!(matches!(
            PartitionEntry::parse(&[0u8; 10]),
            Err(CoreError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_mbr_reads_first_entry_and_signature() {
        let mut sector = vec![0u8; MBR_SIZE];
        sector[PARTITION_TABLE_OFFSET + 4] = 0x83;
        sector[PARTITION_TABLE_OFFSET + 8..PARTITION_TABLE_OFFSET + 12]
            .copy_from_slice(&63u32.to_le_bytes());
        sector[510] = 0x55;
        sector[511] = 0xAA;

        let mbr = MasterBootRecord::parse(&sector).unwrap();
        assert_eq!(mbr.first_partition.lba, 63);
        assert_eq!(mbr.first_partition.byte_offset(), 63 * 512);
        assert!(mbr.has_boot_signature());
        assert!(!mbr.first_partition.is_empty());
    }

    #[test]
    fn test_mbr_too_short_is_geometry_error() {
        assert!(matches!(
            MasterBootRecord::parse(&[0u8; 100]),
            Err(CoreError::Geometry(_))
        ));
    }

    #[test]
    fn test_superblock_block_size() {
        let sb = Superblock::parse(&superblock_bytes(1000, 2, EXT2_SUPER_MAGIC)).unwrap();
        assert_eq!(sb.inode_count, 128);
        assert_eq!(sb.block_count, 1000);
        assert_eq!(sb.block_size().unwrap(), 4096);
        assert!(sb.is_magic_valid());

        let sb = Superblock::parse(&superblock_bytes(1000, 0, EXT2_SUPER_MAGIC)).unwrap();
        assert_eq!(sb.block_size().unwrap(), 1024);
    }

    #[test]
    fn test_superblock_implausible_exponent() {
        let sb = Superblock::parse(&superblock_bytes(1000, 40, EXT2_SUPER_MAGIC)).unwrap();
        assert!(matches!(sb.block_size(), Err(CoreError::Geometry(_))));
    }

    #[test]
    fn test_superblock_bad_magic_still_parses() {
        let sb = Superblock::parse(&superblock_bytes(1000, 2, 0x1234)).unwrap();
        assert!(!sb.is_magic_valid());
    }

    #[test]
    fn test_superblock_too_short() {
        assert!(matches!(
            Superblock::parse(&[0u8; 512]),
            Err(CoreError::Geometry(_))
        ));
    }

    #[test]
    fn test_read_past_end_is_out_of_bounds() {
        assert!(matches!(
            read_u32_le(&[1, 2, 3], 0),
            Err(CoreError::OutOfBounds { offset: 4, max: 3 })
        ));
        assert_eq!(read_u16_le(&[0x53, 0xEF], 0).unwrap(), EXT2_SUPER_MAGIC);
    }

    #[test]
    fn test_pointers_ignore_trailing_partial_entry() {
        let data = [1, 0, 0, 0, 2, 0, 0, 0, 9];
        assert_eq!(pointers(&data).collect::<Vec<_>>(), vec![1, 2]);
    }

    mod props {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_u32_matches_std_le(
                bytes in proptest::collection::vec(any::<u8>(), 4..64),
                offset in 0usize..60,
            ) {
                prop_assume!(offset + 4 <= bytes.len());
                let expected = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap());
                prop_assert_eq!(read_u32_le(&bytes, offset).unwrap(), expected);
            }

            #[test]
            fn test_chs_fields_stay_in_range(bytes in any::<[u8; 3]>()) {
                let chs = Chs::parse(&bytes).unwrap();
                prop_assert!(chs.sector <= 0x3F);
                prop_assert!(chs.cylinder <= 0x3FF);
            }
        }
    }
}
