use crate::error::{CoreError, Result};
use crate::geometry::Geometry;
use crate::traits::BlockSource;

/// Reads whole filesystem blocks addressed relative to the partition start.
pub struct BlockAccessor<S> {
    source: S,
    geometry: Geometry,
}

impl<S: BlockSource> BlockAccessor<S> {
    pub fn new(source: S, geometry: Geometry) -> Self {
        Self { source, geometry }
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.geometry.block_size as usize
    }

    /// Allocates a buffer sized for one block.
    pub fn block_buffer(&self) -> Vec<u8> {
        vec![0u8; self.block_size()]
    }

    /// Reads block `index` into `buffer`, returning how many bytes were filled.
    ///
    /// Partial reads from the source are retried until the block is full or
    /// the source reports end of data, so a short count always means the
    /// block runs past the end of the device.
    pub fn read_block(&mut self, index: u32, buffer: &mut [u8]) -> Result<usize> {
        let len = self.block_size().min(buffer.len());
        let offset = self.geometry.block_offset(index);
        let mut filled = 0;
        while filled < len {
            let n = self
                .source
                .read_chunk(offset + filled as u64, &mut buffer[filled..len])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Like [`read_block`](Self::read_block) but fails with `ShortRead`
    /// unless the whole block was read.
    pub fn read_block_exact(&mut self, index: u32, buffer: &mut [u8]) -> Result<()> {
        let expected = self.block_size();
        if buffer.len() < expected {
            return Err(CoreError::InvalidBufferSize {
                expected,
                actual: buffer.len(),
            });
        }
        let actual = self.read_block(index, buffer)?;
        if actual < expected {
            return Err(CoreError::ShortRead {
                block: index,
                expected,
                actual,
            });
        }
        Ok(())
    }
}
