//! Port through which the carving pipeline reaches the device.
//!
//! The core never opens files itself. Adapters in `e2carve_io` wrap block
//! devices and image files; tests and fuzz targets use an in-memory image.

use crate::error::Result;

/// A source of raw bytes addressed by absolute device offset.
///
/// Implementations must be positional: a call must not depend on where a
/// previous call left off. The scanner and the recovery engine share one
/// source sequentially and never interleave their reads.
///
/// # Example
///
/// ```ignore
/// struct Device { /* ... */ }
///
/// impl BlockSource for Device {
///     fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
///         // Read from the device at `offset`
///     }
///
///     fn size(&self) -> u64 {
///         // Total size in bytes
///     }
/// }
/// ```
pub trait BlockSource {
    /// Reads up to `buffer.len()` bytes starting at `offset`.
    ///
    /// # Returns
    ///
    /// The number of bytes read. A value smaller than `buffer.len()` means
    /// either a partial read or the end of the source; `0` always means the
    /// end of the source.
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize>;

    /// Returns the total size of the source in bytes.
    fn size(&self) -> u64;
}

/// An in-memory disk image.
impl BlockSource for Vec<u8> {
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        if start >= self.len() {
            return Ok(0);
        }
        let end = start.saturating_add(buffer.len()).min(self.len());
        let len = end - start;
        buffer[..len].copy_from_slice(&self[start..end]);
        Ok(len)
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

impl<S: BlockSource + ?Sized> BlockSource for &mut S {
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        (**self).read_chunk(offset, buffer)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}

impl<S: BlockSource + ?Sized> BlockSource for Box<S> {
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        (**self).read_chunk(offset, buffer)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_image_reads_at_offset() {
        let mut image = b"Hello, ext2 carving".to_vec();
        let mut buffer = [0u8; 4];
        assert_eq!(image.read_chunk(7, &mut buffer).unwrap(), 4);
        assert_eq!(&buffer, b"ext2");
    }

    #[test]
    fn test_memory_image_short_read_at_end() {
        let mut image = b"Short".to_vec();
        let mut buffer = [0u8; 16];
        assert_eq!(image.read_chunk(2, &mut buffer).unwrap(), 3);
        assert_eq!(&buffer[..3], b"ort");
        assert_eq!(image.read_chunk(5, &mut buffer).unwrap(), 0);
        assert_eq!(image.read_chunk(u64::MAX, &mut buffer).unwrap(), 0);
    }

    #[test]
    fn test_boxed_source_delegates() {
        let mut boxed: Box<dyn BlockSource> = Box::new(vec![1u8, 2, 3]);
        let mut buffer = [0u8; 2];
        assert_eq!(boxed.read_chunk(1, &mut buffer).unwrap(), 2);
        assert_eq!(buffer, [2, 3]);
        assert_eq!(boxed.size(), 3);
    }
}
