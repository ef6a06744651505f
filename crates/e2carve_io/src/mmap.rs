use e2carve_core::{BlockSource, CoreError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// Memory-mapped image file. Block devices map as empty and are rejected.
pub struct MmapReader {
    mmap: Mmap,
}

impl MmapReader {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        if file.metadata()?.len() == 0 {
            return Err(CoreError::InvalidFormat("cannot map an empty image".into()));
        }

        // SAFETY: the mapping is read-only; an image truncated underneath us
        // is outside what a forensic copy is expected to do.
        let mmap = unsafe { Mmap::map(&file) }?;
        if mmap.is_empty() {
            return Err(CoreError::InvalidFormat(
                "mapping is empty (block devices must use DiskReader)".into(),
            ));
        }

        #[cfg(target_os = "linux")]
        {
            let _ = mmap.advise(memmap2::Advice::Sequential);
        }

        Ok(Self { mmap })
    }

    /// Borrows `len` bytes at `offset`, clipped to the end of the image.
    #[inline]
    pub fn slice(&self, offset: u64, len: usize) -> Option<&[u8]> {
        let start = usize::try_from(offset).ok()?;
        if start >= self.mmap.len() {
            return None;
        }
        let end = start.saturating_add(len).min(self.mmap.len());
        Some(&self.mmap[start..end])
    }
}

impl BlockSource for MmapReader {
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        match self.slice(offset, buffer.len()) {
            Some(bytes) => {
                buffer[..bytes.len()].copy_from_slice(bytes);
                Ok(bytes.len())
            }
            None => Ok(0),
        }
    }

    fn size(&self) -> u64 {
        self.mmap.len() as u64
    }
}
