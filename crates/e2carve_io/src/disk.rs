//! Plain read-only access to block devices and image files.

use e2carve_core::{BlockSource, Result};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

/// A read-only [`BlockSource`] over a device node or an image file.
///
/// Works for anything `open(2)` accepts, including `/dev/sdb` style block
/// devices that cannot be memory mapped. The file is never opened for
/// writing, so carving does not disturb the evidence.
///
/// # Example
///
/// ```ignore
/// use e2carve_io::DiskReader;
/// use e2carve_core::BlockSource;
///
/// let mut reader = DiskReader::new("/dev/sdb")?;
/// let mut mbr = vec![0u8; 512];
/// reader.read_chunk(0, &mut mbr)?;
/// ```
pub struct DiskReader {
    file: File,
    size: u64,
}

impl DiskReader {
    /// Opens `path` read-only and records its size.
    ///
    /// # Returns
    ///
    /// An error if the path does not exist, permission is denied, or the
    /// size cannot be determined by seeking to the end.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).open(path.as_ref())?;

        #[cfg(target_os = "linux")]
        {
            use rustix::fs::{fadvise, Advice};

            // The scan touches every block exactly once, front to back.
            let _ = fadvise(&file, 0, None, Advice::Sequential);
            let _ = fadvise(&file, 0, None, Advice::NoReuse);
        }

        let size = file.seek(SeekFrom::End(0))?;
        file.rewind()?;

        Ok(Self { file, size })
    }
}

impl BlockSource for DiskReader {
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;
        loop {
            match self.file.read(buffer) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn size(&self) -> u64 {
        self.size
    }
}
