//! # e2carve I/O
//!
//! Concrete [`BlockSource`] adapters for the carving engine in
//! `e2carve_core`. Image files are memory mapped; block devices, which
//! cannot be mapped, are read with plain seek-and-read calls.

mod disk;
mod mmap;

pub use disk::DiskReader;
pub use mmap::MmapReader;

use e2carve_core::{BlockSource, Result};
use std::path::Path;

/// Whichever reader suits the path.
pub enum Reader {
    Mmap(MmapReader),
    Disk(DiskReader),
}

impl Reader {
    /// Tries a memory map first and falls back to plain reads.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match MmapReader::new(path) {
            Ok(r) => Ok(Reader::Mmap(r)),
            Err(_) => Ok(Reader::Disk(DiskReader::new(path)?)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Reader::Mmap(_) => "mmap",
            Reader::Disk(_) => "read",
        }
    }
}

impl BlockSource for Reader {
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        match self {
            Reader::Mmap(r) => r.read_chunk(offset, buffer),
            Reader::Disk(r) => r.read_chunk(offset, buffer),
        }
    }

    fn size(&self) -> u64 {
        match self {
            Reader::Mmap(r) => r.size(),
            Reader::Disk(r) => r.size(),
        }
    }
}
