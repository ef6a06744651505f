use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Offset {offset} is out of bounds (max: {max})")]
    OutOfBounds { offset: u64, max: u64 },

    #[error("Invalid buffer size: expected {expected}, got {actual}")]
    InvalidBufferSize { expected: usize, actual: usize },

    #[error("Invalid geometry: {0}")]
    Geometry(String),

    #[error("Short read at block {block}: expected {expected} bytes, got {actual}")]
    ShortRead {
        block: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Superblock magic mismatch: found {found:#06x}, expected {expected:#06x}")]
    MagicMismatch { found: u16, expected: u16 },

    #[error("No start candidate found on the partition")]
    NoStartCandidate,

    #[error("Start candidate {index} requested but only {available} found")]
    StartCandidateOutOfRange { index: usize, available: usize },

    #[error("Block pointer {pointer} exceeds filesystem block count {block_count}")]
    PointerOutOfRange { pointer: u32, block_count: u32 },

    #[error("No single-indirect block continues after block {after}")]
    IndirectNotFound { after: u32 },

    #[error("No double-indirect block continues after block {after}")]
    DoubleIndirectNotFound { after: u32 },
}

pub type Result<T> = std::result::Result<T, CoreError>;
