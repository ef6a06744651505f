use crate::layout::read_u32_le;

/// Length of the RIFF header checked at the start of a block.
pub const HEADER_LEN: usize = 12;
/// Bytes of the container header not counted by its size field.
pub const HEADER_ADJUSTMENT: u64 = 8;

/// Recognises the first block of a RIFF-style container by its two tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureScanner {
    container_tag: [u8; 4],
    format_tag: [u8; 4],
    extension: &'static str,
}

impl SignatureScanner {
    #[must_use]
    pub const fn webp() -> Self {
        Self {
            container_tag: *b"RIFF",
            format_tag: *b"WEBP",
            extension: "webp",
        }
    }

    #[inline]
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        self.extension
    }

    /// True iff `block` begins with the container tag and carries the
    /// format tag at offset 8. `block` may be a short final read.
    #[must_use]
    pub fn matches(&self, block: &[u8]) -> bool {
        block.len() >= HEADER_LEN
            && block[0..4] == self.container_tag
            && block[8..12] == self.format_tag
    }

    /// Total file length announced by the header: the little-endian size
    /// field at offset 4 plus the 8 bytes preceding the payload.
    #[must_use]
    pub fn declared_length(&self, block: &[u8]) -> Option<u64> {
        read_u32_le(block, 4)
            .ok()
            .map(|size| u64::from(size) + HEADER_ADJUSTMENT)
    }
}

impl Default for SignatureScanner {
    fn default() -> Self {
        Self::webp()
    }
}
