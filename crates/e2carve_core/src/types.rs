/// How strongly a block resembles an ext2 single-indirect block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndirectKind {
    /// A long run of consecutive pointers.
    Genuine,
    /// A short non-zero prefix followed by zero padding.
    FakeShort,
}

impl IndirectKind {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Genuine => "genuine",
            Self::FakeShort => "fake-short",
        }
    }
}

impl std::fmt::Display for IndirectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndirectCandidate {
    pub block: u32,
    pub kind: IndirectKind,
    /// First pointer entry of the block, used to chain it to the file.
    pub first_pointer: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartCandidate {
    pub block: u32,
    /// Size field of the container header plus the 8 header bytes it omits.
    pub declared_length: u64,
}
