use std::fmt;

/// Stable handle to a block in a `BlockGraph`.
///
/// The generation is bumped whenever a slot is reused, so a handle kept after
/// its block was removed never resolves to a different block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl BlockId {
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generation == 0 {
            write!(f, "#{}", self.index)
        } else {
            write!(f, "#{}v{}", self.index, self.generation)
        }
    }
}
