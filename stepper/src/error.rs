use blocks::{BlockId, Direction};
use thiserror::Error;

use crate::spatial::Position;

/// A block that cannot run as assembled. Detected when the block is about to
/// execute, never while the program is being built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("move {direction} is missing a value block")]
    MissingOperand { block: BlockId, direction: Direction },

    #[error("move {direction} needs an integer value, not a boolean")]
    NonIntegerOperand { block: BlockId, direction: Direction },

    #[error("loop is missing its {missing} value")]
    MissingBounds {
        block: BlockId,
        missing: &'static str,
    },

    #[error("loop {bound} value must be an integer, not a boolean")]
    NonIntegerBound { block: BlockId, bound: &'static str },
}

impl StructuralError {
    /// The block that has to be fixed.
    pub fn block(&self) -> BlockId {
        match self {
            StructuralError::MissingOperand { block, .. }
            | StructuralError::NonIntegerOperand { block, .. }
            | StructuralError::MissingBounds { block, .. }
            | StructuralError::NonIntegerBound { block, .. } => *block,
        }
    }
}

/// Why a forward step failed. Both kinds take the same recovery path: the
/// block is marked failed and the run rewinds to its starting position.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error("moving {direction} {steps} step(s) would place the player outside the path")]
    MovementRejected {
        block: BlockId,
        direction: Direction,
        steps: i64,
        target: Position,
    },
}

impl ExecError {
    pub fn block(&self) -> BlockId {
        match self {
            ExecError::Structural(err) => err.block(),
            ExecError::MovementRejected { block, .. } => *block,
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, ExecError::Structural(_))
    }
}
