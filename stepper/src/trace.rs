use std::fmt;
use std::ops::Range;

use blocks::{BlockId, Direction};

use crate::error::StructuralError;

/// One entry of a flattened program.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Move `steps` units towards `direction`. The literal is read when the
    /// program is flattened.
    Move {
        block: BlockId,
        direction: Direction,
        steps: Result<i64, StructuralError>,
    },
    /// Entry into an opening loop. `end` is the index of the matching
    /// `LoopEnd`.
    LoopStart {
        block: BlockId,
        iterations: Result<u64, StructuralError>,
        end: usize,
    },
    /// End-of-body marker. Running it either rewinds to `body_start` for the
    /// next iteration or falls through. `terminator` is `None` when the body
    /// chain had no closing block and the marker was synthesized.
    LoopEnd {
        owner: BlockId,
        terminator: Option<BlockId>,
        body_start: usize,
    },
}

impl Instruction {
    /// The block that represents this entry on screen.
    pub fn block(&self) -> Option<BlockId> {
        match self {
            Instruction::Move { block, .. } | Instruction::LoopStart { block, .. } => Some(*block),
            Instruction::LoopEnd { terminator, .. } => *terminator,
        }
    }

    pub fn is_move(&self) -> bool {
        matches!(self, Instruction::Move { .. })
    }

    /// Loop bookkeeping entries, as opposed to moves.
    pub fn is_control(&self) -> bool {
        !self.is_move()
    }
}

/// Linear, loop-aware instruction sequence built from one root block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Trace {
    root: Option<BlockId>,
    entries: Vec<Instruction>,
}

impl Trace {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(root: BlockId, entries: Vec<Instruction>) -> Self {
        Trace {
            root: Some(root),
            entries,
        }
    }

    pub fn root(&self) -> Option<BlockId> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.entries.iter()
    }

    pub fn move_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_move()).count()
    }

    /// Whether running `range` once would reach at least one move. Nested
    /// loops that run zero times do not count; an unexecutable loop does,
    /// since reaching it ends the step with a failure.
    pub fn executes_moves(&self, range: Range<usize>) -> bool {
        let mut i = range.start;
        while i < range.end.min(self.entries.len()) {
            match &self.entries[i] {
                Instruction::Move { .. } => return true,
                Instruction::LoopStart {
                    iterations: Err(_), ..
                } => return true,
                Instruction::LoopStart {
                    iterations: Ok(count),
                    end,
                    ..
                } => {
                    if *count > 0 && self.executes_moves(i + 1..*end) {
                        return true;
                    }
                    i = end + 1;
                }
                Instruction::LoopEnd { .. } => i += 1,
            }
        }
        false
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Move {
                block,
                direction,
                steps: Ok(n),
            } => write!(f, "move {} {}  [{}]", direction, n, block),
            Instruction::Move {
                block,
                direction,
                steps: Err(err),
            } => write!(f, "move {} ?  [{}] ({})", direction, block, err),
            Instruction::LoopStart {
                block,
                iterations: Ok(n),
                end,
            } => write!(f, "loop x{} until {}  [{}]", n, end, block),
            Instruction::LoopStart {
                block,
                iterations: Err(err),
                ..
            } => write!(f, "loop ?  [{}] ({})", block, err),
            Instruction::LoopEnd {
                terminator: Some(block),
                body_start,
                ..
            } => write!(f, "end loop -> {}  [{}]", body_start, block),
            Instruction::LoopEnd {
                terminator: None,
                body_start,
                ..
            } => write!(f, "end loop -> {}  (implicit)", body_start),
        }
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return writeln!(f, "(empty trace)");
        }

        let mut depth = 0usize;
        for (index, entry) in self.entries.iter().enumerate() {
            if matches!(entry, Instruction::LoopEnd { .. }) {
                depth = depth.saturating_sub(1);
            }
            writeln!(f, "{:>3}  {}{}", index, "  ".repeat(depth), entry)?;
            if matches!(entry, Instruction::LoopStart { .. }) {
                depth += 1;
            }
        }
        Ok(())
    }
}
