use std::collections::HashMap;
use std::fmt;

use blocks::BlockId;

/// Color a block is shown with while a program runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// The next instruction to run.
    Pending,
    /// Already executed.
    Done,
    /// Its last execution failed. Stays until cleared explicitly.
    Failed,
    /// Default look.
    Cleared,
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BlockState::Pending => "pending",
            BlockState::Done => "done",
            BlockState::Failed => "failed",
            BlockState::Cleared => "cleared",
        })
    }
}

/// Current color of every block that has been painted. Blocks absent from
/// the map are `Cleared`.
#[derive(Debug, Clone, Default)]
pub struct Palette {
    states: HashMap<BlockId, BlockState>,
}

impl Palette {
    pub fn state(&self, block: BlockId) -> BlockState {
        self.states
            .get(&block)
            .copied()
            .unwrap_or(BlockState::Cleared)
    }

    pub fn is_failed(&self, block: BlockId) -> bool {
        self.state(block) == BlockState::Failed
    }

    /// Set a block's color. Failed blocks keep their color. Returns whether
    /// the visible state changed.
    pub fn paint(&mut self, block: BlockId, state: BlockState) -> bool {
        let current = self.state(block);
        if current == state || current == BlockState::Failed {
            return false;
        }
        if state == BlockState::Cleared {
            self.states.remove(&block);
        } else {
            self.states.insert(block, state);
        }
        true
    }

    pub fn mark_failed(&mut self, block: BlockId) -> bool {
        self.states.insert(block, BlockState::Failed) != Some(BlockState::Failed)
    }

    /// Drop every failure mark. Returns the blocks that were failed.
    pub fn clear_failures(&mut self) -> Vec<BlockId> {
        let mut cleared: Vec<BlockId> = self
            .states
            .iter()
            .filter(|(_, state)| **state == BlockState::Failed)
            .map(|(block, _)| *block)
            .collect();
        cleared.sort();
        for block in &cleared {
            self.states.remove(block);
        }
        cleared
    }

    /// Blocks with a color other than `Cleared`, in handle order.
    pub fn painted(&self) -> Vec<(BlockId, BlockState)> {
        let mut painted: Vec<_> = self.states.iter().map(|(b, s)| (*b, *s)).collect();
        painted.sort_by_key(|(block, _)| *block);
        painted
    }

    /// Reset every block, failures included. Returns the blocks that changed.
    pub fn clear_all(&mut self) -> Vec<BlockId> {
        let mut changed: Vec<BlockId> = self.states.drain().map(|(block, _)| block).collect();
        changed.sort();
        changed
    }
}
