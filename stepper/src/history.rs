use blocks::{BlockId, Direction};

/// What one successful forward step changed, so it can be undone.
#[derive(Debug, Clone)]
pub(crate) struct StepRecord {
    pub cursor_before: usize,
    pub moved: Option<AppliedMove>,
    /// Loop counters as they were before the step, in the order the step
    /// changed them.
    pub counters: Vec<(BlockId, Option<u64>)>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct AppliedMove {
    pub block: BlockId,
    pub direction: Direction,
    pub steps: i64,
    pub distance: f64,
}
