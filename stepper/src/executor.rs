use std::collections::{HashMap, HashSet};
use std::time::Instant;

use blocks::{BlockGraph, BlockId, Direction, GraphError};
use tracing::{debug, info, warn};

use crate::config::ExecutorConfig;
use crate::display::ErrorBanner;
use crate::error::{ExecError, StructuralError};
use crate::flatten::flatten;
use crate::history::{AppliedMove, StepRecord};
use crate::palette::{BlockState, Palette};
use crate::spatial::{Position, SpatialValidator};
use crate::trace::{Instruction, Trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    /// No program loaded, or the loaded program has no entries.
    Idle,
    Running,
    /// The cursor is past the last entry.
    Complete,
}

/// Notifications for the layers around the executor (rendering, UI).
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorEvent {
    BlockPainted { block: BlockId, state: BlockState },
    ErrorDisplayed(String),
    GoalReached { position: Position },
    Completed,
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveReport {
    pub block: BlockId,
    pub direction: Direction,
    pub steps: i64,
    pub from: Position,
    pub to: Position,
    pub goal: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RewindReport {
    /// The move block that was undone, if the undone step moved at all.
    pub block: Option<BlockId>,
    pub from: Position,
    pub to: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Moved(MoveReport),
    /// Only loop bookkeeping was left; the program is now complete.
    Finished,
    AlreadyComplete,
    NothingLoaded,
    /// The step failed; the run was reset to its starting position.
    Failed(ExecError),
    Rewound(RewindReport),
    AtStart,
}

/// Steps through a flattened program one move at a time.
///
/// All state lives here and changes only through `set_root`, `select`,
/// `step_forward`, `step_backward`, `reset` and `clear_failures`. Callers
/// observe it through the accessors and the queued [`ExecutorEvent`]s.
pub struct Executor<V> {
    validator: V,
    config: ExecutorConfig,
    origin: Position,
    position: Position,
    trace: Trace,
    cursor: usize,
    /// Iterations still to run after the current one, per active loop.
    remaining: HashMap<BlockId, u64>,
    history: Vec<StepRecord>,
    palette: Palette,
    banner: Option<ErrorBanner>,
    events: Vec<ExecutorEvent>,
}

impl<V: SpatialValidator> Executor<V> {
    pub fn new(validator: V, origin: Position) -> Self {
        Self::with_config(validator, origin, ExecutorConfig::default())
    }

    pub fn with_config(validator: V, origin: Position, config: ExecutorConfig) -> Self {
        Executor {
            validator,
            config,
            origin,
            position: origin,
            trace: Trace::empty(),
            cursor: 0,
            remaining: HashMap::new(),
            history: Vec::new(),
            palette: Palette::default(),
            banner: None,
            events: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn state(&self) -> ExecState {
        if self.trace.is_empty() {
            ExecState::Idle
        } else if self.cursor >= self.trace.len() {
            ExecState::Complete
        } else {
            ExecState::Running
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Where every run starts and where failures send the player back to.
    pub fn origin(&self) -> Position {
        self.origin
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Iterations left for an active loop, not counting the current one.
    pub fn remaining(&self, loop_block: BlockId) -> Option<u64> {
        self.remaining.get(&loop_block).copied()
    }

    pub fn block_state(&self, block: BlockId) -> BlockState {
        self.palette.state(block)
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn error_banner(&self) -> Option<&ErrorBanner> {
        self.banner.as_ref()
    }

    /// The error message, if it is still on screen at `now`.
    pub fn visible_error(&self, now: Instant) -> Option<&str> {
        self.banner
            .as_ref()
            .filter(|banner| banner.is_visible_at(now))
            .map(ErrorBanner::message)
    }

    pub fn validator(&self) -> &V {
        &self.validator
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// True when the cursor rests on loop bookkeeping rather than a move.
    pub fn at_loop_boundary(&self) -> bool {
        self.trace.get(self.cursor).is_some_and(Instruction::is_control)
    }

    pub fn can_step_backward(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn drain_events(&mut self) -> Vec<ExecutorEvent> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Program selection
    // -----------------------------------------------------------------------

    /// Load the structure rooted at `root`, or unload with `None`.
    ///
    /// The run restarts from the origin. On error nothing changes.
    pub fn set_root(
        &mut self,
        graph: &BlockGraph,
        root: Option<BlockId>,
    ) -> Result<(), GraphError> {
        let Some(root) = root else {
            info!("program unloaded");
            self.trace = Trace::empty();
            self.rewind_to_origin();
            for block in self.palette.clear_all() {
                self.events.push(ExecutorEvent::BlockPainted {
                    block,
                    state: BlockState::Cleared,
                });
            }
            return Ok(());
        };

        let trace = flatten(graph, root)?;
        info!(
            root = %root,
            entries = trace.len(),
            moves = trace.move_count(),
            "program loaded"
        );
        self.trace = trace;
        self.rewind_to_origin();
        self.repaint();
        Ok(())
    }

    /// Load the whole structure `block` belongs to.
    pub fn select(&mut self, graph: &BlockGraph, block: BlockId) -> Result<(), GraphError> {
        let root = graph.topmost(block)?;
        self.set_root(graph, Some(root))
    }

    // -----------------------------------------------------------------------
    // Stepping
    // -----------------------------------------------------------------------

    pub fn step_forward(&mut self) -> StepOutcome {
        match self.state() {
            ExecState::Idle => {
                debug!("nothing to run");
                return StepOutcome::NothingLoaded;
            }
            ExecState::Complete => {
                info!("code execution complete");
                return StepOutcome::AlreadyComplete;
            }
            ExecState::Running => {}
        }

        let mut record = StepRecord {
            cursor_before: self.cursor,
            moved: None,
            counters: Vec::new(),
        };

        match self.advance(&mut record) {
            Err(err) => {
                self.fail(&err);
                StepOutcome::Failed(err)
            }
            Ok(None) => {
                self.history.push(record);
                self.complete();
                self.repaint();
                StepOutcome::Finished
            }
            Ok(Some(report)) => {
                self.settle(&mut record.counters);
                self.history.push(record);
                if report.goal {
                    info!(position = %report.to, "goal reached");
                    self.events.push(ExecutorEvent::GoalReached {
                        position: report.to,
                    });
                }
                if self.state() == ExecState::Complete {
                    self.complete();
                }
                self.repaint();
                StepOutcome::Moved(report)
            }
        }
    }

    /// Undo the most recent successful forward step, loop counters included.
    pub fn step_backward(&mut self) -> StepOutcome {
        let Some(record) = self.history.pop() else {
            if self.trace.is_empty() {
                return StepOutcome::NothingLoaded;
            }
            debug!("already at the start of the execution");
            return StepOutcome::AtStart;
        };

        let from = self.position;
        if let Some(applied) = record.moved {
            self.position = self
                .position
                .offset(applied.direction.inverse(), applied.distance);
            info!(
                block = %applied.block,
                direction = %applied.direction,
                steps = applied.steps,
                position = %self.position,
                "undid move"
            );
        }
        for (loop_block, previous) in record.counters.into_iter().rev() {
            match previous {
                Some(count) => self.remaining.insert(loop_block, count),
                None => self.remaining.remove(&loop_block),
            };
        }
        self.cursor = record.cursor_before;
        self.repaint();

        StepOutcome::Rewound(RewindReport {
            block: record.moved.map(|applied| applied.block),
            from,
            to: self.position,
        })
    }

    /// Back to the start of the loaded program. The trace is kept.
    pub fn reset(&mut self) {
        info!("execution reset");
        self.rewind_to_origin();
        self.events.push(ExecutorEvent::Reset);
        self.repaint();
    }

    /// Drop every failure mark so the blocks can show progress again.
    pub fn clear_failures(&mut self) {
        for block in self.palette.clear_failures() {
            self.events.push(ExecutorEvent::BlockPainted {
                block,
                state: BlockState::Cleared,
            });
        }
        self.repaint();
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Run leading loop bookkeeping, then one move.
    fn advance(&mut self, record: &mut StepRecord) -> Result<Option<MoveReport>, ExecError> {
        while let Some(entry) = self.trace.get(self.cursor).cloned() {
            match entry {
                Instruction::Move {
                    block,
                    direction,
                    steps,
                } => {
                    let report = self.apply_move(block, direction, steps)?;
                    record.moved = Some(AppliedMove {
                        block,
                        direction,
                        steps: report.steps,
                        distance: report.steps as f64 * self.config.move_unit,
                    });
                    return Ok(Some(report));
                }
                Instruction::LoopStart {
                    block,
                    iterations,
                    end,
                } => self.open_loop(block, iterations, end, &mut record.counters)?,
                Instruction::LoopEnd {
                    owner, body_start, ..
                } => self.close_loop(owner, body_start, &mut record.counters),
            }
        }
        Ok(None)
    }

    /// Consume trailing loop bookkeeping so the cursor rests on the next
    /// move, on a loop that is about to start, or on the end of the trace.
    fn settle(&mut self, counters: &mut Vec<(BlockId, Option<u64>)>) {
        while let Some(entry) = self.trace.get(self.cursor).cloned() {
            match entry {
                Instruction::LoopEnd {
                    owner, body_start, ..
                } => self.close_loop(owner, body_start, counters),
                Instruction::LoopStart {
                    block,
                    iterations: Ok(count),
                    end,
                } if !self.runs_body(count, end) => {
                    debug!(loop_block = %block, "skipping loop with nothing to run");
                    self.cursor = end + 1;
                }
                _ => break,
            }
        }
    }

    fn runs_body(&self, count: u64, end: usize) -> bool {
        count > 0 && self.trace.executes_moves(self.cursor + 1..end)
    }

    fn open_loop(
        &mut self,
        block: BlockId,
        iterations: Result<u64, StructuralError>,
        end: usize,
        counters: &mut Vec<(BlockId, Option<u64>)>,
    ) -> Result<(), ExecError> {
        let count = iterations?;
        if !self.runs_body(count, end) {
            debug!(loop_block = %block, "skipping loop with nothing to run");
            self.cursor = end + 1;
            return Ok(());
        }

        debug!(loop_block = %block, iterations = count, "entering loop");
        counters.push((block, self.remaining.insert(block, count - 1)));
        self.cursor += 1;
        Ok(())
    }

    fn close_loop(
        &mut self,
        owner: BlockId,
        body_start: usize,
        counters: &mut Vec<(BlockId, Option<u64>)>,
    ) {
        match self.remaining.get(&owner).copied() {
            Some(left) if left > 0 => {
                debug!(loop_block = %owner, remaining = left - 1, "repeating loop body");
                counters.push((owner, self.remaining.insert(owner, left - 1)));
                self.cursor = body_start;
            }
            _ => {
                debug!(loop_block = %owner, "leaving loop");
                if let Some(previous) = self.remaining.remove(&owner) {
                    counters.push((owner, Some(previous)));
                }
                self.cursor += 1;
            }
        }
    }

    fn apply_move(
        &mut self,
        block: BlockId,
        direction: Direction,
        steps: Result<i64, StructuralError>,
    ) -> Result<MoveReport, ExecError> {
        let steps = steps?;
        let from = self.position;
        let to = from.offset(direction, steps as f64 * self.config.move_unit);

        let verdict = self.validator.classify(to);
        if !verdict.is_admissible() {
            return Err(ExecError::MovementRejected {
                block,
                direction,
                steps,
                target: to,
            });
        }

        self.position = to;
        self.cursor += 1;
        info!(block = %block, %direction, steps, position = %to, "executed move");
        Ok(MoveReport {
            block,
            direction,
            steps,
            from,
            to,
            goal: verdict.is_goal(),
        })
    }

    fn complete(&mut self) {
        info!(position = %self.position, "code execution complete");
        self.events.push(ExecutorEvent::Completed);
    }

    fn fail(&mut self, err: &ExecError) {
        let block = err.block();
        warn!(block = %block, error = %err, "execution failed");
        if self.palette.mark_failed(block) {
            self.events.push(ExecutorEvent::BlockPainted {
                block,
                state: BlockState::Failed,
            });
        }

        let message = format!("Execution failed: {}", err);
        self.banner = Some(ErrorBanner::new(message.clone(), self.config.error_display()));
        self.events.push(ExecutorEvent::ErrorDisplayed(message));

        self.rewind_to_origin();
        self.events.push(ExecutorEvent::Reset);
        self.repaint();
    }

    fn rewind_to_origin(&mut self) {
        self.cursor = 0;
        self.position = self.origin;
        self.remaining.clear();
        self.history.clear();
    }

    /// Bring block colors in line with the cursor: entries before it are
    /// done, the entry at it is pending, everything else is cleared.
    fn repaint(&mut self) {
        let mut wanted = Vec::with_capacity(self.trace.len());
        for (index, entry) in self.trace.iter().enumerate() {
            let Some(block) = entry.block() else {
                continue;
            };
            let state = if index < self.cursor {
                BlockState::Done
            } else if index == self.cursor {
                BlockState::Pending
            } else {
                BlockState::Cleared
            };
            wanted.push((block, state));
        }

        let in_trace: HashSet<BlockId> = wanted.iter().map(|(block, _)| *block).collect();
        for (block, state) in self.palette.painted() {
            if state != BlockState::Failed && !in_trace.contains(&block) {
                wanted.push((block, BlockState::Cleared));
            }
        }

        for (block, state) in wanted {
            if self.palette.paint(block, state) {
                self.events.push(ExecutorEvent::BlockPainted { block, state });
            }
        }
    }
}
