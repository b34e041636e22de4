use blocks::{Block, BlockGraph, BlockId, BlockKind, Direction, GraphError, ValueBlock};
use tracing::{debug, warn};

use crate::error::StructuralError;
use crate::trace::{Instruction, Trace};

/// Compile the structure rooted at `root` into a trace.
///
/// Loop bodies appear once; repetition happens when the executor rewinds to
/// `body_start`. Problems with individual blocks (missing operands, missing
/// bounds) are recorded on their entries and only surface when executed.
pub fn flatten(graph: &BlockGraph, root: BlockId) -> Result<Trace, GraphError> {
    let block = graph.block(root)?;
    if let BlockKind::Value(_) = block.kind() {
        debug!(root = %root, "value block selected as root, nothing to run");
        return Ok(Trace::new(root, Vec::new()));
    }

    let mut flattener = Flattener {
        graph,
        entries: Vec::new(),
    };
    flattener.chain(root, None);

    let trace = Trace::new(root, flattener.entries);
    debug!(
        root = %root,
        entries = trace.len(),
        moves = trace.move_count(),
        "flattened structure"
    );
    Ok(trace)
}

struct Flattener<'a> {
    graph: &'a BlockGraph,
    entries: Vec<Instruction>,
}

impl Flattener<'_> {
    /// Emit the chain starting at `start`. Returns the terminator that
    /// closed it when the chain is the body of `owner`.
    fn chain(&mut self, start: BlockId, owner: Option<BlockId>) -> Option<BlockId> {
        let graph = self.graph;
        let mut current = Some(start);
        let mut visited = 0usize;

        while let Some(id) = current {
            visited += 1;
            if visited > graph.len() {
                break;
            }
            let Some(block) = graph.get(id) else {
                break;
            };

            match block.kind() {
                BlockKind::Move(m) => {
                    let steps = self.steps(id, m.direction);
                    self.entries.push(Instruction::Move {
                        block: id,
                        direction: m.direction,
                        steps,
                    });
                }
                BlockKind::Loop(l) if l.is_terminator => {
                    if let Some(ignored) = graph.lower(id) {
                        warn!(
                            terminator = %id,
                            first = %ignored,
                            "blocks below a loop terminator are ignored"
                        );
                    }
                    return match owner {
                        Some(_) => Some(id),
                        None => {
                            warn!(terminator = %id, "loop terminator outside any loop body");
                            None
                        }
                    };
                }
                BlockKind::Loop(_) => self.opening_loop(id),
                BlockKind::Value(_) => {}
            }

            current = graph.lower(id);
        }
        None
    }

    fn opening_loop(&mut self, id: BlockId) {
        let index = self.entries.len();
        let iterations = self.iterations(id);
        self.entries.push(Instruction::LoopStart {
            block: id,
            iterations,
            end: index,
        });

        let body_start = index + 1;
        let terminator = self
            .graph
            .body_head(id)
            .and_then(|head| self.chain(head, Some(id)));
        if terminator.is_none() {
            debug!(loop_block = %id, "loop body has no terminator, closing implicitly");
        }

        let end = self.entries.len();
        self.entries.push(Instruction::LoopEnd {
            owner: id,
            terminator,
            body_start,
        });
        if let Some(Instruction::LoopStart { end: slot, .. }) = self.entries.get_mut(index) {
            *slot = end;
        }
    }

    fn steps(&self, id: BlockId, direction: Direction) -> Result<i64, StructuralError> {
        let operand = self
            .graph
            .operand(id)
            .ok_or(StructuralError::MissingOperand {
                block: id,
                direction,
            })?;
        self.integer(operand)
            .ok_or(StructuralError::NonIntegerOperand {
                block: id,
                direction,
            })
    }

    fn iterations(&self, id: BlockId) -> Result<u64, StructuralError> {
        let missing = |missing| StructuralError::MissingBounds { block: id, missing };
        let (start, end) = match self.graph.bounds(id) {
            (Some(start), Some(end)) => (start, end),
            (None, None) => return Err(missing("start and end")),
            (None, Some(_)) => return Err(missing("start")),
            (Some(_), None) => return Err(missing("end")),
        };

        let bound = |value: BlockId, name: &'static str| {
            self.integer(value).ok_or(StructuralError::NonIntegerBound {
                block: id,
                bound: name,
            })
        };
        let start = bound(start, "start")?;
        let end = bound(end, "end")?;
        Ok(end.saturating_sub(start).max(0) as u64)
    }

    fn integer(&self, value: BlockId) -> Option<i64> {
        self.graph
            .get(value)
            .and_then(Block::as_value)
            .and_then(ValueBlock::as_integer)
    }
}
