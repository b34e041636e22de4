pub mod id;
pub mod value;

use std::fmt;
use std::str::FromStr;

pub use id::BlockId;
pub use value::{ValueBlock, ValueKind};

use crate::graph::Link;

/// One of the four movement directions a move block can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Right,
    Left,
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Right,
        Direction::Left,
        Direction::Up,
        Direction::Down,
    ];

    /// The direction that undoes a move in this direction.
    pub fn inverse(self) -> Direction {
        match self {
            Direction::Right => Direction::Left,
            Direction::Left => Direction::Right,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::Right => "right",
            Direction::Left => "left",
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Direction::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown direction '{}' (expected right, left, up or down)", s))
    }
}

/// A movement instruction. The operand is the value block plugged into its
/// literal socket, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveBlock {
    pub direction: Direction,
    pub operand: Option<BlockId>,
}

/// Either half of a bounded loop.
///
/// The opening block holds the bounds and owns the body chain. The closing
/// block (`is_terminator`) marks the end of the body and carries nothing else.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopBlock {
    pub start: Option<BlockId>,
    pub end: Option<BlockId>,
    pub body_head: Option<BlockId>,
    pub is_terminator: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Move(MoveBlock),
    Loop(LoopBlock),
    Value(ValueBlock),
}

impl BlockKind {
    pub fn movement(direction: Direction) -> Self {
        BlockKind::Move(MoveBlock {
            direction,
            operand: None,
        })
    }

    pub fn opening_loop() -> Self {
        BlockKind::Loop(LoopBlock {
            start: None,
            end: None,
            body_head: None,
            is_terminator: false,
        })
    }

    pub fn terminator() -> Self {
        BlockKind::Loop(LoopBlock {
            start: None,
            end: None,
            body_head: None,
            is_terminator: true,
        })
    }

    pub fn integer(value: i64) -> Self {
        BlockKind::Value(ValueBlock::integer(value))
    }

    pub fn boolean(value: bool) -> Self {
        BlockKind::Value(ValueBlock::boolean(value))
    }

    /// Same kind with every link slot emptied. Links only come into existence
    /// through `BlockGraph::attach`.
    pub(crate) fn without_links(self) -> Self {
        match self {
            BlockKind::Move(m) => BlockKind::movement(m.direction),
            BlockKind::Loop(l) if l.is_terminator => BlockKind::terminator(),
            BlockKind::Loop(_) => BlockKind::opening_loop(),
            value @ BlockKind::Value(_) => value,
        }
    }

    /// Move blocks and loop blocks can sit in a chain; values cannot.
    pub fn is_chainable(&self) -> bool {
        !matches!(self, BlockKind::Value(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            BlockKind::Move(_) => "move",
            BlockKind::Loop(l) if l.is_terminator => "end loop",
            BlockKind::Loop(_) => "loop",
            BlockKind::Value(v) => v.kind.type_name(),
        }
    }
}

/// A node of the program graph. Link fields are owned by the graph and only
/// change through its attach/detach/remove operations.
#[derive(Debug, Clone)]
pub struct Block {
    pub(crate) kind: BlockKind,
    /// Where this block is plugged in, if anywhere.
    pub(crate) parent: Option<Link>,
    /// Chain successor.
    pub(crate) lower: Option<BlockId>,
    pub(crate) label: Option<String>,
}

impl Block {
    pub(crate) fn new(kind: BlockKind, label: Option<String>) -> Self {
        Block {
            kind: kind.without_links(),
            parent: None,
            lower: None,
            label,
        }
    }

    pub fn kind(&self) -> &BlockKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<Link> {
        self.parent
    }

    pub fn lower(&self) -> Option<BlockId> {
        self.lower
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn as_move(&self) -> Option<&MoveBlock> {
        match &self.kind {
            BlockKind::Move(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_loop(&self) -> Option<&LoopBlock> {
        match &self.kind {
            BlockKind::Loop(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&ValueBlock> {
        match &self.kind {
            BlockKind::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Short human-readable description, e.g. `move right` or `loop @outer`.
    pub fn describe(&self) -> String {
        let base = match &self.kind {
            BlockKind::Move(m) => format!("move {}", m.direction),
            BlockKind::Value(v) => format!("{} {}", v.kind.type_name(), v),
            other => other.type_name().to_string(),
        };
        match &self.label {
            Some(label) => format!("{} @{}", base, label),
            None => base,
        }
    }
}
