pub mod block;
pub mod graph;
pub mod parser;

pub use block::{Block, BlockId, BlockKind, Direction, LoopBlock, MoveBlock, ValueBlock, ValueKind};
pub use graph::{BlockGraph, GraphError, Link, Socket};
