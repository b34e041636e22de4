pub mod error;
pub mod item;
mod structural;

use std::collections::HashMap;
use std::ops::Range;

pub use error::ParseError;

use crate::block::BlockId;
use crate::graph::BlockGraph;

/// A named program structure: one `#` heading and the chain listed under it.
#[derive(Debug, Clone)]
pub struct Structure {
    pub name: String,
    /// First block of the main chain; `None` when the heading lists nothing.
    pub root: Option<BlockId>,
    pub span: Range<usize>,
}

/// Blocks built from a Markdown sketch, plus where each one came from.
pub struct Sketch {
    pub graph: BlockGraph,
    pub structures: Vec<Structure>,
    /// Source span of the list item that produced each block.
    pub spans: HashMap<BlockId, Range<usize>>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

impl Sketch {
    /// Case-insensitive structure lookup. Tries exact match first.
    pub fn structure(&self, name: &str) -> Option<&Structure> {
        self.structures
            .iter()
            .find(|s| s.name == name)
            .or_else(|| self.structures.iter().find(|s| s.name.eq_ignore_ascii_case(name)))
    }

    pub fn structure_names(&self) -> Vec<&str> {
        self.structures.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn span_of(&self, block: BlockId) -> Option<Range<usize>> {
        self.spans.get(&block).cloned()
    }
}

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Build the block graph described by the Markdown source.
    pub fn parse(&self) -> Result<Sketch, Vec<ParseError>> {
        structural::build_sketch(&self.source, self.file_id)
    }
}
