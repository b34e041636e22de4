use std::collections::HashMap;
use std::ops::Range;

use pulldown_cmark::{Event, Options, Parser as CmarkParser, Tag, TagEnd};
use tracing::debug;

use crate::block::{BlockId, BlockKind};
use crate::graph::{BlockGraph, Socket};
use crate::parser::error::ParseError;
use crate::parser::item::{self, ItemShape, Literal, ParsedItem};
use crate::parser::{Sketch, Structure};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Walk the Markdown source and build the blocks it describes.
pub fn build_sketch(source: &str, file_id: usize) -> Result<Sketch, Vec<ParseError>> {
    let parser = CmarkParser::new_ext(source, Options::empty());
    let events: Vec<(Event<'_>, Range<usize>)> = parser.into_offset_iter().collect();

    let mut state = BuildState::new(source, file_id);
    for (event, range) in &events {
        state.process_event(event, range);
    }
    state.finalize()
}

// ---------------------------------------------------------------------------
// Build state
// ---------------------------------------------------------------------------

/// One list level being turned into a chain.
struct ChainFrame {
    /// Loop whose body this list is, or `None` for a structure's main chain.
    owner: Option<BlockId>,
    /// Last block appended to this chain.
    last: Option<BlockId>,
    /// False when the list sits somewhere blocks cannot go; its items are
    /// still checked but nothing is attached.
    attachable: bool,
}

struct PendingItem {
    text: String,
    span: Range<usize>,
}

struct BuildState<'a> {
    source: &'a str,
    file_id: usize,
    graph: BlockGraph,
    structures: Vec<Structure>,
    spans: HashMap<BlockId, Range<usize>>,
    frames: Vec<ChainFrame>,
    /// Item whose text is still being collected.
    pending: Option<PendingItem>,
    /// Heading whose text is still being collected.
    heading: Option<(String, Range<usize>)>,
    errors: Vec<ParseError>,
}

impl<'a> BuildState<'a> {
    fn new(source: &'a str, file_id: usize) -> Self {
        BuildState {
            source,
            file_id,
            graph: BlockGraph::new(),
            structures: Vec::new(),
            spans: HashMap::new(),
            frames: Vec::new(),
            pending: None,
            heading: None,
            errors: Vec::new(),
        }
    }

    fn process_event(&mut self, event: &Event<'_>, range: &Range<usize>) {
        match event {
            Event::Start(Tag::Heading { .. }) => {
                self.heading = Some((String::new(), range.clone()));
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((name, span)) = self.heading.take() {
                    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
                    debug!(structure = %name, "new structure");
                    self.structures.push(Structure {
                        name,
                        root: None,
                        span,
                    });
                }
            }

            Event::Start(Tag::List(_)) => self.open_list(range),
            Event::End(TagEnd::List(_)) => {
                self.flush_pending();
                self.frames.pop();
            }

            Event::Start(Tag::Item) => {
                self.flush_pending();
                self.pending = Some(PendingItem {
                    text: String::new(),
                    span: first_line(self.source, range),
                });
            }
            Event::End(TagEnd::Item) => {
                self.flush_pending();
            }

            Event::Text(text) | Event::Code(text) => self.push_text(text),
            Event::SoftBreak | Event::HardBreak => self.push_text(" "),

            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some((name, _)) = &mut self.heading {
            name.push_str(text);
        } else if let Some(pending) = &mut self.pending {
            pending.text.push_str(text);
        }
    }

    fn open_list(&mut self, range: &Range<usize>) {
        if self.frames.is_empty() {
            let frame = match self.structures.last() {
                Some(structure) => ChainFrame {
                    owner: None,
                    // A second list under the same heading continues the chain.
                    last: structure
                        .root
                        .and_then(|root| self.graph.chain(root).last().copied()),
                    attachable: true,
                },
                None => {
                    self.errors.push(
                        ParseError::error(
                            "blocks listed outside of any structure",
                            first_line(self.source, range),
                            self.file_id,
                        )
                        .with_note("start the program with a `# name` heading"),
                    );
                    ChainFrame {
                        owner: None,
                        last: None,
                        attachable: false,
                    }
                }
            };
            self.frames.push(frame);
            return;
        }

        // Nested list: it belongs to the item whose text we were collecting.
        let parent_span = self.pending.as_ref().map(|p| p.span.clone());
        let parent = self.flush_pending();
        let is_opening_loop = parent
            .and_then(|id| self.graph.block(id).ok())
            .and_then(|b| b.as_loop())
            .is_some_and(|l| !l.is_terminator);

        let attachable = self.frames.last().is_some_and(|f| f.attachable);
        if parent.is_some() && !is_opening_loop {
            self.errors.push(
                ParseError::error(
                    "only loop blocks can hold nested blocks",
                    parent_span.unwrap_or_else(|| range.clone()),
                    self.file_id,
                )
                .with_note("indent blocks under a `loop` item to put them in its body"),
            );
        }

        self.frames.push(ChainFrame {
            owner: parent.filter(|_| is_opening_loop),
            last: None,
            attachable: attachable && is_opening_loop,
        });
    }

    /// Turn the collected item text into blocks and append them to the
    /// innermost chain. Returns the chain block that was created.
    fn flush_pending(&mut self) -> Option<BlockId> {
        let pending = self.pending.take()?;
        let parsed = match item::parse_item(&pending.text, pending.span.clone(), self.file_id) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.errors.push(err);
                return None;
            }
        };

        if !self.frames.last().is_some_and(|f| f.attachable) {
            return None;
        }

        match self.build_item(parsed, &pending.span) {
            Ok(id) => Some(id),
            Err(err) => {
                self.errors.push(err);
                None
            }
        }
    }

    fn build_item(
        &mut self,
        parsed: ParsedItem,
        span: &Range<usize>,
    ) -> Result<BlockId, ParseError> {
        let ParsedItem { shape, label } = parsed;
        let kind = match &shape {
            ItemShape::Move { direction, .. } => BlockKind::movement(*direction),
            ItemShape::Loop { .. } => BlockKind::opening_loop(),
            ItemShape::EndLoop => BlockKind::terminator(),
        };
        let id = match label {
            Some(label) => self.graph.insert_labeled(kind, label),
            None => self.graph.insert(kind),
        };
        self.spans.insert(id, span.clone());

        match shape {
            ItemShape::Move { operand, .. } => {
                self.plug_literal(id, Socket::Operand, operand, span)?;
            }
            ItemShape::Loop { start, end } => {
                self.plug_literal(id, Socket::Start, start, span)?;
                self.plug_literal(id, Socket::End, end, span)?;
            }
            ItemShape::EndLoop => {}
        }

        self.append_to_chain(id, span)?;
        Ok(id)
    }

    fn plug_literal(
        &mut self,
        parent: BlockId,
        socket: Socket,
        literal: Option<Literal>,
        span: &Range<usize>,
    ) -> Result<(), ParseError> {
        let Some(literal) = literal else {
            return Ok(());
        };
        let value = self.graph.insert(literal.into_kind());
        self.spans.insert(value, span.clone());
        self.graph
            .attach(parent, value, socket)
            .map_err(|e| ParseError::from_graph(&e, span.clone(), self.file_id))
    }

    fn append_to_chain(&mut self, id: BlockId, span: &Range<usize>) -> Result<(), ParseError> {
        let Some(frame) = self.frames.last_mut() else {
            return Ok(());
        };
        let (previous, owner) = (frame.last, frame.owner);
        frame.last = Some(id);

        let attached = match (previous, owner) {
            (Some(previous), _) => self.graph.attach(previous, id, Socket::Lower),
            (None, Some(owner)) => self.graph.attach(owner, id, Socket::Body),
            (None, None) => {
                if let Some(structure) = self.structures.last_mut() {
                    structure.root = Some(id);
                }
                Ok(())
            }
        };
        attached.map_err(|e| ParseError::from_graph(&e, span.clone(), self.file_id))
    }

    fn finalize(mut self) -> Result<Sketch, Vec<ParseError>> {
        self.flush_pending();

        if self.errors.is_empty() {
            Ok(Sketch {
                graph: self.graph,
                structures: self.structures,
                spans: self.spans,
                source_id: self.file_id,
            })
        } else {
            Err(self.errors)
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Narrow an item's range to its first source line, so nested items are not
/// underlined along with their parent.
fn first_line(source: &str, range: &Range<usize>) -> Range<usize> {
    let text = &source[range.start..range.end.min(source.len())];
    let line = text.split('\n').next().unwrap_or(text).trim_end();
    range.start..range.start + line.len()
}
