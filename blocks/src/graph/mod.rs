mod error;
mod socket;

pub use error::GraphError;
pub use socket::{Link, Socket};

use tracing::debug;

use crate::block::{Block, BlockId, BlockKind};

struct Slot {
    generation: u32,
    block: Option<Block>,
}

/// Arena of all live blocks and the links between them.
///
/// Every link is stored on both ends: the parent's socket field names the
/// child and the child's `parent` names the parent and socket. A block has at
/// most one parent, so the graph is a forest and can never contain a cycle.
#[derive(Default)]
pub struct BlockGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl BlockGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn insert(&mut self, kind: BlockKind) -> BlockId {
        self.insert_block(Block::new(kind, None))
    }

    pub fn insert_labeled(&mut self, kind: BlockKind, label: impl Into<String>) -> BlockId {
        self.insert_block(Block::new(kind, Some(label.into())))
    }

    fn insert_block(&mut self, block: Block) -> BlockId {
        self.live += 1;
        let id = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.block = Some(block);
            BlockId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                block: Some(block),
            });
            BlockId {
                index,
                generation: 0,
            }
        };
        debug!(block = %id, "inserted block");
        id
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.block.as_ref())
    }

    /// Like `get`, but an unknown handle is an error.
    pub fn block(&self, id: BlockId) -> Result<&Block, GraphError> {
        self.get(id).ok_or(GraphError::UnknownBlock(id))
    }

    pub fn kind(&self, id: BlockId) -> Option<&BlockKind> {
        self.get(id).map(Block::kind)
    }

    fn block_mut(&mut self, id: BlockId) -> Result<&mut Block, GraphError> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.block.as_mut())
            .ok_or(GraphError::UnknownBlock(id))
    }

    /// All live blocks in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &Block)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.block.as_ref().map(|block| {
                (
                    BlockId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    block,
                )
            })
        })
    }

    /// Destroy a block. Every link touching it is cleared first, so no
    /// neighbor is left pointing at a dead handle.
    pub fn remove(&mut self, id: BlockId) -> Result<Block, GraphError> {
        self.detach_from_parent(id)?;
        for (socket, child) in self.children(id) {
            self.detach(id, child, socket)?;
        }

        let slot = &mut self.slots[id.index as usize];
        let block = slot.block.take().ok_or(GraphError::UnknownBlock(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        debug!(block = %id, "removed block");
        Ok(block)
    }

    // -----------------------------------------------------------------------
    // Linking
    // -----------------------------------------------------------------------

    /// Plug `child` into `socket` on `parent`.
    ///
    /// A child already plugged in elsewhere is pulled out first, and a block
    /// already sitting in the socket is displaced. Both ends of each cleared
    /// link are cleared. Attachments that would make `parent` reachable from
    /// `child` are refused.
    pub fn attach(
        &mut self,
        parent: BlockId,
        child: BlockId,
        socket: Socket,
    ) -> Result<(), GraphError> {
        self.check_compatible(parent, child, socket)?;

        if parent == child || self.is_ancestor(child, parent) {
            return Err(GraphError::WouldCycle { parent, child });
        }

        if self.block(child)?.parent == Some(Link { parent, socket }) {
            return Ok(());
        }

        self.detach_from_parent(child)?;
        if let Some(previous) = self.slot(parent, socket)? {
            debug!(parent = %parent, displaced = %previous, %socket, "displacing block");
            self.detach(parent, previous, socket)?;
        }

        self.set_slot(parent, socket, Some(child))?;
        self.block_mut(child)?.parent = Some(Link { parent, socket });
        debug!(parent = %parent, child = %child, %socket, "attached");
        Ok(())
    }

    /// Unplug `child` from `socket` on `parent`.
    ///
    /// Detaching from an empty socket is a no-op. Detaching a block that is
    /// not the one recorded in the socket is an error.
    pub fn detach(
        &mut self,
        parent: BlockId,
        child: BlockId,
        socket: Socket,
    ) -> Result<(), GraphError> {
        let Some(current) = self.slot(parent, socket)? else {
            return Ok(());
        };
        if current != child {
            return Err(GraphError::LinkMismatch {
                parent,
                socket,
                expected: child,
                found: current,
            });
        }

        self.set_slot(parent, socket, None)?;
        let child_block = self.block_mut(child)?;
        if child_block.parent == Some(Link { parent, socket }) {
            child_block.parent = None;
        }
        debug!(parent = %parent, child = %child, %socket, "detached");
        Ok(())
    }

    /// Unplug a block from whatever it is attached to. Returns the link that
    /// was cleared.
    pub fn detach_from_parent(&mut self, child: BlockId) -> Result<Option<Link>, GraphError> {
        let Some(link) = self.block(child)?.parent else {
            return Ok(None);
        };
        self.detach(link.parent, child, link.socket)?;
        Ok(Some(link))
    }

    fn check_compatible(
        &self,
        parent: BlockId,
        child: BlockId,
        socket: Socket,
    ) -> Result<(), GraphError> {
        let parent_kind = self.block(parent)?.kind();
        let child_kind = self.block(child)?.kind();
        let incompatible = |reason| GraphError::IncompatibleSocket {
            parent,
            child,
            socket,
            reason,
        };

        if socket.holds_chain() != child_kind.is_chainable() {
            return Err(incompatible(if socket.holds_chain() {
                "value blocks cannot be part of a chain"
            } else {
                "only value blocks fit this socket"
            }));
        }

        match (socket, parent_kind) {
            (_, BlockKind::Value(_)) => Err(incompatible("value blocks have no sockets")),
            (Socket::Lower, _) => Ok(()),
            (Socket::Operand, BlockKind::Move(_)) => Ok(()),
            (Socket::Operand, _) => Err(incompatible("only move blocks take an operand")),
            (_, BlockKind::Loop(l)) if !l.is_terminator => Ok(()),
            _ => Err(incompatible("only opening loop blocks have a body and bounds")),
        }
    }

    /// True when `ancestor` is reachable by walking parent links up from `of`.
    pub fn is_ancestor(&self, ancestor: BlockId, of: BlockId) -> bool {
        let mut current = of;
        for _ in 0..=self.slots.len() {
            match self.get(current).and_then(|b| b.parent) {
                Some(link) if link.parent == ancestor => return true,
                Some(link) => current = link.parent,
                None => return false,
            }
        }
        false
    }

    /// The block plugged into `socket` on `parent`, if any.
    pub fn slot(&self, parent: BlockId, socket: Socket) -> Result<Option<BlockId>, GraphError> {
        let block = self.block(parent)?;
        Ok(match (socket, &block.kind) {
            (Socket::Lower, _) => block.lower,
            (Socket::Operand, BlockKind::Move(m)) => m.operand,
            (Socket::Body, BlockKind::Loop(l)) => l.body_head,
            (Socket::Start, BlockKind::Loop(l)) => l.start,
            (Socket::End, BlockKind::Loop(l)) => l.end,
            _ => None,
        })
    }

    fn set_slot(
        &mut self,
        parent: BlockId,
        socket: Socket,
        value: Option<BlockId>,
    ) -> Result<(), GraphError> {
        let block = self.block_mut(parent)?;
        match (socket, &mut block.kind) {
            (Socket::Lower, _) => block.lower = value,
            (Socket::Operand, BlockKind::Move(m)) => m.operand = value,
            (Socket::Body, BlockKind::Loop(l)) => l.body_head = value,
            (Socket::Start, BlockKind::Loop(l)) => l.start = value,
            (Socket::End, BlockKind::Loop(l)) => l.end = value,
            _ => {}
        }
        Ok(())
    }

    /// Every occupied socket of a block.
    pub fn children(&self, id: BlockId) -> Vec<(Socket, BlockId)> {
        let Some(block) = self.get(id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        if let Some(lower) = block.lower {
            out.push((Socket::Lower, lower));
        }
        match &block.kind {
            BlockKind::Move(m) => out.extend(m.operand.map(|v| (Socket::Operand, v))),
            BlockKind::Loop(l) => {
                out.extend(l.body_head.map(|b| (Socket::Body, b)));
                out.extend(l.start.map(|v| (Socket::Start, v)));
                out.extend(l.end.map(|v| (Socket::End, v)));
            }
            BlockKind::Value(_) => {}
        }
        out
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    /// Chain predecessor.
    pub fn upper(&self, id: BlockId) -> Option<BlockId> {
        self.get(id)
            .and_then(|b| b.parent)
            .filter(|link| link.socket == Socket::Lower)
            .map(|link| link.parent)
    }

    /// Chain successor.
    pub fn lower(&self, id: BlockId) -> Option<BlockId> {
        self.get(id).and_then(|b| b.lower)
    }

    pub fn body_head(&self, id: BlockId) -> Option<BlockId> {
        self.get(id).and_then(Block::as_loop).and_then(|l| l.body_head)
    }

    pub fn operand(&self, id: BlockId) -> Option<BlockId> {
        self.get(id).and_then(Block::as_move).and_then(|m| m.operand)
    }

    /// `(start, end)` value blocks of an opening loop.
    pub fn bounds(&self, id: BlockId) -> (Option<BlockId>, Option<BlockId>) {
        match self.get(id).and_then(Block::as_loop) {
            Some(l) => (l.start, l.end),
            None => (None, None),
        }
    }

    pub fn parent_link(&self, id: BlockId) -> Option<Link> {
        self.get(id).and_then(|b| b.parent)
    }

    /// The opening loop whose body chain contains `id`, if any.
    pub fn enclosing_loop(&self, id: BlockId) -> Option<BlockId> {
        let head = self.chain_head(id);
        self.parent_link(head)
            .filter(|link| link.socket == Socket::Body)
            .map(|link| link.parent)
    }

    /// First block of the chain `id` belongs to.
    pub fn chain_head(&self, id: BlockId) -> BlockId {
        let mut current = id;
        for _ in 0..=self.slots.len() {
            match self.upper(current) {
                Some(upper) => current = upper,
                None => break,
            }
        }
        current
    }

    /// `start` followed by its successors, in order.
    pub fn chain(&self, start: BlockId) -> Vec<BlockId> {
        let mut out = Vec::new();
        let mut current = self.get(start).map(|_| start);
        while let Some(id) = current {
            if out.len() > self.slots.len() {
                break;
            }
            out.push(id);
            current = self.lower(id);
        }
        out
    }

    /// Root of the structure containing `id`: follows chain uppers, loop body
    /// ownership and literal ownership until a block with no parent is found.
    pub fn topmost(&self, id: BlockId) -> Result<BlockId, GraphError> {
        let mut current = self.block(id).map(|_| id)?;
        for _ in 0..=self.slots.len() {
            match self.parent_link(current) {
                Some(link) => current = link.parent,
                None => return Ok(current),
            }
        }
        Ok(current)
    }

    // -----------------------------------------------------------------------
    // Literal edits
    // -----------------------------------------------------------------------

    pub fn set_integer(&mut self, id: BlockId, value: i64) -> Result<(), GraphError> {
        match &mut self.block_mut(id)?.kind {
            BlockKind::Value(v) => {
                v.integer_value = value;
                Ok(())
            }
            _ => Err(GraphError::NotAValue(id)),
        }
    }

    pub fn set_boolean(&mut self, id: BlockId, value: bool) -> Result<(), GraphError> {
        match &mut self.block_mut(id)?.kind {
            BlockKind::Value(v) => {
                v.boolean_value = value;
                Ok(())
            }
            _ => Err(GraphError::NotAValue(id)),
        }
    }

    /// Integer carried by the value block plugged into `socket` on `parent`.
    pub fn integer_in(&self, parent: BlockId, socket: Socket) -> Option<i64> {
        self.slot(parent, socket)
            .ok()
            .flatten()
            .and_then(|v| self.get(v))
            .and_then(Block::as_value)
            .and_then(|v| v.as_integer())
    }
}
