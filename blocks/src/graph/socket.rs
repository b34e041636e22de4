use std::fmt;

use crate::block::BlockId;

/// A place on a parent block where a child can be plugged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Socket {
    /// Chain successor: the child runs after the parent.
    Lower,
    /// First block of an opening loop's body.
    Body,
    /// Literal of a move block.
    Operand,
    /// Lower bound of an opening loop.
    Start,
    /// Upper bound of an opening loop.
    End,
}

impl Socket {
    /// Sockets that take move and loop blocks rather than values.
    pub fn holds_chain(self) -> bool {
        matches!(self, Socket::Lower | Socket::Body)
    }

    pub fn name(self) -> &'static str {
        match self {
            Socket::Lower => "lower",
            Socket::Body => "body",
            Socket::Operand => "operand",
            Socket::Start => "start",
            Socket::End => "end",
        }
    }
}

impl fmt::Display for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The parent side of an attachment, as seen from the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    pub parent: BlockId,
    pub socket: Socket,
}
