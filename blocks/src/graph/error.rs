use thiserror::Error;

use crate::block::BlockId;
use crate::graph::Socket;

/// Rejected graph mutations and lookups.
///
/// `WouldCycle` and `LinkMismatch` guard structural invariants: the mutation
/// is refused and the graph is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("unknown block {0}")]
    UnknownBlock(BlockId),

    #[error("cannot plug {child} into the {socket} socket of {parent}: {reason}")]
    IncompatibleSocket {
        parent: BlockId,
        child: BlockId,
        socket: Socket,
        reason: &'static str,
    },

    #[error("attaching {child} under {parent} would create a cycle")]
    WouldCycle { parent: BlockId, child: BlockId },

    #[error("{socket} socket of {parent} holds {found}, not {expected}")]
    LinkMismatch {
        parent: BlockId,
        socket: Socket,
        expected: BlockId,
        found: BlockId,
    },

    #[error("block {0} is not a value block")]
    NotAValue(BlockId),
}
