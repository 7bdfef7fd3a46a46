//! Error types for the Treesync engine.

use crate::{OriginalId, Role};
use thiserror::Error;

/// All possible errors from the Treesync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Identity errors
    #[error("duplicate node id in specification: {0}")]
    DuplicateSpecId(OriginalId),

    #[error("duplicate node id in live tree: {0}")]
    DuplicateLiveId(OriginalId),

    #[error("identity mismatch: live node is '{actual}', specification expects '{expected}'")]
    IdentityMismatch {
        expected: OriginalId,
        actual: OriginalId,
    },

    // Import errors
    #[error("cyclic move: cannot relocate {}", .0.join(", "))]
    CyclicMove(Vec<OriginalId>),

    #[error("unresolved reference '{role}' on node {node}: no node with id {target}")]
    UnresolvedReference {
        node: OriginalId,
        role: Role,
        target: OriginalId,
    },

    // Live tree errors
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("index {index} out of bounds for role '{role}' with {len} children")]
    IndexOutOfBounds { role: Role, index: usize, len: usize },

    #[error("invalid move: {0}")]
    InvalidMove(String),

    // Invalidation errors
    #[error("path is not rooted at the tracked root")]
    ForeignPath,

    #[error("invalid size limit: {0} (must be at least 1)")]
    InvalidSizeLimit(usize),

    // Data errors
    #[error("invalid model data: {0}")]
    InvalidData(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
