//! Consensus error types

use crate::link::SupermajorityLink;
use crate::tree::FinalityState;
use thiserror::Error;

/// Consensus error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    /// Empty roster or a validator with non-positive weight
    #[error("Invalid roster: {0}")]
    InvalidRoster(String),

    /// Every validator voted and neither side strictly exceeds half the stake
    #[error(
        "No majority: left {left_weight}, right {right_weight} out of {total_weight}"
    )]
    NoMajority {
        left_weight: u64,
        right_weight: u64,
        total_weight: u64,
    },

    /// Pair grown under a checkpoint that does not exist
    #[error("Unknown parent checkpoint {0}")]
    UnknownParent(u64),

    /// Lookup of a checkpoint that does not exist
    #[error("Unknown checkpoint index {0}")]
    UnknownIndex(u64),

    /// Checkpoint already carries a sibling pair
    #[error("Checkpoint {0} already has children")]
    AlreadyHasChildren(u64),

    /// Child indices for a slot do not fit in u64
    #[error("Checkpoint indices for slot {0} overflow u64")]
    IndexOverflow(u64),

    /// A grown child index is already occupied in the tree
    #[error("Checkpoint index {0} already exists")]
    DuplicateIndex(u64),

    /// Finality state machine violation
    #[error("Invalid transition for checkpoint {index}: {from:?} -> {to:?}")]
    InvalidTransition {
        index: u64,
        from: FinalityState,
        to: FinalityState,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ConsensusError {
    fn from(err: serde_json::Error) -> Self {
        ConsensusError::Serialization(err.to_string())
    }
}

/// Result type for consensus operations
pub type ConsensusResult<T> = Result<T, ConsensusError>;

/// A run that aborted part-way, together with the links it already produced
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Run aborted after {} link(s): {source}", .links.len())]
pub struct RunFailure {
    /// Links established before the failing round
    pub links: Vec<SupermajorityLink>,
    /// Error that stopped the run
    pub source: ConsensusError,
}
