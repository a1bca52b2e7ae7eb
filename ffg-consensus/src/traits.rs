//! Consensus engine traits and types

use crate::link::SupermajorityLink;
use crate::vote::Side;
use crate::ConsensusResult;

/// Source of individual validator choices
///
/// Each call yields one validator's pick, independent of its weight.
pub trait VoteSource {
    /// Draw the next side
    fn next_side(&mut self) -> Side;
}

/// Result of a consensus step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// A round completed and produced a link
    Linked(SupermajorityLink),
    /// All configured rounds have already run
    Complete,
}

/// Main consensus engine trait
pub trait Engine {
    /// Run one voting round
    fn step(&mut self) -> ConsensusResult<StepResult>;

    /// Number of rounds completed so far
    fn current_round(&self) -> u64;

    /// Whether every configured round has completed
    fn is_complete(&self) -> bool;
}
