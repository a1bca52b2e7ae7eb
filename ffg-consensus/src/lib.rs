//! Casper FFG finality simulation
//!
//! This crate models a simplified finality gadget over a checkpoint tree:
//! a fixed set of weighted validators votes on which of two candidate
//! checkpoints extends the chain, and each winning vote justifies the target
//! and finalizes its parent.

pub mod config;
pub mod engine;
pub mod error;
pub mod link;
pub mod roster;
pub mod traits;
pub mod tree;
pub mod vote;

pub use config::{IndexScheme, SimulationConfig, ValidatorConfig, DEFAULT_ROUNDS};
pub use engine::{ConsensusEvent, FfgEngine};
pub use error::{ConsensusError, ConsensusResult, RunFailure};
pub use link::SupermajorityLink;
pub use roster::{reference_roster, Validator, ValidatorRoster};
pub use traits::{Engine, StepResult, VoteSource};
pub use tree::{CheckpointNode, CheckpointTree, FinalityState, ROOT_INDEX};
pub use vote::{Ballot, RandomVoteSource, ScriptedVoteSource, Side, VoteOutcome, VoteResolver};
