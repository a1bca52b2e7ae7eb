//! Weighted-majority vote resolution
//!
//! Every validator independently picks the left or right candidate with equal
//! probability. Its weight is added to the chosen side and resolution stops as
//! soon as one side holds strictly more than half of the total weight.

use crate::roster::ValidatorRoster;
use crate::traits::VoteSource;
use crate::{ConsensusError, ConsensusResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace};

/// Candidate side of a sibling pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// A single validator's vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    /// Validator identifier
    pub validator: String,
    /// Validator weight
    pub weight: u64,
    /// Chosen side
    pub side: Side,
}

/// Outcome of a resolved vote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteOutcome {
    /// Winning side
    pub winner: Side,
    /// Tally of the winning side when the threshold was crossed
    pub winning_weight: u64,
    /// Tally of the losing side at that moment
    pub losing_weight: u64,
    /// Total roster weight
    pub total_weight: u64,
    /// Ballots cast before resolution stopped, in roster order
    pub ballots: Vec<Ballot>,
}

/// Returns true when `tally` is strictly more than half of `total`
pub fn exceeds_half(tally: u64, total: u64) -> bool {
    u128::from(tally) * 2 > u128::from(total)
}

/// Resolves a round's winner from a roster and a vote source
#[derive(Debug)]
pub struct VoteResolver<S> {
    source: S,
}

impl<S: VoteSource> VoteResolver<S> {
    /// Create a resolver drawing from `source`
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Access the underlying vote source
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Collect ballots until one side strictly exceeds half the total weight
    pub fn resolve(&mut self, roster: &ValidatorRoster) -> ConsensusResult<VoteOutcome> {
        let total_weight = roster.total_weight();
        let mut left_weight: u64 = 0;
        let mut right_weight: u64 = 0;
        let mut ballots = Vec::with_capacity(roster.len());

        for validator in roster {
            let side = self.source.next_side();
            trace!(validator = %validator.id, weight = validator.weight, %side, "Ballot cast");

            // Roster construction guarantees the sum fits in u64
            let tally = match side {
                Side::Left => {
                    left_weight += validator.weight;
                    left_weight
                }
                Side::Right => {
                    right_weight += validator.weight;
                    right_weight
                }
            };
            ballots.push(Ballot {
                validator: validator.id.clone(),
                weight: validator.weight,
                side,
            });

            if exceeds_half(tally, total_weight) {
                debug!(
                    %side,
                    tally,
                    total_weight,
                    ballots = ballots.len(),
                    "Supermajority reached"
                );
                return Ok(VoteOutcome {
                    winner: side,
                    winning_weight: tally,
                    losing_weight: match side {
                        Side::Left => right_weight,
                        Side::Right => left_weight,
                    },
                    total_weight,
                    ballots,
                });
            }
        }

        Err(ConsensusError::NoMajority {
            left_weight,
            right_weight,
            total_weight,
        })
    }
}

/// Fair coin per validator backed by a seedable RNG
#[derive(Debug, Clone)]
pub struct RandomVoteSource<R = StdRng> {
    rng: R,
}

impl<R: Rng> RandomVoteSource<R> {
    /// Wrap an existing RNG
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomVoteSource<StdRng> {
    /// Reproducible source for a given seed
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> VoteSource for RandomVoteSource<R> {
    fn next_side(&mut self) -> Side {
        if self.rng.random_bool(0.5) {
            Side::Left
        } else {
            Side::Right
        }
    }
}

/// Replays a fixed sequence of sides, wrapping around at the end
#[derive(Debug, Clone)]
pub struct ScriptedVoteSource {
    script: Vec<Side>,
    position: usize,
}

impl ScriptedVoteSource {
    /// Create a scripted source; an empty script behaves like `always(Left)`
    pub fn new(script: Vec<Side>) -> Self {
        let script = if script.is_empty() {
            vec![Side::Left]
        } else {
            script
        };
        Self {
            script,
            position: 0,
        }
    }

    /// Source that always picks `side`
    pub fn always(side: Side) -> Self {
        Self::new(vec![side])
    }

    /// Number of sides drawn so far
    pub fn draws(&self) -> usize {
        self.position
    }
}

impl VoteSource for ScriptedVoteSource {
    fn next_side(&mut self) -> Side {
        let side = self.script[self.position % self.script.len()];
        self.position += 1;
        side
    }
}
