//! FFG consensus engine implementation
//!
//! Each round grows a sibling pair under the current branch checkpoint, votes
//! on it, justifies the winner and finalizes the branch point. The winner then
//! becomes the branch point of the next round.

use crate::config::{effective_rounds, IndexScheme, SimulationConfig};
use crate::link::SupermajorityLink;
use crate::roster::ValidatorRoster;
use crate::traits::{Engine, StepResult, VoteSource};
use crate::tree::{CheckpointTree, ROOT_INDEX};
use crate::vote::{Ballot, RandomVoteSource, Side, VoteResolver};
use crate::{ConsensusResult, RunFailure};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Consensus events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsensusEvent {
    /// Voting for a round is about to start
    RoundStarted { round: u64, branch_index: u64 },
    /// A new candidate pair was attached to the tree
    PairGrown {
        round: u64,
        parent_index: u64,
        left_index: u64,
        right_index: u64,
    },
    /// A validator's ballot counted towards the round
    BallotCast { round: u64, ballot: Ballot },
    /// The winning candidate became justified
    NodeJustified {
        round: u64,
        index: u64,
        losing_index: u64,
        winning_side: Side,
        winning_weight: u64,
        total_weight: u64,
    },
    /// The branch point became finalized
    NodeFinalized { round: u64, index: u64 },
    /// A supermajority link was recorded
    LinkEstablished { link: SupermajorityLink },
}

/// FFG consensus engine
pub struct FfgEngine<S> {
    /// Fixed electorate
    roster: ValidatorRoster,
    /// Vote resolver wrapping the injected vote source
    resolver: VoteResolver<S>,
    /// Checkpoint arena
    tree: CheckpointTree,
    /// Append-only link history
    links: Vec<SupermajorityLink>,
    /// Checkpoint whose children are voted on next
    current_branch: u64,
    /// Completed rounds
    round: u64,
    /// Rounds to run
    max_rounds: u64,
    /// Pair numbering
    index_scheme: IndexScheme,
    /// Event sender for notifications
    event_sender: Option<mpsc::UnboundedSender<ConsensusEvent>>,
}

impl<S: VoteSource> FfgEngine<S> {
    /// Create a new engine; non-positive `max_rounds` falls back to the default
    pub fn new(roster: ValidatorRoster, source: S, max_rounds: i64) -> Self {
        let max_rounds = effective_rounds(max_rounds);
        info!(
            validators = roster.len(),
            total_weight = roster.total_weight(),
            max_rounds,
            "Created FFG engine"
        );

        Self {
            roster,
            resolver: VoteResolver::new(source),
            tree: CheckpointTree::new_root(),
            links: Vec::new(),
            current_branch: ROOT_INDEX,
            round: 0,
            max_rounds,
            index_scheme: IndexScheme::default(),
            event_sender: None,
        }
    }

    /// Select the pair numbering scheme; only meaningful before the first round
    pub fn with_index_scheme(mut self, scheme: IndexScheme) -> Self {
        self.index_scheme = scheme;
        self
    }

    /// Set event sender for notifications
    pub fn set_event_sender(&mut self, sender: mpsc::UnboundedSender<ConsensusEvent>) {
        self.event_sender = Some(sender);
    }

    /// Checkpoint tree
    pub fn tree(&self) -> &CheckpointTree {
        &self.tree
    }

    /// Links established so far
    pub fn links(&self) -> &[SupermajorityLink] {
        &self.links
    }

    /// Checkpoint whose children are voted on next
    pub fn current_branch(&self) -> u64 {
        self.current_branch
    }

    /// Validator roster
    pub fn roster(&self) -> &ValidatorRoster {
        &self.roster
    }

    /// Rounds this engine will run
    pub fn max_rounds(&self) -> u64 {
        self.max_rounds
    }

    /// Run every remaining round
    ///
    /// On failure the links produced before the failing round are returned
    /// inside the error.
    pub fn run(&mut self) -> Result<Vec<SupermajorityLink>, RunFailure> {
        loop {
            match self.step() {
                Ok(StepResult::Linked(_)) => continue,
                Ok(StepResult::Complete) => break,
                Err(source) => {
                    warn!(
                        round = self.round + 1,
                        links = self.links.len(),
                        error = %source,
                        "Run aborted"
                    );
                    return Err(RunFailure {
                        links: self.links.clone(),
                        source,
                    });
                }
            }
        }

        info!(
            rounds = self.round,
            finalized = self.tree.finalized().len(),
            "Run complete"
        );
        Ok(self.links.clone())
    }

    /// Send event notification
    fn send_event(&self, event: ConsensusEvent) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event) {
                warn!("Failed to send consensus event: {}", e);
            }
        }
    }

    /// Attach the candidate pair for `round` under the current branch
    fn grow_candidates(&mut self, round: u64) -> ConsensusResult<(u64, u64)> {
        let slot = match self.index_scheme {
            IndexScheme::Height => round - 1,
            IndexScheme::Structural => self.current_branch,
        };
        let (left_index, right_index) = self.tree.grow_pair_at(self.current_branch, slot)?;

        debug!(
            round,
            parent = self.current_branch,
            left_index,
            right_index,
            "Grew candidate pair"
        );
        self.send_event(ConsensusEvent::PairGrown {
            round,
            parent_index: self.current_branch,
            left_index,
            right_index,
        });
        Ok((left_index, right_index))
    }
}

impl FfgEngine<RandomVoteSource> {
    /// Build an engine from configuration, returning it with the seed in use
    pub fn from_config(config: &SimulationConfig) -> ConsensusResult<(Self, u64)> {
        let roster = config.to_roster()?;
        let seed = config.seed.unwrap_or_else(rand::random);
        let engine = Self::new(roster, RandomVoteSource::seeded(seed), config.max_rounds)
            .with_index_scheme(config.index_scheme);
        Ok((engine, seed))
    }
}

impl<S: VoteSource> Engine for FfgEngine<S> {
    fn step(&mut self) -> ConsensusResult<StepResult> {
        if self.is_complete() {
            return Ok(StepResult::Complete);
        }

        let round = self.round + 1;
        debug!(round, branch = self.current_branch, "Starting round");
        self.send_event(ConsensusEvent::RoundStarted {
            round,
            branch_index: self.current_branch,
        });

        let (left_index, right_index) = match self.tree.children(self.current_branch)? {
            Some(pair) => pair,
            None => self.grow_candidates(round)?,
        };

        let outcome = self.resolver.resolve(&self.roster)?;
        for ballot in &outcome.ballots {
            self.send_event(ConsensusEvent::BallotCast {
                round,
                ballot: ballot.clone(),
            });
        }

        let (winning_index, losing_index) = match outcome.winner {
            Side::Left => (left_index, right_index),
            Side::Right => (right_index, left_index),
        };

        self.tree.mark_justified(winning_index)?;
        info!(
            round,
            index = winning_index,
            side = %outcome.winner,
            weight = outcome.winning_weight,
            total = outcome.total_weight,
            "Checkpoint justified"
        );
        self.send_event(ConsensusEvent::NodeJustified {
            round,
            index: winning_index,
            losing_index,
            winning_side: outcome.winner,
            winning_weight: outcome.winning_weight,
            total_weight: outcome.total_weight,
        });

        let source_index = self.current_branch;
        self.tree.mark_finalized(source_index)?;
        info!(round, index = source_index, "Checkpoint finalized");
        self.send_event(ConsensusEvent::NodeFinalized {
            round,
            index: source_index,
        });

        let link = SupermajorityLink {
            round,
            source_index,
            target_index: winning_index,
            winning_side: outcome.winner,
            winning_weight: outcome.winning_weight,
            total_weight: outcome.total_weight,
        };
        self.links.push(link.clone());
        info!(round, source = source_index, target = winning_index, "Supermajority link established");
        self.send_event(ConsensusEvent::LinkEstablished { link: link.clone() });

        self.current_branch = winning_index;
        self.round = round;

        if round < self.max_rounds {
            self.grow_candidates(round + 1)?;
        }

        Ok(StepResult::Linked(link))
    }

    fn current_round(&self) -> u64 {
        self.round
    }

    fn is_complete(&self) -> bool {
        self.round >= self.max_rounds
    }
}

/// Run a full simulation over `roster` with the given vote source
pub fn run<S: VoteSource>(
    roster: ValidatorRoster,
    source: S,
    max_rounds: i64,
) -> Result<Vec<SupermajorityLink>, RunFailure> {
    FfgEngine::new(roster, source, max_rounds).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::reference_roster;
    use crate::tree::FinalityState;
    use crate::vote::ScriptedVoteSource;
    use crate::ConsensusError;

    fn reference() -> ValidatorRoster {
        ValidatorRoster::new(reference_roster()).unwrap()
    }

    fn create_test_engine(side: Side, rounds: i64) -> FfgEngine<ScriptedVoteSource> {
        FfgEngine::new(reference(), ScriptedVoteSource::always(side), rounds)
    }

    #[test]
    fn test_engine_creation() {
        let engine = create_test_engine(Side::Left, 3);
        assert_eq!(engine.current_round(), 0);
        assert_eq!(engine.current_branch(), ROOT_INDEX);
        assert_eq!(engine.max_rounds(), 3);
        assert_eq!(engine.tree().len(), 1);
        assert!(engine.links().is_empty());
        assert!(!engine.is_complete());
    }

    #[test]
    fn test_non_positive_rounds_default_to_ten() {
        assert_eq!(create_test_engine(Side::Left, 0).max_rounds(), 10);
        assert_eq!(create_test_engine(Side::Left, -4).max_rounds(), 10);
    }

    #[test]
    fn test_single_round() {
        let mut engine = create_test_engine(Side::Right, 1);
        let links = engine.run().unwrap();

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].source_index, 0);
        assert_eq!(links[0].target_index, 2);
        assert_eq!(links[0].winning_side, Side::Right);
        assert_eq!(engine.tree().len(), 3);
        assert_eq!(engine.tree().node(2).unwrap().state, FinalityState::Justified);
        assert_eq!(engine.tree().node(1).unwrap().state, FinalityState::Unknown);
        assert_eq!(engine.tree().node(0).unwrap().state, FinalityState::Finalized);
    }

    #[test]
    fn test_step_by_step_height_numbering() {
        let mut engine = create_test_engine(Side::Right, 3);

        let first = match engine.step().unwrap() {
            StepResult::Linked(link) => link,
            StepResult::Complete => panic!("Expected a link"),
        };
        assert_eq!((first.source_index, first.target_index), (0, 2));
        // Next pair is already grown under the winner
        assert_eq!(engine.tree().children(2).unwrap(), Some((3, 4)));

        engine.step().unwrap();
        engine.step().unwrap();
        assert_eq!(engine.step().unwrap(), StepResult::Complete);

        let targets: Vec<u64> = engine.links().iter().map(|l| l.target_index).collect();
        assert_eq!(targets, vec![2, 4, 6]);
        assert_eq!(engine.tree().finalized(), vec![0, 2, 4]);
        assert_eq!(engine.tree().nodes_in_state(FinalityState::Justified), vec![6]);
        // No pair grown after the final round
        assert_eq!(engine.tree().len(), 7);
    }

    #[test]
    fn test_structural_numbering() {
        let mut engine =
            create_test_engine(Side::Right, 3).with_index_scheme(IndexScheme::Structural);
        let links = engine.run().unwrap();

        let targets: Vec<u64> = links.iter().map(|l| l.target_index).collect();
        assert_eq!(targets, vec![2, 6, 14]);
        for link in &links {
            assert_eq!(link.target_index, 2 * link.source_index + 2);
        }
    }

    #[test]
    fn test_events_are_published() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine = create_test_engine(Side::Left, 1);
        engine.set_event_sender(tx);
        engine.run().unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        assert_eq!(
            events.first(),
            Some(&ConsensusEvent::RoundStarted {
                round: 1,
                branch_index: 0
            })
        );
        assert!(matches!(
            events[1],
            ConsensusEvent::PairGrown {
                parent_index: 0,
                left_index: 1,
                right_index: 2,
                ..
            }
        ));
        let ballots = events
            .iter()
            .filter(|e| matches!(e, ConsensusEvent::BallotCast { .. }))
            .count();
        assert_eq!(ballots, 6);
        assert!(matches!(
            events.last(),
            Some(ConsensusEvent::LinkEstablished { link }) if link.target_index == 1
        ));
    }

    #[test]
    fn test_dropped_receiver_does_not_abort() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut engine = create_test_engine(Side::Left, 2);
        engine.set_event_sender(tx);
        assert_eq!(engine.run().unwrap().len(), 2);
    }

    #[test]
    fn test_no_majority_returns_partial_links() {
        let roster = ValidatorRoster::from_pairs([("a", 50), ("b", 50)]).unwrap();
        // Round one unanimous, round two split
        let source = ScriptedVoteSource::new(vec![Side::Left, Side::Left, Side::Left, Side::Right]);
        let failure = run(roster, source, 3).unwrap_err();

        assert_eq!(failure.links.len(), 1);
        assert_eq!(failure.links[0].target_index, 1);
        assert!(matches!(failure.source, ConsensusError::NoMajority { .. }));
    }

    #[test]
    fn test_from_config_uses_seed() {
        let config = SimulationConfig::default().with_max_rounds(5).with_seed(11);
        let (mut first, seed) = FfgEngine::from_config(&config).unwrap();
        let (mut second, _) = FfgEngine::from_config(&config).unwrap();
        assert_eq!(seed, 11);
        // An exact 50/50 split can abort a seeded run; both runs must agree either way
        assert_eq!(first.run(), second.run());
    }

    #[test]
    fn test_structural_overflow_aborts_with_partial_links() {
        let mut engine =
            create_test_engine(Side::Right, 70).with_index_scheme(IndexScheme::Structural);
        let failure = engine.run().unwrap_err();

        // Right winners are 2^(k+1) - 2; the pair after round 63 no longer fits
        assert_eq!(failure.links.len(), 63);
        assert_eq!(failure.links[62].target_index, u64::MAX - 1);
        assert_eq!(failure.source, ConsensusError::IndexOverflow(u64::MAX - 1));
    }
}
