//! Human-readable round trace

use ffg_consensus::{
    ConsensusEvent, Engine, FfgEngine, RunFailure, Side, StepResult, SupermajorityLink, VoteSource,
};
use std::io::{self, Write};
use tokio::sync::mpsc;

const RIGHT_COLUMN: usize = 38;

/// Renders consensus events as a console narrative
pub struct Narrator<W> {
    out: W,
}

impl<W: Write> Narrator<W> {
    /// Create a narrator writing to `out`
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Print the run banner
    pub fn banner(&mut self, rounds: u64, seed: u64) -> io::Result<()> {
        writeln!(self.out, "\n***** Simulation will perform {} rounds of voting *****", rounds)?;
        writeln!(self.out, "      (vote seed {})\n", seed)?;
        writeln!(self.out, "========  Created the root  ========\n")
    }

    /// Render every event currently queued on `events`
    pub fn drain(&mut self, events: &mut mpsc::UnboundedReceiver<ConsensusEvent>) -> io::Result<()> {
        while let Ok(event) = events.try_recv() {
            self.render(&event)?;
        }
        Ok(())
    }

    /// Step `engine` to completion, printing each round as soon as it ends
    pub fn follow<S: VoteSource>(
        &mut self,
        engine: &mut FfgEngine<S>,
        events: &mut mpsc::UnboundedReceiver<ConsensusEvent>,
    ) -> io::Result<Result<Vec<SupermajorityLink>, RunFailure>> {
        loop {
            let step = engine.step();
            self.drain(events)?;
            self.out.flush()?;

            match step {
                Ok(StepResult::Linked(_)) => {}
                Ok(StepResult::Complete) => return Ok(Ok(engine.links().to_vec())),
                Err(source) => {
                    return Ok(Err(RunFailure {
                        links: engine.links().to_vec(),
                        source,
                    }))
                }
            }
        }
    }

    /// Render a single event
    pub fn render(&mut self, event: &ConsensusEvent) -> io::Result<()> {
        match event {
            ConsensusEvent::RoundStarted { round, branch_index } => {
                writeln!(
                    self.out,
                    "\nRound {}: voting on the children of index {}\n",
                    round, branch_index
                )?;
                writeln!(
                    self.out,
                    "  {:<width$}{}",
                    "Left voter:",
                    "Right voter:",
                    width = RIGHT_COLUMN - 2
                )?;
                writeln!(
                    self.out,
                    "  {:<width$}{}",
                    "_".repeat(30),
                    "_".repeat(30),
                    width = RIGHT_COLUMN - 2
                )
            }
            ConsensusEvent::PairGrown {
                round,
                parent_index,
                left_index,
                right_index,
            } => {
                writeln!(self.out, "\n========  Creating children for height {}  ========\n", round)?;
                writeln!(
                    self.out,
                    "Index {} is the Left child with parent index {}",
                    left_index, parent_index
                )?;
                writeln!(
                    self.out,
                    "Index {} is the Right child with parent index {}",
                    right_index, parent_index
                )
            }
            ConsensusEvent::BallotCast { ballot, .. } => {
                let entry = format!("{} bal={}", ballot.validator, ballot.weight);
                match ballot.side {
                    Side::Left => writeln!(self.out, "  {}", entry),
                    Side::Right => writeln!(self.out, "{:width$}{}", "", entry, width = RIGHT_COLUMN),
                }
            }
            ConsensusEvent::NodeJustified {
                round,
                index,
                losing_index,
                winning_side,
                winning_weight,
                total_weight,
            } => {
                writeln!(
                    self.out,
                    "\nTotal balance of deposits for winning vote = {} out of {}",
                    winning_weight, total_weight
                )?;
                writeln!(
                    self.out,
                    "\nHeight {} winner is index {} - {} child\n",
                    round, index, winning_side
                )?;
                writeln!(
                    self.out,
                    "Index {} is now Justified (1st vote) and index {} does not move forward",
                    index, losing_index
                )
            }
            ConsensusEvent::NodeFinalized { index, .. } => {
                writeln!(self.out, "Parent index {} is now Finalized (2nd vote)", index)
            }
            ConsensusEvent::LinkEstablished { link } => writeln!(
                self.out,
                "Superlink {}: (source) {} -> {} (target) has been established",
                link.round, link.source_index, link.target_index
            ),
        }
    }

    /// Print the closing summary of established links
    pub fn summary(&mut self, links: &[SupermajorityLink]) -> io::Result<()> {
        writeln!(self.out, "\n=== Supermajority links ({}) ===", links.len())?;
        for link in links {
            writeln!(self.out, "  {}", link)?;
        }
        Ok(())
    }

    /// Consume the narrator, returning the writer
    pub fn into_inner(self) -> W {
        self.out
    }
}
