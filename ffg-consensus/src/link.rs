//! Supermajority links

use crate::vote::Side;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Edge from a finalized source checkpoint to its newly justified child
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupermajorityLink {
    /// Round that produced the link, starting at 1
    pub round: u64,
    /// Parent checkpoint, finalized by this link
    pub source_index: u64,
    /// Winning child, justified by this link
    pub target_index: u64,
    pub winning_side: Side,
    pub winning_weight: u64,
    pub total_weight: u64,
}

impl fmt::Display for SupermajorityLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{}: {} -> {} ({}, {}/{})",
            self.round,
            self.source_index,
            self.target_index,
            self.winning_side,
            self.winning_weight,
            self.total_weight
        )
    }
}

/// Check that each link's target is the next link's source
pub fn is_chained(links: &[SupermajorityLink]) -> bool {
    links
        .windows(2)
        .all(|pair| pair[0].target_index == pair[1].source_index && pair[1].round == pair[0].round + 1)
}
