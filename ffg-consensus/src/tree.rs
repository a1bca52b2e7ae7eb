//! Checkpoint tree
//!
//! Nodes live in an index-keyed arena owned by the tree. Parent and child
//! links are stored as indices, never as references.

use crate::vote::Side;
use crate::{ConsensusError, ConsensusResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Index of the genesis checkpoint
pub const ROOT_INDEX: u64 = 0;

/// Checkpoint finality state
///
/// State progression: Unknown -> Justified -> Finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FinalityState {
    /// Candidate that has not won a vote
    Unknown,
    /// Target of a supermajority link
    Justified,
    /// Permanently part of the canonical chain
    Finalized,
}

impl fmt::Display for FinalityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalityState::Unknown => write!(f, "Unknown"),
            FinalityState::Justified => write!(f, "Justified"),
            FinalityState::Finalized => write!(f, "Finalized"),
        }
    }
}

/// A checkpoint node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointNode {
    pub index: u64,
    pub parent_index: Option<u64>,
    pub left_child_index: Option<u64>,
    pub right_child_index: Option<u64>,
    /// Which side of its sibling pair this node is; `None` for the root
    pub side: Option<Side>,
    pub state: FinalityState,
}

impl CheckpointNode {
    fn child(index: u64, parent_index: u64, side: Side) -> Self {
        Self {
            index,
            parent_index: Some(parent_index),
            left_child_index: None,
            right_child_index: None,
            side: Some(side),
            state: FinalityState::Unknown,
        }
    }

    /// Whether a sibling pair hangs off this node
    pub fn has_children(&self) -> bool {
        self.left_child_index.is_some() || self.right_child_index.is_some()
    }

    /// Child index on the given side
    pub fn child_index(&self, side: Side) -> Option<u64> {
        match side {
            Side::Left => self.left_child_index,
            Side::Right => self.right_child_index,
        }
    }
}

/// Arena of checkpoint nodes keyed by index
#[derive(Debug, Clone)]
pub struct CheckpointTree {
    nodes: BTreeMap<u64, CheckpointNode>,
}

impl CheckpointTree {
    /// Tree holding only the genesis checkpoint, finalized by convention
    pub fn new_root() -> Self {
        let root = CheckpointNode {
            index: ROOT_INDEX,
            parent_index: None,
            left_child_index: None,
            right_child_index: None,
            side: None,
            state: FinalityState::Finalized,
        };

        let mut nodes = BTreeMap::new();
        nodes.insert(ROOT_INDEX, root);
        Self { nodes }
    }

    /// Grow children `2n+1` and `2n+2` under node `n`
    pub fn grow_pair(&mut self, parent_index: u64) -> ConsensusResult<(u64, u64)> {
        self.grow_pair_at(parent_index, parent_index)
    }

    /// Grow children `2*slot+1` and `2*slot+2` under `parent_index`
    ///
    /// With `slot == parent_index` this is the structural layout. The engine
    /// passes the round height instead to number pairs along a single chain.
    pub fn grow_pair_at(&mut self, parent_index: u64, slot: u64) -> ConsensusResult<(u64, u64)> {
        let parent = self
            .nodes
            .get(&parent_index)
            .ok_or(ConsensusError::UnknownParent(parent_index))?;
        if parent.has_children() {
            return Err(ConsensusError::AlreadyHasChildren(parent_index));
        }

        let left = slot
            .checked_mul(2)
            .and_then(|n| n.checked_add(1))
            .ok_or(ConsensusError::IndexOverflow(slot))?;
        let right = left
            .checked_add(1)
            .ok_or(ConsensusError::IndexOverflow(slot))?;
        for index in [left, right] {
            if self.nodes.contains_key(&index) {
                return Err(ConsensusError::DuplicateIndex(index));
            }
        }

        self.nodes
            .insert(left, CheckpointNode::child(left, parent_index, Side::Left));
        self.nodes
            .insert(right, CheckpointNode::child(right, parent_index, Side::Right));

        let parent = self
            .nodes
            .get_mut(&parent_index)
            .ok_or(ConsensusError::UnknownParent(parent_index))?;
        parent.left_child_index = Some(left);
        parent.right_child_index = Some(right);

        Ok((left, right))
    }

    /// Unknown -> Justified
    pub fn mark_justified(&mut self, index: u64) -> ConsensusResult<()> {
        let node = self.node_mut(index)?;
        if node.state != FinalityState::Unknown {
            return Err(ConsensusError::InvalidTransition {
                index,
                from: node.state,
                to: FinalityState::Justified,
            });
        }
        node.state = FinalityState::Justified;
        Ok(())
    }

    /// Justified -> Finalized; the genesis root is accepted as already final
    pub fn mark_finalized(&mut self, index: u64) -> ConsensusResult<()> {
        let node = self.node_mut(index)?;
        let allowed = match node.state {
            FinalityState::Justified => true,
            FinalityState::Finalized => index == ROOT_INDEX,
            FinalityState::Unknown => false,
        };
        if !allowed {
            return Err(ConsensusError::InvalidTransition {
                index,
                from: node.state,
                to: FinalityState::Finalized,
            });
        }
        node.state = FinalityState::Finalized;
        Ok(())
    }

    /// Look up a node by index
    pub fn node(&self, index: u64) -> ConsensusResult<&CheckpointNode> {
        self.nodes
            .get(&index)
            .ok_or(ConsensusError::UnknownIndex(index))
    }

    fn node_mut(&mut self, index: u64) -> ConsensusResult<&mut CheckpointNode> {
        self.nodes
            .get_mut(&index)
            .ok_or(ConsensusError::UnknownIndex(index))
    }

    /// Children of `index` as a `(left, right)` pair, if grown
    pub fn children(&self, index: u64) -> ConsensusResult<Option<(u64, u64)>> {
        let node = self.node(index)?;
        Ok(node.left_child_index.zip(node.right_child_index))
    }

    /// Number of nodes in the tree
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false; the root exists from construction
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in ascending index order
    pub fn iter(&self) -> impl Iterator<Item = &CheckpointNode> {
        self.nodes.values()
    }

    /// Indices of all finalized checkpoints in ascending order
    pub fn finalized(&self) -> Vec<u64> {
        self.nodes_in_state(FinalityState::Finalized)
    }

    /// Indices of all checkpoints in `state`
    pub fn nodes_in_state(&self, state: FinalityState) -> Vec<u64> {
        self.nodes
            .values()
            .filter(|n| n.state == state)
            .map(|n| n.index)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_root() {
        let tree = CheckpointTree::new_root();
        assert_eq!(tree.len(), 1);
        let root = tree.node(ROOT_INDEX).unwrap();
        assert_eq!(root.state, FinalityState::Finalized);
        assert_eq!(root.parent_index, None);
        assert_eq!(root.side, None);
        assert!(!root.has_children());
    }

    #[test]
    fn test_grow_pair_structural_indices() {
        let mut tree = CheckpointTree::new_root();
        assert_eq!(tree.grow_pair(0).unwrap(), (1, 2));
        assert_eq!(tree.grow_pair(2).unwrap(), (5, 6));
        assert_eq!(tree.grow_pair(5).unwrap(), (11, 12));

        let left = tree.node(11).unwrap();
        assert_eq!(left.parent_index, Some(5));
        assert_eq!(left.side, Some(Side::Left));
        assert_eq!(left.state, FinalityState::Unknown);
        assert_eq!(tree.children(5).unwrap(), Some((11, 12)));
        assert_eq!(tree.children(1).unwrap(), None);
        assert_eq!(tree.len(), 7);
    }

    #[test]
    fn test_grow_pair_twice_fails() {
        let mut tree = CheckpointTree::new_root();
        tree.grow_pair(0).unwrap();
        assert_eq!(tree.grow_pair(0), Err(ConsensusError::AlreadyHasChildren(0)));
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_grow_pair_unknown_parent() {
        let mut tree = CheckpointTree::new_root();
        assert_eq!(tree.grow_pair(4), Err(ConsensusError::UnknownParent(4)));
    }

    #[test]
    fn test_grow_pair_at_height() {
        let mut tree = CheckpointTree::new_root();
        tree.grow_pair_at(0, 0).unwrap();
        // Round two attaches 3/4 under the right winner
        assert_eq!(tree.grow_pair_at(2, 1).unwrap(), (3, 4));
        assert_eq!(tree.node(3).unwrap().parent_index, Some(2));
        assert_eq!(tree.node(4).unwrap().parent_index, Some(2));
    }

    #[test]
    fn test_grow_pair_at_duplicate_index() {
        let mut tree = CheckpointTree::new_root();
        tree.grow_pair_at(0, 0).unwrap();
        assert_eq!(tree.grow_pair_at(1, 0), Err(ConsensusError::DuplicateIndex(1)));
        // Failed growth leaves the parent untouched
        assert!(!tree.node(1).unwrap().has_children());
    }

    #[test]
    fn test_state_transitions() {
        let mut tree = CheckpointTree::new_root();
        tree.grow_pair(0).unwrap();

        // Cannot finalize without justifying first
        assert_eq!(
            tree.mark_finalized(1),
            Err(ConsensusError::InvalidTransition {
                index: 1,
                from: FinalityState::Unknown,
                to: FinalityState::Finalized,
            })
        );

        tree.mark_justified(1).unwrap();
        assert_eq!(tree.node(1).unwrap().state, FinalityState::Justified);

        // Re-justification is rejected
        assert!(matches!(
            tree.mark_justified(1),
            Err(ConsensusError::InvalidTransition { .. })
        ));

        tree.mark_finalized(1).unwrap();
        assert_eq!(tree.node(1).unwrap().state, FinalityState::Finalized);

        // Finalized never regresses
        assert!(matches!(
            tree.mark_justified(1),
            Err(ConsensusError::InvalidTransition { from: FinalityState::Finalized, .. })
        ));
        assert_eq!(tree.node(1).unwrap().state, FinalityState::Finalized);
        assert_eq!(tree.node(2).unwrap().state, FinalityState::Unknown);
        assert_eq!(tree.finalized(), vec![0, 1]);
    }

    #[test]
    fn test_refinalize_only_for_root() {
        let mut tree = CheckpointTree::new_root();
        tree.grow_pair(0).unwrap();
        tree.mark_justified(2).unwrap();
        tree.mark_finalized(2).unwrap();

        assert_eq!(
            tree.mark_finalized(2),
            Err(ConsensusError::InvalidTransition {
                index: 2,
                from: FinalityState::Finalized,
                to: FinalityState::Finalized,
            })
        );
        assert_eq!(tree.node(2).unwrap().state, FinalityState::Finalized);
    }

    #[test]
    fn test_grow_pair_index_overflow() {
        let mut tree = CheckpointTree::new_root();
        assert_eq!(
            tree.grow_pair_at(0, u64::MAX / 2),
            Err(ConsensusError::IndexOverflow(u64::MAX / 2))
        );
        assert_eq!(
            tree.grow_pair_at(0, u64::MAX),
            Err(ConsensusError::IndexOverflow(u64::MAX))
        );
        // Parent is left without children
        assert_eq!(tree.children(0).unwrap(), None);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_root_finalize_is_accepted() {
        let mut tree = CheckpointTree::new_root();
        tree.mark_finalized(ROOT_INDEX).unwrap();
        assert_eq!(tree.node(ROOT_INDEX).unwrap().state, FinalityState::Finalized);
    }

    #[test]
    fn test_unknown_index() {
        let mut tree = CheckpointTree::new_root();
        assert_eq!(tree.node(9).err(), Some(ConsensusError::UnknownIndex(9)));
        assert_eq!(tree.mark_justified(9), Err(ConsensusError::UnknownIndex(9)));
        assert_eq!(tree.mark_finalized(9), Err(ConsensusError::UnknownIndex(9)));
    }
}
