//! Validator roster
//!
//! The roster is the fixed, ordered electorate of a run. Order only matters
//! for the ballot trace; the outcome of a round depends on weights alone.

use crate::{ConsensusError, ConsensusResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Validator information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Validator identifier
    pub id: String,
    /// Validator weight (deposit)
    pub weight: u64,
}

impl Validator {
    /// Create a new validator
    pub fn new(id: impl Into<String>, weight: u64) -> Self {
        Self {
            id: id.into(),
            weight,
        }
    }
}

/// Immutable, ordered set of validators with a precomputed total weight
#[derive(Debug, Clone)]
pub struct ValidatorRoster {
    validators: Vec<Validator>,
    total_weight: u64,
}

impl ValidatorRoster {
    /// Build a roster, rejecting empty sets, zero weights and duplicate ids
    pub fn new(validators: Vec<Validator>) -> ConsensusResult<Self> {
        if validators.is_empty() {
            return Err(ConsensusError::InvalidRoster(
                "At least one validator is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut total_weight: u64 = 0;
        for validator in &validators {
            if validator.weight == 0 {
                return Err(ConsensusError::InvalidRoster(format!(
                    "Validator {} weight must be greater than 0",
                    validator.id
                )));
            }
            if !seen.insert(validator.id.as_str()) {
                return Err(ConsensusError::InvalidRoster(format!(
                    "Duplicate validator id: {}",
                    validator.id
                )));
            }
            total_weight = total_weight.checked_add(validator.weight).ok_or_else(|| {
                ConsensusError::InvalidRoster("Total weight overflows u64".to_string())
            })?;
        }

        Ok(Self {
            validators,
            total_weight,
        })
    }

    /// Build a roster from `(id, weight)` pairs
    pub fn from_pairs<S: Into<String>>(
        pairs: impl IntoIterator<Item = (S, u64)>,
    ) -> ConsensusResult<Self> {
        Self::new(
            pairs
                .into_iter()
                .map(|(id, weight)| Validator::new(id, weight))
                .collect(),
        )
    }

    /// Sum of all validator weights
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Iterate validators in roster order
    pub fn iter(&self) -> std::slice::Iter<'_, Validator> {
        self.validators.iter()
    }

    /// Get total number of validators
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Always false for a constructed roster
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl<'a> IntoIterator for &'a ValidatorRoster {
    type Item = &'a Validator;
    type IntoIter = std::slice::Iter<'a, Validator>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Reference ten-validator roster (total weight 3100)
pub fn reference_roster() -> Vec<Validator> {
    [500, 100, 300, 250, 150, 500, 650, 300, 200, 150]
        .into_iter()
        .enumerate()
        .map(|(i, weight)| Validator::new(format!("validator{}", i), weight))
        .collect()
}
