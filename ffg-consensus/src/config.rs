//! Simulation configuration

use crate::roster::{reference_roster, Validator, ValidatorRoster};
use crate::{ConsensusError, ConsensusResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Rounds used when the requested count is missing or non-positive
pub const DEFAULT_ROUNDS: u64 = 10;

/// How the engine numbers each new sibling pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexScheme {
    /// Pair for round `r` is `2(r-1)+1`, `2(r-1)+2`, attached to the last winner
    #[default]
    Height,
    /// Pair under node `n` is `2n+1`, `2n+2`
    Structural,
}

/// Simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Requested voting rounds; non-positive means `DEFAULT_ROUNDS`
    pub max_rounds: i64,
    /// Validator set
    pub validators: Vec<ValidatorConfig>,
    /// Seed for the vote source; drawn at random when absent
    #[serde(default)]
    pub seed: Option<u64>,
    /// Checkpoint numbering scheme
    #[serde(default)]
    pub index_scheme: IndexScheme,
}

/// Validator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Validator identifier
    pub id: String,
    /// Validator weight (deposit)
    pub weight: i64,
}

impl From<&Validator> for ValidatorConfig {
    fn from(validator: &Validator) -> Self {
        Self {
            id: validator.id.clone(),
            weight: i64::try_from(validator.weight).unwrap_or(i64::MAX),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_ROUNDS as i64,
            validators: reference_roster().iter().map(ValidatorConfig::from).collect(),
            seed: None,
            index_scheme: IndexScheme::default(),
        }
    }
}

impl SimulationConfig {
    /// Create a configuration for the given roster
    pub fn new(max_rounds: i64, validators: Vec<ValidatorConfig>) -> Self {
        Self {
            max_rounds,
            validators,
            seed: None,
            index_scheme: IndexScheme::default(),
        }
    }

    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConsensusResult<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ConsensusError::Config(format!("Failed to read config file: {}", e)))?;

        let config: SimulationConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConsensusResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), content)
            .map_err(|e| ConsensusError::Config(format!("Failed to write config file: {}", e)))?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConsensusResult<()> {
        if self.validators.is_empty() {
            return Err(ConsensusError::InvalidRoster(
                "At least one validator is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for (i, validator) in self.validators.iter().enumerate() {
            if validator.id.trim().is_empty() {
                return Err(ConsensusError::InvalidRoster(format!(
                    "Validator {} has an empty id",
                    i
                )));
            }

            if validator.weight <= 0 {
                return Err(ConsensusError::InvalidRoster(format!(
                    "Validator {} weight must be greater than 0, got {}",
                    validator.id, validator.weight
                )));
            }

            if !seen.insert(validator.id.as_str()) {
                return Err(ConsensusError::InvalidRoster(format!(
                    "Duplicate validator id: {}",
                    validator.id
                )));
            }
        }

        Ok(())
    }

    /// Convert to a validator roster
    pub fn to_roster(&self) -> ConsensusResult<ValidatorRoster> {
        self.validate()?;

        let validators = self
            .validators
            .iter()
            .map(|v| {
                let weight = u64::try_from(v.weight).map_err(|_| {
                    ConsensusError::InvalidRoster(format!("Invalid weight for {}", v.id))
                })?;
                Ok(Validator::new(v.id.clone(), weight))
            })
            .collect::<ConsensusResult<Vec<_>>>()?;

        ValidatorRoster::new(validators)
    }

    /// Round count with the non-positive fallback applied
    pub fn effective_rounds(&self) -> u64 {
        effective_rounds(self.max_rounds)
    }

    /// Set the requested round count
    pub fn with_max_rounds(mut self, max_rounds: i64) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Set the vote source seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the index scheme
    pub fn with_index_scheme(mut self, scheme: IndexScheme) -> Self {
        self.index_scheme = scheme;
        self
    }
}

/// Map a requested round count to the number of rounds actually run
pub fn effective_rounds(requested: i64) -> u64 {
    if requested <= 0 {
        DEFAULT_ROUNDS
    } else {
        requested as u64
    }
}
