//! Simulation configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::itf::value_from_json;
use crate::types::{ProgramError, Value};

/// Settings for multi-sample simulation and test runs.
///
/// Deserializes from a TOML or JSON table; every field is optional and
/// falls back to [`SimConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Module to load; the last module in the bundle when absent.
    pub module: Option<String>,
    /// Steps after `init` per sample.
    pub max_steps: usize,
    /// Number of independent samples.
    pub max_samples: usize,
    /// Base seed. Drawn from OS entropy when absent.
    pub seed: Option<u64>,
    /// Invariants to check; empty means every declared invariant.
    pub invariants: Vec<String>,
    /// Also evaluate declared temporal properties on each sample trace.
    pub temporal: bool,
    /// Constant overrides in trace-encoding JSON.
    pub constants: BTreeMap<String, serde_json::Value>,
    /// Bound on choice sequences replayed by successor enumeration.
    pub max_successors: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            module: None,
            max_steps: 20,
            max_samples: 100,
            seed: None,
            invariants: Vec::new(),
            temporal: false,
            constants: BTreeMap::new(),
            max_successors: 10_000,
        }
    }
}

impl SimConfig {
    /// The configured seed, or a fresh random one.
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }

    /// Decode the constant overrides.
    pub fn constant_values(&self) -> Result<BTreeMap<String, Value>, ProgramError> {
        self.constants
            .iter()
            .map(|(name, json)| {
                let value = value_from_json(json).map_err(|source| ProgramError::Override {
                    name: name.clone(),
                    source,
                })?;
                Ok((name.clone(), value))
            })
            .collect()
    }
}
