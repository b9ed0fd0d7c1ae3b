//! Solver configuration.
use thiserror::Error;

use colorcut_macros::{ConfigUpdate, DocDefault};

/// Configurable parameters used during solving.
///
/// The search tunables only affect how often and under which resource limits separation runs,
/// never which cuts are generated for a given relaxation.
#[derive(DocDefault, ConfigUpdate, Clone, Debug)]
pub struct SolverConfig {
    /// Wall-clock time limit in seconds. (Default: 100.0)
    pub time_limit: f64,

    /// Memory limit for open search nodes in megabytes. (Default: 8192.0)
    pub tree_memory: f64,

    /// Number of parallel search workers. (Default: 10)
    pub threads: usize,

    /// Remove fixed variables and the rows they empty before solving relaxations. (Default: true)
    pub presolve: bool,

    /// Maximal number of cuts as a multiple of the model's row count. (Default: 1.0)
    pub cut_limit_factor: f64,

    /// Run the rounding heuristic every this many nodes, 0 disables it. (Default: 1)
    pub heuristic_freq: u64,

    /// Maximal number of separation rounds per search node. (Default: 10)
    pub max_cut_rounds: usize,

    /// Separate clique cuts during the search. (Default: true)
    pub clique_cuts: bool,
}

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("time_limit must be positive, got {0}")]
    TimeLimit(f64),
    #[error("tree_memory must be positive, got {0}")]
    TreeMemory(f64),
    #[error("threads must be at least 1")]
    Threads,
    #[error("cut_limit_factor must not be negative, got {0}")]
    CutLimitFactor(f64),
}

impl SolverConfig {
    /// Check that all values are within their allowed ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Written as negations so that NaN is rejected as well.
        if !(self.time_limit > 0.0) {
            return Err(ConfigError::TimeLimit(self.time_limit));
        }
        if !(self.tree_memory > 0.0) {
            return Err(ConfigError::TreeMemory(self.tree_memory));
        }
        if self.threads == 0 {
            return Err(ConfigError::Threads);
        }
        if !(self.cut_limit_factor >= 0.0) {
            return Err(ConfigError::CutLimitFactor(self.cut_limit_factor));
        }
        Ok(())
    }

    /// Apply an update, leaving the configuration unchanged if the result would be invalid.
    pub fn update(&mut self, update: &SolverConfigUpdate) -> Result<(), ConfigError> {
        let mut updated = self.clone();
        update.apply(&mut updated);
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}
