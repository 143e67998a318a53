//! Experiment registry and label hashing
//!
//! Experiments are configured as a map of experiment name to its allowed
//! group labels. Assignments are stored as plain labels; responses expose
//! only SHA-256 hex digests of both name and group, so the extension never
//! learns the experiment vocabulary.

use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::types::{Result, WaymarkError};

/// SHA-256 hex digest of an experiment or group label
pub fn hash_label(label: &str) -> String {
    hex::encode(Sha256::digest(label.as_bytes()))
}

/// Hash an assignment map for the API edge: name -> group becomes
/// hash(name) -> hash(group)
pub fn hashed_view(assignments: &HashMap<String, String>) -> HashMap<String, String> {
    assignments
        .iter()
        .map(|(name, group)| (hash_label(name), hash_label(group)))
        .collect()
}

/// Configured experiments and their allowed groups
#[derive(Debug, Clone, Default)]
pub struct ExperimentRegistry {
    experiments: HashMap<String, Vec<String>>,
}

impl ExperimentRegistry {
    /// Parse the registry from the EXPERIMENTS config value
    ///
    /// Absent config means no experiments are running.
    pub fn from_config(raw: Option<&str>) -> Result<Self> {
        let experiments = match raw {
            None => HashMap::new(),
            Some(raw) => serde_json::from_str(raw).map_err(|e| {
                WaymarkError::Config(format!("Invalid EXPERIMENTS definition: {}", e))
            })?,
        };
        Ok(Self { experiments })
    }

    /// Whether (experiment, group) is a configured assignment
    pub fn is_valid_assignment(&self, experiment: &str, group: &str) -> bool {
        self.experiments
            .get(experiment)
            .map(|groups| groups.iter().any(|g| g == group))
            .unwrap_or(false)
    }

    /// Number of configured experiments
    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }
}
