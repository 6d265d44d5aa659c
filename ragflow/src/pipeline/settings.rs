//! Pipeline-wide settings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default bound on how often one component may run in a single pipeline run.
pub const DEFAULT_MAX_RUNS_PER_COMPONENT: usize = 100;

fn default_max_runs() -> usize {
    DEFAULT_MAX_RUNS_PER_COMPONENT
}

fn default_true() -> bool {
    true
}

/// Settings carried by a pipeline and its serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Runaway-loop guard.
    #[serde(default = "default_max_runs")]
    pub max_runs_per_component: usize,
    /// Whether `run` warms up every component first.
    #[serde(default = "default_true")]
    pub warm_up_on_run: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            metadata: BTreeMap::new(),
            max_runs_per_component: DEFAULT_MAX_RUNS_PER_COMPONENT,
            warm_up_on_run: true,
        }
    }
}

impl PipelineSettings {
    /// Creates default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the runaway-loop guard.
    #[must_use]
    pub fn with_max_runs_per_component(mut self, max_runs: usize) -> Self {
        self.max_runs_per_component = max_runs;
        self
    }

    /// Enables or disables warm-up at the start of each run.
    #[must_use]
    pub fn with_warm_up_on_run(mut self, enabled: bool) -> Self {
        self.warm_up_on_run = enabled;
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Checks the settings.
    ///
    /// # Errors
    ///
    /// Returns a message if `max_runs_per_component` is zero.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_runs_per_component == 0 {
            return Err("max_runs_per_component must be greater than 0".to_string());
        }
        Ok(())
    }
}
