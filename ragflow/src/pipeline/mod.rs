//! Pipeline graphs, execution and serialization.
//!
//! This module provides:
//! - The component graph and its build-time validation
//! - A fluent builder
//! - The sequential scheduler
//! - JSON/YAML pipeline documents

mod builder;
mod executor;
mod graph;
mod serialization;
mod settings;

#[cfg(test)]
mod integration_tests;

pub use builder::PipelineBuilder;
pub use executor::{PipelineInputs, PipelineOutputs, PipelineRunResult};
pub use graph::{Connection, Pipeline};
pub use serialization::{ComponentConfig, ConfigFormat, ConnectionConfig, PipelineConfig};
pub use settings::{PipelineSettings, DEFAULT_MAX_RUNS_PER_COMPONENT};
