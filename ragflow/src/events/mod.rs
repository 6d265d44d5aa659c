//! Run events.
//!
//! The executor reports progress to an [`EventSink`] attached to the
//! pipeline. Sinks are observers only: they cannot change the run.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Emitted once before the first component runs.
pub const PIPELINE_STARTED: &str = "pipeline.started";
/// Emitted after the last component ran.
pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
/// Emitted before each component run.
pub const COMPONENT_STARTED: &str = "component.started";
/// Emitted after each successful component run.
pub const COMPONENT_COMPLETED: &str = "component.completed";
/// Emitted when a component fails or exceeds its run bound.
pub const COMPONENT_FAILED: &str = "component.failed";
