//! # Ragflow
//!
//! Component graphs for retrieval-augmented generation and NLP pipelines.
//!
//! Ragflow provides a structured approach to wiring processing steps with
//! support for:
//!
//! - **Typed sockets**: Components declare named, typed inputs and outputs
//! - **Graph validation**: Type, fan-in and cycle checks at connect time
//! - **Deterministic scheduling**: Branches, joins and bounded loops
//! - **Portable documents**: Pipelines round-trip through JSON and YAML
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ragflow::prelude::*;
//!
//! let pipeline = PipelineBuilder::new()
//!     .component("splitter", Arc::new(DocumentSplitter::new(config)?))?
//!     .build();
//!
//! let outputs = pipeline
//!     .run(PipelineInputs::new().with("splitter", "documents", json!([doc])))
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod component;
pub mod components;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::component::{
        Component, ComponentInputs, ComponentOutputs, ComponentRegistry, FnComponent,
        InputSocket, OutputSocket, SocketType,
    };
    pub use crate::components::{
        BackendLoader, DocumentSplitter, DocumentSplitterConfig, FileTypeRouter,
        GenerationTask, LocalTextGenerator, LocalTextGeneratorConfig, SplitBy,
        TextGenerationBackend,
    };
    pub use crate::core::{ByteStream, ComponentState, Document, EdgeKind, Secret};
    pub use crate::errors::{
        ComponentError, ConnectionError, DeserializationError, PipelineError,
        RunawayLoopError, SerializationError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_logging, LogFormat, LoggingConfig};
    pub use crate::pipeline::{
        ConfigFormat, Pipeline, PipelineBuilder, PipelineConfig, PipelineInputs,
        PipelineOutputs, PipelineRunResult, PipelineSettings,
    };
}
