//! Reference components.
//!
//! These are ordinary [`crate::component::Component`] implementations: the
//! pipeline core knows nothing about them beyond their sockets.

mod generator;
mod router;
mod splitter;

pub use generator::{
    BackendLoader, GenerationTask, LocalTextGenerator, LocalTextGeneratorConfig,
    TextGenerationBackend,
};
pub use router::{FileTypeRouter, FileTypeRouterConfig, UNCLASSIFIED};
pub use splitter::{DocumentSplitter, DocumentSplitterConfig, SplitBy};
