//! Core domain model types for ragflow.
//!
//! This module contains the fundamental types used throughout the framework:
//! - Component run states and connection kinds
//! - Documents and byte streams flowing through pipelines
//! - Secrets referenced by component configuration

mod document;
mod secret;
mod status;

pub use document::{ByteStream, Document};
pub use secret::{Secret, SecretError};
pub use status::{ComponentState, EdgeKind};
