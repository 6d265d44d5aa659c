//! Testing utilities for ragflow pipelines.
//!
//! This module provides:
//! - Mock components and a mock text generation backend
//! - Assertions over pipeline outputs
//! - Ready-made pipelines and a registry that knows every mock

pub mod assertions;
pub mod fixtures;
pub mod mocks;

pub use assertions::{assert_component_absent, assert_output, assert_output_len, assert_socket_absent};
pub use fixtures::{linear_pipeline, loop_pipeline, sample_registry};
pub use mocks::{
    AddFixedValue, ConstantComponent, Double, EchoBackend, EchoComponent, EchoLoader,
    FailingComponent, FirstOf, Hello, RecordingComponent, RecordingMode, SumComponent, Threshold,
};
