//! The component contract.
//!
//! Components are the nodes of a pipeline graph. Each one declares typed
//! input and output sockets, runs on a map of named inputs and returns a map
//! of named outputs.

mod inputs;
mod registry;
mod sockets;

pub use inputs::ComponentInputs;
pub use registry::{ComponentConstructor, ComponentRegistry};
pub use sockets::{InputKind, InputSocket, OutputSocket, SocketType};

use crate::errors::{ComponentError, SerializationError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;

/// Named output values of one component execution.
pub type ComponentOutputs = HashMap<String, serde_json::Value>;

/// Trait for pipeline components.
///
/// A component may leave out any declared output from its result; receivers
/// of the missing output simply do not get a value. Returning an output that
/// was not declared is a contract violation.
#[async_trait]
pub trait Component: Send + Sync + Debug {
    /// The registry identifier used when serializing this component.
    fn type_name(&self) -> &str;

    /// Declared input sockets.
    fn input_sockets(&self) -> Vec<InputSocket>;

    /// Declared output sockets.
    fn output_sockets(&self) -> Vec<OutputSocket>;

    /// Acquires heavy resources such as model handles.
    ///
    /// Called before every pipeline run, so it must be idempotent.
    async fn warm_up(&self) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Executes the component.
    async fn run(&self, inputs: ComponentInputs) -> Result<ComponentOutputs, ComponentError>;

    /// Returns the init parameters needed to rebuild this component.
    fn to_dict(&self) -> Result<serde_json::Value, SerializationError> {
        Ok(serde_json::json!({}))
    }
}

type ComponentFn = dyn Fn(ComponentInputs) -> Result<ComponentOutputs, ComponentError> + Send + Sync;

/// A closure-backed component.
///
/// Handy for glue code and tests. Its init parameters are empty, so it only
/// round-trips through a registry that knows how to rebuild the closure.
pub struct FnComponent {
    type_name: String,
    inputs: Vec<InputSocket>,
    outputs: Vec<OutputSocket>,
    func: Box<ComponentFn>,
}

impl FnComponent {
    /// Creates a new function-based component.
    pub fn new<F>(
        type_name: impl Into<String>,
        inputs: Vec<InputSocket>,
        outputs: Vec<OutputSocket>,
        func: F,
    ) -> Self
    where
        F: Fn(ComponentInputs) -> Result<ComponentOutputs, ComponentError> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.into(),
            inputs,
            outputs,
            func: Box::new(func),
        }
    }
}

impl Debug for FnComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnComponent")
            .field("type_name", &self.type_name)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .finish()
    }
}

#[async_trait]
impl Component for FnComponent {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn input_sockets(&self) -> Vec<InputSocket> {
        self.inputs.clone()
    }

    fn output_sockets(&self) -> Vec<OutputSocket> {
        self.outputs.clone()
    }

    async fn run(&self, inputs: ComponentInputs) -> Result<ComponentOutputs, ComponentError> {
        (self.func)(inputs)
    }
}
