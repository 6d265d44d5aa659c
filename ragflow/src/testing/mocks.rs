//! Small components for exercising pipelines.
//!
//! Each mock has a `TYPE_NAME` and registers in [`super::sample_registry`],
//! so pipelines built from them round-trip through documents.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::component::{Component, ComponentInputs, ComponentOutputs, InputSocket, OutputSocket, SocketType};
use crate::components::{BackendLoader, GenerationTask, TextGenerationBackend};
use crate::errors::{ComponentError, DeserializationError, SerializationError};

fn single(socket: &str, value: Value) -> ComponentOutputs {
    ComponentOutputs::from([(socket.to_string(), value)])
}

fn int_param(params: &Value, key: &str, type_name: &str, default: i64) -> Result<i64, DeserializationError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_i64()
            .ok_or_else(|| DeserializationError::invalid_parameter(type_name, format!("'{key}' must be an integer"))),
    }
}

/// Emits a fixed value on `value`.
#[derive(Debug, Clone)]
pub struct ConstantComponent {
    value: Value,
}

impl ConstantComponent {
    /// Registry identifier.
    pub const TYPE_NAME: &'static str = "ragflow.testing.Constant";

    /// Creates a constant source.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

#[async_trait]
impl Component for ConstantComponent {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn input_sockets(&self) -> Vec<InputSocket> {
        Vec::new()
    }

    fn output_sockets(&self) -> Vec<OutputSocket> {
        vec![OutputSocket::new("value", SocketType::Any)]
    }

    async fn run(&self, _inputs: ComponentInputs) -> Result<ComponentOutputs, ComponentError> {
        Ok(single("value", self.value.clone()))
    }

    fn to_dict(&self) -> Result<Value, SerializationError> {
        Ok(json!({"value": self.value}))
    }
}

/// Returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoComponent;

impl EchoComponent {
    /// Registry identifier.
    pub const TYPE_NAME: &'static str = "ragflow.testing.Echo";
}

#[async_trait]
impl Component for EchoComponent {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn input_sockets(&self) -> Vec<InputSocket> {
        vec![InputSocket::new("value", SocketType::Any)]
    }

    fn output_sockets(&self) -> Vec<OutputSocket> {
        vec![OutputSocket::new("value", SocketType::Any)]
    }

    async fn run(&self, inputs: ComponentInputs) -> Result<ComponentOutputs, ComponentError> {
        let value: Value = inputs.get("value")?;
        Ok(single("value", value))
    }
}

/// Adds a number to `value`; the optional `add` input overrides the
/// configured amount.
#[derive(Debug, Clone, Copy)]
pub struct AddFixedValue {
    add: i64,
}

impl AddFixedValue {
    /// Registry identifier.
    pub const TYPE_NAME: &'static str = "ragflow.testing.AddFixedValue";

    /// Creates an adder.
    #[must_use]
    pub fn new(add: i64) -> Self {
        Self { add }
    }

    /// Rebuilds from init parameters; `add` defaults to 1.
    pub fn from_init_parameters(params: &Value) -> Result<Self, DeserializationError> {
        Ok(Self::new(int_param(params, "add", Self::TYPE_NAME, 1)?))
    }
}

#[async_trait]
impl Component for AddFixedValue {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn input_sockets(&self) -> Vec<InputSocket> {
        vec![
            InputSocket::new("value", SocketType::Int),
            InputSocket::new("add", SocketType::optional(SocketType::Int)).with_default(Value::Null),
        ]
    }

    fn output_sockets(&self) -> Vec<OutputSocket> {
        vec![OutputSocket::new("result", SocketType::Int)]
    }

    async fn run(&self, inputs: ComponentInputs) -> Result<ComponentOutputs, ComponentError> {
        let value: i64 = inputs.get("value")?;
        let add = inputs.get_optional::<i64>("add")?.unwrap_or(self.add);
        Ok(single("result", json!(value + add)))
    }

    fn to_dict(&self) -> Result<Value, SerializationError> {
        Ok(json!({"add": self.add}))
    }
}

/// Doubles `value`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Double;

impl Double {
    /// Registry identifier.
    pub const TYPE_NAME: &'static str = "ragflow.testing.Double";
}

#[async_trait]
impl Component for Double {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn input_sockets(&self) -> Vec<InputSocket> {
        vec![InputSocket::new("value", SocketType::Int)]
    }

    fn output_sockets(&self) -> Vec<OutputSocket> {
        vec![OutputSocket::new("value", SocketType::Int)]
    }

    async fn run(&self, inputs: ComponentInputs) -> Result<ComponentOutputs, ComponentError> {
        let value: i64 = inputs.get("value")?;
        Ok(single("value", json!(value * 2)))
    }
}

/// Sums every value received on the variadic `values` input.
#[derive(Debug, Clone, Copy, Default)]
pub struct SumComponent;

impl SumComponent {
    /// Registry identifier.
    pub const TYPE_NAME: &'static str = "ragflow.testing.Sum";
}

#[async_trait]
impl Component for SumComponent {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn input_sockets(&self) -> Vec<InputSocket> {
        vec![InputSocket::new("values", SocketType::Int).variadic()]
    }

    fn output_sockets(&self) -> Vec<OutputSocket> {
        vec![OutputSocket::new("total", SocketType::Int)]
    }

    async fn run(&self, inputs: ComponentInputs) -> Result<ComponentOutputs, ComponentError> {
        let values: Vec<i64> = inputs.get("values")?;
        Ok(single("total", json!(values.iter().sum::<i64>())))
    }
}

/// Routes `value` to `above` when it exceeds the threshold, else to `below`.
#[derive(Debug, Clone, Copy)]
pub struct Threshold {
    threshold: i64,
}

impl Threshold {
    /// Registry identifier.
    pub const TYPE_NAME: &'static str = "ragflow.testing.Threshold";

    /// Creates a router.
    #[must_use]
    pub fn new(threshold: i64) -> Self {
        Self { threshold }
    }

    /// Rebuilds from init parameters; `threshold` defaults to 10.
    pub fn from_init_parameters(params: &Value) -> Result<Self, DeserializationError> {
        Ok(Self::new(int_param(params, "threshold", Self::TYPE_NAME, 10)?))
    }
}

#[async_trait]
impl Component for Threshold {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn input_sockets(&self) -> Vec<InputSocket> {
        vec![
            InputSocket::new("value", SocketType::Int),
            InputSocket::new("threshold", SocketType::optional(SocketType::Int)).with_default(Value::Null),
        ]
    }

    fn output_sockets(&self) -> Vec<OutputSocket> {
        vec![
            OutputSocket::new("above", SocketType::Int),
            OutputSocket::new("below", SocketType::Int),
        ]
    }

    async fn run(&self, inputs: ComponentInputs) -> Result<ComponentOutputs, ComponentError> {
        let value: i64 = inputs.get("value")?;
        let threshold = inputs.get_optional::<i64>("threshold")?.unwrap_or(self.threshold);
        let socket = if value > threshold { "above" } else { "below" };
        Ok(single(socket, json!(value)))
    }

    fn to_dict(&self) -> Result<Value, SerializationError> {
        Ok(json!({"threshold": self.threshold}))
    }
}

/// Greets `name`, which defaults to `"world"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hello;

impl Hello {
    /// Registry identifier.
    pub const TYPE_NAME: &'static str = "ragflow.testing.Hello";
}

#[async_trait]
impl Component for Hello {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn input_sockets(&self) -> Vec<InputSocket> {
        vec![InputSocket::new("name", SocketType::Str).with_default(json!("world"))]
    }

    fn output_sockets(&self) -> Vec<OutputSocket> {
        vec![OutputSocket::new("greeting", SocketType::Str)]
    }

    async fn run(&self, inputs: ComponentInputs) -> Result<ComponentOutputs, ComponentError> {
        let name = inputs.get_optional::<String>("name")?.unwrap_or_else(|| "world".to_string());
        Ok(single("greeting", json!(format!("Hello, {name}!"))))
    }
}

/// Loop entry: forwards `feedback` when present, else `initial`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstOf;

impl FirstOf {
    /// Registry identifier.
    pub const TYPE_NAME: &'static str = "ragflow.testing.FirstOf";
}

#[async_trait]
impl Component for FirstOf {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn input_sockets(&self) -> Vec<InputSocket> {
        vec![
            InputSocket::new("initial", SocketType::optional(SocketType::Int)).with_default(Value::Null),
            InputSocket::new("feedback", SocketType::optional(SocketType::Int)).with_default(Value::Null),
        ]
    }

    fn output_sockets(&self) -> Vec<OutputSocket> {
        vec![OutputSocket::new("value", SocketType::Int)]
    }

    async fn run(&self, inputs: ComponentInputs) -> Result<ComponentOutputs, ComponentError> {
        let feedback = inputs.get_optional::<i64>("feedback")?;
        let initial = inputs.get_optional::<i64>("initial")?;
        Ok(feedback
            .or(initial)
            .map(|value| single("value", json!(value)))
            .unwrap_or_default())
    }
}

/// Fails on every run.
#[derive(Debug, Clone)]
pub struct FailingComponent {
    message: String,
}

impl FailingComponent {
    /// Registry identifier.
    pub const TYPE_NAME: &'static str = "ragflow.testing.Failing";

    /// Creates a component failing with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Component for FailingComponent {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn input_sockets(&self) -> Vec<InputSocket> {
        vec![InputSocket::new("value", SocketType::Any)]
    }

    fn output_sockets(&self) -> Vec<OutputSocket> {
        vec![OutputSocket::new("value", SocketType::Any)]
    }

    async fn run(&self, _inputs: ComponentInputs) -> Result<ComponentOutputs, ComponentError> {
        Err(ComponentError::Backend(self.message.clone()))
    }

    fn to_dict(&self) -> Result<Value, SerializationError> {
        Ok(json!({"message": self.message}))
    }
}

/// Input shape of a [`RecordingComponent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordingMode {
    /// Single `value` input, forwarded to the `value` output.
    #[default]
    Passthrough,
    /// Variadic `values` input, forwarded as a list to the `values` output.
    Variadic,
    /// Greedy `values` input defaulting to `[]`; the first value is
    /// forwarded to the `value` output.
    Greedy,
}

/// Passes its input through and records every input set it was run with.
#[derive(Debug)]
pub struct RecordingComponent {
    mode: RecordingMode,
    calls: Mutex<Vec<ComponentInputs>>,
}

impl RecordingComponent {
    /// Registry identifier.
    pub const TYPE_NAME: &'static str = "ragflow.testing.Recording";

    /// Creates a recorder with the given input shape.
    #[must_use]
    pub fn new(mode: RecordingMode) -> Self {
        Self {
            mode,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// See [`RecordingMode::Passthrough`].
    #[must_use]
    pub fn passthrough() -> Self {
        Self::new(RecordingMode::Passthrough)
    }

    /// See [`RecordingMode::Variadic`].
    #[must_use]
    pub fn variadic() -> Self {
        Self::new(RecordingMode::Variadic)
    }

    /// See [`RecordingMode::Greedy`].
    #[must_use]
    pub fn greedy() -> Self {
        Self::new(RecordingMode::Greedy)
    }

    /// Inputs of every run so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ComponentInputs> {
        self.calls.lock().clone()
    }

    /// Number of runs so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn input_name(&self) -> &'static str {
        match self.mode {
            RecordingMode::Passthrough => "value",
            RecordingMode::Variadic | RecordingMode::Greedy => "values",
        }
    }

    fn output_name(&self) -> &'static str {
        match self.mode {
            RecordingMode::Passthrough | RecordingMode::Greedy => "value",
            RecordingMode::Variadic => "values",
        }
    }
}

#[async_trait]
impl Component for RecordingComponent {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn input_sockets(&self) -> Vec<InputSocket> {
        let socket = InputSocket::new(self.input_name(), SocketType::Any);
        vec![match self.mode {
            RecordingMode::Passthrough => socket,
            RecordingMode::Variadic => socket.variadic(),
            RecordingMode::Greedy => socket.greedy().with_default(json!([])),
        }]
    }

    fn output_sockets(&self) -> Vec<OutputSocket> {
        vec![OutputSocket::new(self.output_name(), SocketType::Any)]
    }

    async fn run(&self, inputs: ComponentInputs) -> Result<ComponentOutputs, ComponentError> {
        let value: Value = inputs.get(self.input_name())?;
        self.calls.lock().push(inputs);
        if self.mode == RecordingMode::Greedy {
            let first = value.as_array().and_then(|values| values.first()).cloned();
            return Ok(first.map(|v| single("value", v)).unwrap_or_default());
        }
        Ok(single(self.output_name(), value))
    }

    fn to_dict(&self) -> Result<Value, SerializationError> {
        Ok(json!({"mode": self.mode}))
    }
}

/// Backend replying `"<prompt> (echo)"`, once per requested return sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoBackend;

impl TextGenerationBackend for EchoBackend {
    fn generate(&self, prompt: &str, generation_kwargs: &Map<String, Value>) -> anyhow::Result<Vec<String>> {
        let count = generation_kwargs
            .get("num_return_sequences")
            .and_then(Value::as_u64)
            .unwrap_or(1);
        Ok((0..count).map(|_| format!("{prompt} (echo)")).collect())
    }
}

/// Loader handing out [`EchoBackend`]s. Infers text2text-generation for
/// every model.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoLoader;

impl BackendLoader for EchoLoader {
    fn infer_task(&self, _model: &str) -> Option<GenerationTask> {
        Some(GenerationTask::Text2TextGeneration)
    }

    fn load(
        &self,
        _pipeline_kwargs: &Map<String, Value>,
        _token: Option<&str>,
    ) -> anyhow::Result<Arc<dyn TextGenerationBackend>> {
        Ok(Arc::new(EchoBackend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_fixed_value_override() {
        let add = AddFixedValue::new(2);
        let inputs = ComponentInputs::new().with("value", json!(1)).with("add", Value::Null);
        assert_eq!(add.run(inputs).await.unwrap()["result"], json!(3));

        let inputs = ComponentInputs::new().with("value", json!(1)).with("add", json!(10));
        assert_eq!(add.run(inputs).await.unwrap()["result"], json!(11));
    }

    #[tokio::test]
    async fn test_threshold_routes_one_way() {
        let threshold = Threshold::new(5);
        let outputs = threshold
            .run(ComponentInputs::new().with("value", json!(5)))
            .await
            .unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs["below"], json!(5));
    }

    #[tokio::test]
    async fn test_first_of_prefers_feedback() {
        let inputs = ComponentInputs::new()
            .with("initial", json!(1))
            .with("feedback", json!(7));
        assert_eq!(FirstOf.run(inputs).await.unwrap()["value"], json!(7));

        let inputs = ComponentInputs::new()
            .with("initial", Value::Null)
            .with("feedback", Value::Null);
        assert!(FirstOf.run(inputs).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_greedy_recorder_forwards_first_value() {
        let recorder = RecordingComponent::greedy();
        assert!(recorder.input_sockets()[0].is_greedy());
        assert!(!recorder.input_sockets()[0].is_mandatory());

        let outputs = recorder
            .run(ComponentInputs::new().with("values", json!([4, 5])))
            .await
            .unwrap();
        assert_eq!(outputs["value"], json!(4));

        let outputs = recorder
            .run(ComponentInputs::new().with("values", json!([])))
            .await
            .unwrap();
        assert!(outputs.is_empty());
        assert_eq!(recorder.call_count(), 2);
    }

    #[test]
    fn test_echo_backend() {
        let mut kwargs = Map::new();
        kwargs.insert("num_return_sequences".to_string(), json!(2));
        let replies = EchoBackend.generate("hi", &kwargs).unwrap();
        assert_eq!(replies, vec!["hi (echo)", "hi (echo)"]);
    }

    #[test]
    fn test_int_params() {
        assert_eq!(AddFixedValue::from_init_parameters(&json!({})).unwrap().add, 1);
        assert!(Threshold::from_init_parameters(&json!({"threshold": "high"})).is_err());
    }
}
