//! Prebuilt pipelines and registries for tests and benchmarks.

use std::sync::Arc;

use super::mocks::{
    AddFixedValue, ConstantComponent, Double, EchoComponent, EchoLoader, FailingComponent, FirstOf,
    Hello, RecordingComponent, RecordingMode, SumComponent, Threshold,
};
use crate::component::{Component, ComponentRegistry};
use crate::components::LocalTextGenerator;
use crate::errors::{ConnectionError, DeserializationError};
use crate::pipeline::{Pipeline, PipelineSettings};

fn string_param(params: &serde_json::Value, key: &str, type_name: &str) -> Result<String, DeserializationError> {
    params
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DeserializationError::invalid_parameter(type_name, format!("'{key}' must be a string")))
}

/// A registry with the builtin components, every mock, and a
/// [`LocalTextGenerator`] backed by [`EchoLoader`].
pub fn sample_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::with_builtins();
    registry
        .register(AddFixedValue::TYPE_NAME, |params| {
            Ok(Arc::new(AddFixedValue::from_init_parameters(params)?) as Arc<dyn Component>)
        })
        .register(Threshold::TYPE_NAME, |params| {
            Ok(Arc::new(Threshold::from_init_parameters(params)?) as Arc<dyn Component>)
        })
        .register(Double::TYPE_NAME, |_| Ok(Arc::new(Double) as Arc<dyn Component>))
        .register(Hello::TYPE_NAME, |_| Ok(Arc::new(Hello) as Arc<dyn Component>))
        .register(FirstOf::TYPE_NAME, |_| Ok(Arc::new(FirstOf) as Arc<dyn Component>))
        .register(SumComponent::TYPE_NAME, |_| Ok(Arc::new(SumComponent) as Arc<dyn Component>))
        .register(EchoComponent::TYPE_NAME, |_| Ok(Arc::new(EchoComponent) as Arc<dyn Component>))
        .register(ConstantComponent::TYPE_NAME, |params| {
            let value = params.get("value").cloned().unwrap_or(serde_json::Value::Null);
            Ok(Arc::new(ConstantComponent::new(value)) as Arc<dyn Component>)
        })
        .register(FailingComponent::TYPE_NAME, |params| {
            let message = string_param(params, "message", FailingComponent::TYPE_NAME)?;
            Ok(Arc::new(FailingComponent::new(message)) as Arc<dyn Component>)
        })
        .register(RecordingComponent::TYPE_NAME, |params| {
            let mode = match params.get("mode") {
                None | Some(serde_json::Value::Null) => RecordingMode::default(),
                Some(mode) => serde_json::from_value(mode.clone())
                    .map_err(|e| DeserializationError::invalid_parameter(RecordingComponent::TYPE_NAME, e))?,
            };
            Ok(Arc::new(RecordingComponent::new(mode)) as Arc<dyn Component>)
        });
    LocalTextGenerator::register(&mut registry, Arc::new(EchoLoader));
    registry
}

/// A chain `add_0 -> add_1 -> ... -> add_{len-1}`, each adding one.
///
/// Feed it with `add_0.value`; the result is on `add_{len-1}.result`.
pub fn linear_pipeline(len: usize) -> Result<Pipeline, ConnectionError> {
    let mut pipeline = Pipeline::new();
    for i in 0..len {
        pipeline.add_component(format!("add_{i}"), Arc::new(AddFixedValue::new(1)))?;
        if i > 0 {
            pipeline.connect(&format!("add_{}.result", i - 1), &format!("add_{i}.value"))?;
        }
    }
    Ok(pipeline)
}

/// The counting loop `first_of -> add -> threshold -> first_of`.
///
/// Feed it with `first_of.initial`; the loop exits on `threshold.above` once
/// the running value exceeds `threshold`.
pub fn loop_pipeline(threshold: i64, max_runs_per_component: usize) -> Result<Pipeline, ConnectionError> {
    let settings = PipelineSettings::new().with_max_runs_per_component(max_runs_per_component);
    let mut pipeline = Pipeline::with_settings(settings);
    pipeline.add_component("first_of", Arc::new(FirstOf))?;
    pipeline.add_component("add", Arc::new(AddFixedValue::new(1)))?;
    pipeline.add_component("threshold", Arc::new(Threshold::new(threshold)))?;
    pipeline.connect("first_of.value", "add.value")?;
    pipeline.connect("add.result", "threshold.value")?;
    pipeline.connect("threshold.below", "first_of.feedback")?;
    Ok(pipeline)
}
