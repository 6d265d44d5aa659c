//! Fluent pipeline construction.

use super::graph::Pipeline;
use super::settings::PipelineSettings;
use crate::component::Component;
use crate::errors::ConnectionError;
use crate::events::EventSink;
use std::sync::Arc;

/// Builder that validates every step as it goes.
///
/// ```ignore
/// let pipeline = PipelineBuilder::new()
///     .component("splitter", Arc::new(splitter))?
///     .component("router", Arc::new(router))?
///     .connect("router.text/plain", "splitter.documents")?
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    pipeline: Pipeline,
    last_component: Option<String>,
}

impl PipelineBuilder {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the settings.
    #[must_use]
    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        *self.pipeline.settings_mut() = settings;
        self
    }

    /// Sets the runaway-loop guard.
    #[must_use]
    pub fn max_runs_per_component(mut self, max_runs: usize) -> Self {
        self.pipeline.settings_mut().max_runs_per_component = max_runs;
        self
    }

    /// Sets the sink receiving run events.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.pipeline.set_event_sink(sink);
        self
    }

    /// Adds a component.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::add_component`].
    pub fn component(
        mut self,
        name: impl Into<String>,
        instance: Arc<dyn Component>,
    ) -> Result<Self, ConnectionError> {
        let name = name.into();
        self.pipeline.add_component(name.clone(), instance)?;
        self.last_component = Some(name);
        Ok(self)
    }

    /// Adds a component and connects the previously added one to it,
    /// inferring the socket pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the component cannot be added or no single
    /// compatible socket pair exists.
    pub fn then(self, name: impl Into<String>, instance: Arc<dyn Component>) -> Result<Self, ConnectionError> {
        let name = name.into();
        let previous = self.last_component.clone();
        let mut builder = self.component(name.clone(), instance)?;
        if let Some(previous) = previous {
            builder.pipeline.connect(&previous, &name)?;
        }
        Ok(builder)
    }

    /// Connects two sockets.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::connect`].
    pub fn connect(mut self, sender: &str, receiver: &str) -> Result<Self, ConnectionError> {
        self.pipeline.connect(sender, receiver)?;
        Ok(self)
    }

    /// Returns the finished pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        self.pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineInputs;
    use crate::testing::mocks::{AddFixedValue, Double};
    use serde_json::json;

    #[tokio::test]
    async fn test_then_chains_components() {
        let pipeline = PipelineBuilder::new()
            .component("double", Arc::new(Double))
            .unwrap()
            .then("again", Arc::new(Double))
            .unwrap()
            .build();

        assert_eq!(pipeline.connections().len(), 1);
        let outputs = pipeline
            .run(PipelineInputs::new().with("double", "value", json!(3)))
            .await
            .unwrap();
        assert_eq!(outputs["again"]["value"], json!(12));
    }

    #[test]
    fn test_errors_surface_from_each_step() {
        let result = PipelineBuilder::new()
            .component("a", Arc::new(AddFixedValue::new(1)))
            .unwrap()
            .connect("a.result", "missing.value");
        assert!(result.is_err());

        let result = PipelineBuilder::new()
            .component("a", Arc::new(Double))
            .unwrap()
            .then("b", Arc::new(AddFixedValue::new(1)));
        // Double.value fits both AddFixedValue inputs.
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_applied() {
        let pipeline = PipelineBuilder::new().max_runs_per_component(7).build();
        assert_eq!(pipeline.settings().max_runs_per_component, 7);
    }
}
