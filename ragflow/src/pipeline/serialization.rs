//! Pipeline documents.
//!
//! A pipeline serializes to a [`PipelineConfig`]: settings, each component's
//! registered type identifier and init parameters in registration order, and
//! the connection list in insertion order. Restoring replays every
//! connection through [`Pipeline::connect`], so a restored graph passes the
//! same validation as a hand-built one.

use super::graph::Pipeline;
use super::settings::{PipelineSettings, DEFAULT_MAX_RUNS_PER_COMPONENT};
use crate::component::ComponentRegistry;
use crate::errors::{DeserializationError, PipelineError, SerializationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConfigFormat {
    /// JSON.
    #[default]
    Json,
    /// YAML.
    Yaml,
}

impl ConfigFormat {
    /// Determines the format from a file extension. Anything but
    /// `yaml`/`yml` is read as JSON.
    #[must_use]
    pub fn from_extension(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

/// A serialized component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Registry identifier.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Constructor parameters.
    #[serde(default = "empty_object")]
    pub init_parameters: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// A serialized connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// `"component.socket"` of the sender.
    pub sender: String,
    /// `"component.socket"` of the receiver.
    pub receiver: String,
}

/// The serialized form of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    /// Runaway-loop guard.
    #[serde(default = "default_max_runs")]
    pub max_runs_per_component: usize,
    /// Whether `run` warms up components first.
    #[serde(default = "default_true")]
    pub warm_up_on_run: bool,
    /// Components by name, in registration order.
    #[serde(default, with = "ordered_components")]
    pub components: Vec<(String, ComponentConfig)>,
    /// Connections in insertion order.
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

fn default_max_runs() -> usize {
    DEFAULT_MAX_RUNS_PER_COMPONENT
}

fn default_true() -> bool {
    true
}

impl PipelineConfig {
    /// The settings carried by the document.
    #[must_use]
    pub fn settings(&self) -> PipelineSettings {
        PipelineSettings {
            metadata: self.metadata.clone(),
            max_runs_per_component: self.max_runs_per_component,
            warm_up_on_run: self.warm_up_on_run,
        }
    }

    /// Parses a document.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` if the text does not match the document schema.
    pub fn parse(text: &str, format: ConfigFormat) -> Result<Self, DeserializationError> {
        let config = match format {
            ConfigFormat::Json => serde_json::from_str(text)?,
            ConfigFormat::Yaml => serde_yaml::from_str(text)?,
        };
        Ok(config)
    }

    /// Renders the document.
    ///
    /// # Errors
    ///
    /// Returns an error if an init parameter cannot be represented.
    pub fn render(&self, format: ConfigFormat) -> Result<String, SerializationError> {
        match format {
            ConfigFormat::Json => {
                serde_json::to_string_pretty(self).map_err(|e| SerializationError::new("pipeline", e))
            }
            ConfigFormat::Yaml => serde_yaml::to_string(self).map_err(|e| SerializationError::new("pipeline", e)),
        }
    }
}

/// Serializes `(name, component)` pairs as a map, keeping their order.
mod ordered_components {
    use super::ComponentConfig;
    use serde::de::{MapAccess, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(
        components: &[(String, ComponentConfig)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(components.iter().map(|(name, config)| (name, config)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(String, ComponentConfig)>, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = Vec<(String, ComponentConfig)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of component names to component definitions")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut components = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, ComponentConfig>()? {
                    components.push(entry);
                }
                Ok(components)
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

impl Pipeline {
    /// Captures the pipeline as a document.
    ///
    /// # Errors
    ///
    /// Returns an error if a component cannot serialize its init
    /// parameters, for example because it holds a literal token.
    pub fn to_dict(&self) -> Result<PipelineConfig, SerializationError> {
        let components = self
            .nodes
            .iter()
            .map(|node| {
                let init_parameters = node.instance.to_dict().map_err(|e| {
                    SerializationError::new(format!("component '{}'", node.name), e.message)
                })?;
                Ok((
                    node.name.clone(),
                    ComponentConfig {
                        type_name: node.instance.type_name().to_string(),
                        init_parameters,
                    },
                ))
            })
            .collect::<Result<Vec<_>, SerializationError>>()?;

        let connections = self
            .connections
            .iter()
            .map(|c| ConnectionConfig {
                sender: c.sender_path(),
                receiver: c.receiver_path(),
            })
            .collect();

        Ok(PipelineConfig {
            metadata: self.settings.metadata.clone(),
            max_runs_per_component: self.settings.max_runs_per_component,
            warm_up_on_run: self.settings.warm_up_on_run,
            components,
            connections,
        })
    }

    /// Rebuilds a pipeline from a document.
    ///
    /// # Errors
    ///
    /// Returns a deserialization error for invalid settings, unknown types or
    /// bad init parameters, and a connection error if a replayed connection
    /// is rejected.
    pub fn from_dict(config: &PipelineConfig, registry: &ComponentRegistry) -> Result<Self, PipelineError> {
        let settings = config.settings();
        settings.validate().map_err(DeserializationError::Malformed)?;

        let mut pipeline = Self::with_settings(settings);
        for (name, component) in &config.components {
            let instance = registry.create(name, &component.type_name, &component.init_parameters)?;
            pipeline.add_component(name.clone(), instance)?;
        }
        for connection in &config.connections {
            pipeline.connect(&connection.sender, &connection.receiver)?;
        }

        debug!(
            components = pipeline.len(),
            connections = pipeline.connections().len(),
            "Restored pipeline"
        );
        Ok(pipeline)
    }

    /// Serializes the pipeline to text.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::to_dict`].
    pub fn dumps(&self, format: ConfigFormat) -> Result<String, PipelineError> {
        Ok(self.to_dict()?.render(format)?)
    }

    /// Restores a pipeline from text.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::from_dict`].
    pub fn loads(text: &str, format: ConfigFormat, registry: &ComponentRegistry) -> Result<Self, PipelineError> {
        let config = PipelineConfig::parse(text, format)?;
        Self::from_dict(&config, registry)
    }

    /// Writes the pipeline to `path`; the extension picks the format.
    ///
    /// # Errors
    ///
    /// Returns serialization or IO errors.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        let path = path.as_ref();
        let text = self.dumps(ConfigFormat::from_extension(path))?;
        std::fs::write(path, text)?;
        info!(path = %path.display(), "Saved pipeline");
        Ok(())
    }

    /// Reads a pipeline from `path`; the extension picks the format.
    ///
    /// # Errors
    ///
    /// Returns IO or deserialization errors.
    pub fn load(path: impl AsRef<Path>, registry: &ComponentRegistry) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let pipeline = Self::loads(&text, ConfigFormat::from_extension(path), registry)?;
        info!(path = %path.display(), components = pipeline.len(), "Loaded pipeline");
        Ok(pipeline)
    }
}
