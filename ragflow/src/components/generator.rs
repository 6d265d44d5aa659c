//! Text generation with a locally loaded model.
//!
//! The model runtime sits behind two traits: a [`BackendLoader`] that turns
//! pipeline keyword arguments into a loaded [`TextGenerationBackend`], and the
//! backend itself. The component owns configuration, lazy loading and reply
//! post-processing.

use crate::component::{
    Component, ComponentInputs, ComponentOutputs, ComponentRegistry, InputSocket, OutputSocket,
    SocketType,
};
use crate::core::Secret;
use crate::errors::{ComponentError, DeserializationError, SerializationError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "google/flan-t5-base";

/// Environment variable read by the default token.
pub const TOKEN_ENV_VAR: &str = "HF_API_TOKEN";

/// Generation tasks a backend can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenerationTask {
    /// Decoder-only models; the prompt is continued.
    #[serde(rename = "text-generation")]
    TextGeneration,
    /// Encoder-decoder models; the prompt is transformed.
    #[serde(rename = "text2text-generation")]
    Text2TextGeneration,
}

impl GenerationTask {
    /// All supported tasks.
    pub const ALL: [Self; 2] = [Self::TextGeneration, Self::Text2TextGeneration];

    /// The task identifier.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextGeneration => "text-generation",
            Self::Text2TextGeneration => "text2text-generation",
        }
    }

    fn parse(task: &str) -> Result<Self, ComponentError> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == task)
            .ok_or_else(|| unsupported_task(task))
    }
}

impl fmt::Display for GenerationTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn unsupported_task(task: &str) -> ComponentError {
    let supported: Vec<&str> = GenerationTask::ALL.iter().map(|t| t.as_str()).collect();
    ComponentError::configuration(format!(
        "Task '{task}' is not supported. The supported tasks are: {}.",
        supported.join(", ")
    ))
}

/// A loaded text generation model.
#[cfg_attr(test, mockall::automock)]
pub trait TextGenerationBackend: Send + Sync {
    /// Generates replies for `prompt`.
    fn generate(&self, prompt: &str, generation_kwargs: &Map<String, Value>) -> anyhow::Result<Vec<String>>;
}

/// Loads backends from pipeline keyword arguments.
pub trait BackendLoader: Send + Sync + fmt::Debug {
    /// Looks up the task a model is published for.
    fn infer_task(&self, _model: &str) -> Option<GenerationTask> {
        None
    }

    /// Loads a backend. `pipeline_kwargs` always holds `model` and `task`.
    fn load(
        &self,
        pipeline_kwargs: &Map<String, Value>,
        token: Option<&str>,
    ) -> anyhow::Result<Arc<dyn TextGenerationBackend>>;
}

/// Init parameters of [`LocalTextGenerator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalTextGeneratorConfig {
    /// Model name or path.
    #[serde(default = "default_model")]
    pub model: String,
    /// Task to run; inferred when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<GenerationTask>,
    /// Credential for downloading the model.
    #[serde(default = "default_token")]
    pub token: Option<Secret>,
    /// Keyword arguments applied to every generation call.
    #[serde(default)]
    pub generation_kwargs: Map<String, Value>,
    /// Keyword arguments for loading the backend. Override `model`, `task`
    /// and `token` when they repeat them.
    #[serde(default)]
    pub pipeline_kwargs: Map<String, Value>,
    /// Words removed from replies.
    #[serde(default)]
    pub stop_words: Option<Vec<String>>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

#[allow(clippy::unnecessary_wraps)]
fn default_token() -> Option<Secret> {
    Some(Secret::from_env_var(&[TOKEN_ENV_VAR], false))
}

impl Default for LocalTextGeneratorConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            task: None,
            token: default_token(),
            generation_kwargs: Map::new(),
            pipeline_kwargs: Map::new(),
            stop_words: None,
        }
    }
}

impl LocalTextGeneratorConfig {
    /// Creates a config for `model`.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Sets the task.
    #[must_use]
    pub fn with_task(mut self, task: GenerationTask) -> Self {
        self.task = Some(task);
        self
    }

    /// Sets the token.
    #[must_use]
    pub fn with_token(mut self, token: Option<Secret>) -> Self {
        self.token = token;
        self
    }

    /// Adds a generation keyword argument.
    #[must_use]
    pub fn with_generation_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.generation_kwargs.insert(key.into(), value);
        self
    }

    /// Adds a pipeline keyword argument.
    #[must_use]
    pub fn with_pipeline_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.pipeline_kwargs.insert(key.into(), value);
        self
    }

    /// Sets the stop words.
    #[must_use]
    pub fn with_stop_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_words = Some(words.into_iter().map(Into::into).collect());
        self
    }
}

/// Generates text replies from a prompt with a local model.
///
/// The backend is loaded on the first `warm_up` and reused afterwards.
pub struct LocalTextGenerator {
    token: Option<Secret>,
    task: GenerationTask,
    generation_kwargs: Map<String, Value>,
    pipeline_kwargs: Map<String, Value>,
    stop_words: Option<Vec<String>>,
    loader: Arc<dyn BackendLoader>,
    backend: OnceCell<Arc<dyn TextGenerationBackend>>,
}

impl fmt::Debug for LocalTextGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTextGenerator")
            .field("task", &self.task)
            .field("pipeline_kwargs", &self.pipeline_kwargs)
            .field("generation_kwargs", &self.generation_kwargs)
            .field("stop_words", &self.stop_words)
            .field("loader", &self.loader)
            .field("warmed_up", &self.is_warmed_up())
            .finish_non_exhaustive()
    }
}

impl LocalTextGenerator {
    /// Registry identifier.
    pub const TYPE_NAME: &'static str = "ragflow.components.generators.LocalTextGenerator";

    /// Creates a generator.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the task cannot be resolved or is
    /// unsupported, or if both `stop_words` and a `stopping_criteria`
    /// generation argument are given.
    pub fn new(config: LocalTextGeneratorConfig, loader: Arc<dyn BackendLoader>) -> Result<Self, ComponentError> {
        let LocalTextGeneratorConfig {
            model,
            task,
            token,
            mut generation_kwargs,
            mut pipeline_kwargs,
            stop_words,
        } = config;

        pipeline_kwargs
            .entry("model")
            .or_insert_with(|| Value::String(model));

        let task = match task {
            Some(task) => task,
            None => match pipeline_kwargs.get("task") {
                Some(Value::String(task)) => GenerationTask::parse(task)?,
                Some(other) => return Err(unsupported_task(&other.to_string())),
                None => {
                    let model = pipeline_kwargs.get("model").and_then(Value::as_str);
                    model
                        .and_then(|m| loader.infer_task(m))
                        .ok_or_else(|| unsupported_task("None"))?
                }
            },
        };
        pipeline_kwargs.insert("task".to_string(), Value::String(task.as_str().to_string()));

        if task == GenerationTask::TextGeneration {
            generation_kwargs
                .entry("return_full_text")
                .or_insert(Value::Bool(false));
        }

        let has_stop_words = stop_words.as_ref().is_some_and(|w| !w.is_empty());
        if has_stop_words && generation_kwargs.contains_key("stopping_criteria") {
            return Err(ComponentError::configuration(
                "Found both the `stop_words` init parameter and the `stopping_criteria` key in \
                 `generation_kwargs`. Please specify only one of them.",
            ));
        }

        Ok(Self {
            token,
            task,
            generation_kwargs,
            pipeline_kwargs,
            stop_words,
            loader,
            backend: OnceCell::new(),
        })
    }

    /// Rebuilds a generator from serialized init parameters.
    pub fn from_init_parameters(
        params: &Value,
        loader: Arc<dyn BackendLoader>,
    ) -> Result<Self, DeserializationError> {
        let config: LocalTextGeneratorConfig = serde_json::from_value(params.clone())
            .map_err(|e| DeserializationError::invalid_parameter(Self::TYPE_NAME, e))?;
        Self::new(config, loader).map_err(|e| DeserializationError::invalid_parameter(Self::TYPE_NAME, e))
    }

    /// Registers this component type, building instances with `loader`.
    pub fn register(registry: &mut ComponentRegistry, loader: Arc<dyn BackendLoader>) {
        registry.register(Self::TYPE_NAME, move |params| {
            Ok(Arc::new(Self::from_init_parameters(params, Arc::clone(&loader))?) as Arc<dyn Component>)
        });
    }

    /// The resolved task.
    #[must_use]
    pub fn task(&self) -> GenerationTask {
        self.task
    }

    /// Generation arguments applied to every call.
    #[must_use]
    pub fn generation_kwargs(&self) -> &Map<String, Value> {
        &self.generation_kwargs
    }

    /// Arguments handed to the loader.
    #[must_use]
    pub fn pipeline_kwargs(&self) -> &Map<String, Value> {
        &self.pipeline_kwargs
    }

    /// Checks if the backend has been loaded.
    #[must_use]
    pub fn is_warmed_up(&self) -> bool {
        self.backend.initialized()
    }

    fn resolve_token(&self) -> Result<Option<String>, ComponentError> {
        if let Some(Value::String(token)) = self.pipeline_kwargs.get("token") {
            return Ok(Some(token.clone()));
        }
        match &self.token {
            Some(secret) => secret
                .resolve_value()
                .map_err(|e| ComponentError::configuration(e.to_string())),
            None => Ok(None),
        }
    }

    fn strip_stop_words(&self, replies: Vec<String>) -> Vec<String> {
        let Some(stop_words) = self.stop_words.as_ref().filter(|w| !w.is_empty()) else {
            return replies;
        };
        replies
            .into_iter()
            .map(|reply| {
                let stripped = stop_words
                    .iter()
                    .fold(reply, |text, word| text.replace(word.as_str(), ""));
                stripped.trim_end().to_string()
            })
            .collect()
    }
}

#[async_trait]
impl Component for LocalTextGenerator {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn input_sockets(&self) -> Vec<InputSocket> {
        vec![
            InputSocket::new("prompt", SocketType::Str),
            InputSocket::new(
                "generation_kwargs",
                SocketType::optional(SocketType::map(SocketType::Any)),
            )
            .with_default(Value::Null),
        ]
    }

    fn output_sockets(&self) -> Vec<OutputSocket> {
        vec![OutputSocket::new("replies", SocketType::list(SocketType::Str))]
    }

    async fn warm_up(&self) -> Result<(), ComponentError> {
        self.backend
            .get_or_try_init(|| async {
                let token = self.resolve_token()?;
                tracing::info!(
                    model = ?self.pipeline_kwargs.get("model"),
                    task = %self.task,
                    "Loading generation backend"
                );
                self.loader
                    .load(&self.pipeline_kwargs, token.as_deref())
                    .map_err(|e| ComponentError::Backend(format!("{e:#}")))
            })
            .await?;
        Ok(())
    }

    async fn run(&self, inputs: ComponentInputs) -> Result<ComponentOutputs, ComponentError> {
        let backend = self.backend.get().ok_or_else(|| {
            ComponentError::NotWarmedUp(
                "The generation model has not been loaded. Please call warm_up() before running.".to_string(),
            )
        })?;

        let prompt: String = inputs.get("prompt")?;
        if prompt.is_empty() {
            return Ok(ComponentOutputs::from([("replies".to_string(), Value::Array(Vec::new()))]));
        }

        let mut kwargs = self.generation_kwargs.clone();
        if let Some(overrides) = inputs.get_optional::<Map<String, Value>>("generation_kwargs")? {
            kwargs.extend(overrides);
        }

        let replies = backend
            .generate(&prompt, &kwargs)
            .map_err(|e| ComponentError::Backend(format!("{e:#}")))?;
        let replies = self.strip_stop_words(replies);
        tracing::debug!(replies = replies.len(), "Generated replies");

        Ok(ComponentOutputs::from([("replies".to_string(), serde_json::json!(replies))]))
    }

    fn to_dict(&self) -> Result<Value, SerializationError> {
        let mut pipeline_kwargs = self.pipeline_kwargs.clone();
        pipeline_kwargs.remove("token");
        let token = serde_json::to_value(&self.token)
            .map_err(|e| SerializationError::new(Self::TYPE_NAME, e))?;

        Ok(serde_json::json!({
            "pipeline_kwargs": pipeline_kwargs,
            "generation_kwargs": self.generation_kwargs,
            "stop_words": self.stop_words,
            "token": token,
        }))
    }
}
