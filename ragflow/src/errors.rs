//! Error types for the ragflow framework.
//!
//! Errors fall into four families: build errors raised while assembling a
//! graph ([`ConnectionError`]), deserialization errors raised while restoring
//! one ([`DeserializationError`]), component errors raised while running one
//! ([`ComponentError`]) and the runaway-loop guard ([`RunawayLoopError`]).
//! [`PipelineError`] wraps all of them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The graph could not be built.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// A serialized pipeline could not be restored.
    #[error("{0}")]
    Deserialization(#[from] DeserializationError),

    /// A pipeline could not be serialized.
    #[error("{0}")]
    Serialization(#[from] SerializationError),

    /// A component failed while running.
    #[error("Component '{component}' failed: {source}")]
    ComponentFailed {
        /// Name of the failing component.
        component: String,
        /// The underlying component error.
        #[source]
        source: ComponentError,
    },

    /// A loop exceeded its iteration bound.
    #[error("{0}")]
    RunawayLoop(#[from] RunawayLoopError),

    /// The inputs passed to `run` do not match the graph.
    #[error("Invalid pipeline input for '{component}': {message}")]
    InvalidInput {
        /// The component the input was addressed to.
        component: String,
        /// What was wrong with it.
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Creates an invalid input error.
    #[must_use]
    pub fn invalid_input(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Structured diagnostics attached to a [`ConnectionError`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConnectionErrorInfo {
    /// Error code (e.g., "PIPELINE-004-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ConnectionErrorInfo {
    /// Creates a new diagnostic record.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::Value::String(self.code.clone()));
        map.insert("summary".to_string(), serde_json::Value::String(self.summary.clone()));

        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::Value::String(hint.clone()));
        }
        if !self.context.is_empty() {
            let context_map: serde_json::Map<String, serde_json::Value> = self
                .context
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            map.insert("context".to_string(), serde_json::Value::Object(context_map));
        }

        map
    }
}

/// Error raised while adding components or connecting sockets.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConnectionError {
    /// The error message.
    pub message: String,
    /// The components involved in the error.
    pub components: Vec<String>,
    /// Diagnostic info.
    pub error_info: Option<ConnectionErrorInfo>,
}

impl ConnectionError {
    /// Creates a new connection error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            components: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the components involved.
    #[must_use]
    pub fn with_components(mut self, components: Vec<String>) -> Self {
        self.components = components;
        self
    }

    /// Sets the diagnostic record.
    #[must_use]
    pub fn with_error_info(mut self, info: ConnectionErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the diagnostic code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }

    /// How to fix the error: the specific hint when there is one, else the
    /// general advice for its code.
    #[must_use]
    pub fn suggestion(&self) -> Option<&str> {
        let info = self.error_info.as_ref()?;
        info.fix_hint
            .as_deref()
            .or_else(|| ConnectionSuggestions::get(&info.code))
    }

    /// A component name was used twice.
    #[must_use]
    pub fn duplicate_component(name: &str) -> Self {
        Self::new(format!("A component named '{name}' already exists in this pipeline"))
            .with_components(vec![name.to_string()])
            .with_error_info(
                ConnectionErrorInfo::new(
                    "PIPELINE-005-DUPLICATE_COMPONENT",
                    format!("Component name '{name}' is not unique"),
                )
                .with_fix_hint("Pick a different name for the second instance."),
            )
    }

    /// A component name cannot be used as a graph node name.
    #[must_use]
    pub fn invalid_component_name(name: &str, reason: &str) -> Self {
        Self::new(format!("Invalid component name '{name}': {reason}"))
            .with_components(vec![name.to_string()])
            .with_error_info(ConnectionErrorInfo::new(
                "PIPELINE-005-INVALID_NAME",
                format!("Component name '{name}' is not allowed"),
            ))
    }

    /// A connection referenced a component that was never added.
    #[must_use]
    pub fn unknown_component(name: &str, available: &[String]) -> Self {
        Self::new(format!(
            "Component '{name}' not found in the pipeline. Available components: {}",
            available.join(", ")
        ))
        .with_components(vec![name.to_string()])
        .with_error_info(
            ConnectionErrorInfo::new(
                "PIPELINE-001-UNKNOWN_COMPONENT",
                format!("Component '{name}' does not exist"),
            )
            .with_fix_hint("Add the component with add_component before connecting it."),
        )
    }

    /// A connection referenced a socket the component does not declare.
    #[must_use]
    pub fn unknown_socket(component: &str, socket: &str, direction: &str, available: &[String]) -> Self {
        Self::new(format!(
            "'{component}' has no {direction} socket named '{socket}'. Available {direction} sockets: {}",
            available.join(", ")
        ))
        .with_components(vec![component.to_string()])
        .with_error_info(
            ConnectionErrorInfo::new(
                "PIPELINE-001-UNKNOWN_SOCKET",
                format!("Socket '{component}.{socket}' does not exist"),
            )
            .with_context_entry("direction", direction)
            .with_context_entry("socket", socket),
        )
    }

    /// The sender and receiver sockets carry incompatible types.
    #[must_use]
    pub fn type_mismatch(
        sender: &str,
        sender_type: &str,
        receiver: &str,
        receiver_type: &str,
    ) -> Self {
        Self::new(format!(
            "Cannot connect '{sender}' to '{receiver}': their declared input and output types do not match. \
             '{sender}' produces {sender_type}, '{receiver}' expects {receiver_type}"
        ))
        .with_components(vec![component_of(sender), component_of(receiver)])
        .with_error_info(
            ConnectionErrorInfo::new(
                "PIPELINE-002-TYPE_MISMATCH",
                format!("{sender_type} is not assignable to {receiver_type}"),
            )
            .with_context_entry("expected", receiver_type)
            .with_context_entry("actual", sender_type),
        )
    }

    /// No socket pair, or more than one, fits a connection without explicit socket names.
    #[must_use]
    pub fn ambiguous_connection(sender: &str, receiver: &str, candidates: &[String]) -> Self {
        let message = if candidates.is_empty() {
            format!("Cannot connect '{sender}' to '{receiver}': no compatible sockets found")
        } else {
            format!(
                "Cannot connect '{sender}' to '{receiver}': more than one compatible socket pair ({}). \
                 Specify the sockets explicitly",
                candidates.join(", ")
            )
        };
        Self::new(message)
            .with_components(vec![component_of(sender), component_of(receiver)])
            .with_error_info(
                ConnectionErrorInfo::new("PIPELINE-002-AMBIGUOUS_CONNECTION", "Socket pair could not be inferred")
                    .with_context_entry("candidates", candidates.len().to_string()),
            )
    }

    /// The receiver already has a sender and does not accept more.
    #[must_use]
    pub fn duplicate_connection(receiver: &str, existing_sender: &str) -> Self {
        Self::new(format!(
            "Cannot connect to '{receiver}': it is already connected to '{existing_sender}' and is not variadic"
        ))
        .with_components(vec![component_of(receiver), component_of(existing_sender)])
        .with_error_info(
            ConnectionErrorInfo::new(
                "PIPELINE-003-DUPLICATE_CONNECTION",
                format!("'{receiver}' accepts a single sender"),
            )
            .with_fix_hint("Declare the input as variadic to collect values from several senders."),
        )
    }

    /// A cycle contains a component that cannot be entered without its loop input.
    #[must_use]
    pub fn illegal_cycle(cycle: Vec<String>, blocking: &[String]) -> Self {
        let info = ConnectionErrorInfo::new(
            "PIPELINE-004-CYCLE",
            format!("Pipeline contains an illegal cycle: {}", cycle.join(" -> ")),
        )
        .with_fix_hint(
            "Every component on a loop needs at least one optional or default-valued input.",
        )
        .with_context_entry("required_only", blocking.join(", "));

        Self::new(format!(
            "Cycle {} is not a valid loop: {} only declare required inputs",
            cycle.join(" -> "),
            blocking.join(", ")
        ))
        .with_components(cycle)
        .with_error_info(info)
    }
}

fn component_of(path: &str) -> String {
    path.split_once('.')
        .map_or(path, |(component, _)| component)
        .to_string()
}

/// Error raised while restoring a pipeline from its serialized form.
#[derive(Debug, Clone, Error)]
pub enum DeserializationError {
    /// The document is not valid JSON/YAML or does not match the schema.
    #[error("Malformed pipeline document: {0}")]
    Malformed(String),

    /// The document names a component type missing from the registry.
    #[error("Component '{component}' has unknown type '{type_name}'")]
    UnknownComponentType {
        /// Component name in the document.
        component: String,
        /// The unregistered type identifier.
        type_name: String,
    },

    /// A required init parameter is absent.
    #[error("Missing required init parameter '{parameter}' for {type_name}")]
    MissingParameter {
        /// Component type identifier.
        type_name: String,
        /// The missing parameter.
        parameter: String,
    },

    /// An init parameter is present but unusable.
    #[error("Invalid init parameters for {type_name}: {message}")]
    InvalidParameter {
        /// Component type identifier.
        type_name: String,
        /// What was wrong.
        message: String,
    },
}

impl DeserializationError {
    /// Creates an invalid parameter error.
    #[must_use]
    pub fn invalid_parameter(type_name: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidParameter {
            type_name: type_name.into(),
            message: message.to_string(),
        }
    }
}

impl From<serde_json::Error> for DeserializationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<serde_yaml::Error> for DeserializationError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Error raised while serializing a pipeline or a component.
#[derive(Debug, Clone, Error)]
#[error("Cannot serialize {subject}: {message}")]
pub struct SerializationError {
    /// What was being serialized.
    pub subject: String,
    /// Why it failed.
    pub message: String,
}

impl SerializationError {
    /// Creates a new serialization error.
    #[must_use]
    pub fn new(subject: impl Into<String>, message: impl ToString) -> Self {
        Self {
            subject: subject.into(),
            message: message.to_string(),
        }
    }
}

/// Errors raised by components, during construction or while running.
#[derive(Debug, Clone, Error)]
pub enum ComponentError {
    /// An input value has the wrong shape or content.
    #[error("Invalid value for input '{socket}': {message}")]
    InvalidInput {
        /// The offending input socket.
        socket: String,
        /// What was wrong.
        message: String,
    },

    /// A mandatory input was not supplied.
    #[error("Missing mandatory input '{0}'")]
    MissingInput(String),

    /// The component returned an output it never declared.
    #[error("Output '{0}' is not declared by the component")]
    UndeclaredOutput(String),

    /// The component needs `warm_up` before `run`.
    #[error("{0}")]
    NotWarmedUp(String),

    /// Invalid constructor configuration.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A model or service behind the component failed.
    #[error("Backend failure: {0}")]
    Backend(String),
}

impl ComponentError {
    /// Creates an invalid input error.
    #[must_use]
    pub fn invalid_input(socket: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidInput {
            socket: socket.into(),
            message: message.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Error raised when a component runs more often than the pipeline allows.
#[derive(Debug, Clone, Error)]
#[error(
    "Component '{component}' exceeded the maximum number of runs ({max_runs}) after {iterations} iterations; \
     the pipeline is probably stuck in a loop"
)]
pub struct RunawayLoopError {
    /// The component that hit the bound.
    pub component: String,
    /// How many times it had run.
    pub iterations: usize,
    /// The configured bound.
    pub max_runs: usize,
}

impl RunawayLoopError {
    /// Creates a runaway loop error.
    #[must_use]
    pub fn new(component: impl Into<String>, iterations: usize, max_runs: usize) -> Self {
        Self {
            component: component.into(),
            iterations,
            max_runs,
        }
    }
}

/// General advice per connection error code.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSuggestions;

impl ConnectionSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            "PIPELINE-001-UNKNOWN_COMPONENT" | "PIPELINE-001-UNKNOWN_SOCKET" => Some(
                "Check the 'component.socket' path for typos. \
                 Pipeline::inputs() and Pipeline::outputs() list the open sockets.",
            ),
            "PIPELINE-002-TYPE_MISMATCH" => Some(
                "Insert a converter component between the two sockets, \
                 or declare the receiving socket with a wider type.",
            ),
            "PIPELINE-002-AMBIGUOUS_CONNECTION" => Some(
                "Name the sockets explicitly, as in connect(\"sender.socket\", \"receiver.socket\").",
            ),
            "PIPELINE-003-DUPLICATE_CONNECTION" => Some(
                "A plain input takes exactly one sender. Use a variadic input to join branches.",
            ),
            "PIPELINE-004-CYCLE" => Some(
                "Give the component that re-enters the loop an optional input \
                 for the value coming back around.",
            ),
            "PIPELINE-005-DUPLICATE_COMPONENT" => Some(
                "Component names are unique per pipeline.",
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_info_creation() {
        let info = ConnectionErrorInfo::new("TEST-001", "Test error")
            .with_fix_hint("Fix this by doing that")
            .with_context_entry("component", "splitter");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
        assert_eq!(info.context.get("component"), Some(&"splitter".to_string()));
        assert_eq!(info.to_dict().get("code").unwrap(), "TEST-001");
    }

    #[test]
    fn test_type_mismatch_carries_both_types() {
        let err = ConnectionError::type_mismatch("a.out", "int", "b.in", "str");

        assert_eq!(err.code(), Some("PIPELINE-002-TYPE_MISMATCH"));
        assert!(err.to_string().contains("produces int"));
        assert!(err.to_string().contains("expects str"));
        assert_eq!(err.components, vec!["a".to_string(), "b".to_string()]);
        let info = err.error_info.unwrap();
        assert_eq!(info.context.get("expected"), Some(&"str".to_string()));
    }

    #[test]
    fn test_ambiguous_connection_has_own_code() {
        let candidates = vec!["value -> value".to_string(), "value -> add".to_string()];
        let err = ConnectionError::ambiguous_connection("double", "add", &candidates);

        assert_eq!(err.code(), Some("PIPELINE-002-AMBIGUOUS_CONNECTION"));
        assert!(err.to_string().contains("value -> add"));
        assert!(err.suggestion().unwrap().contains("explicitly"));
        assert_eq!(err.error_info.unwrap().context.get("candidates"), Some(&"2".to_string()));

        let none = ConnectionError::ambiguous_connection("a", "b", &[]);
        assert_eq!(none.code(), Some("PIPELINE-002-AMBIGUOUS_CONNECTION"));
        assert!(none.to_string().contains("no compatible sockets"));
    }

    #[test]
    fn test_illegal_cycle_message() {
        let err = ConnectionError::illegal_cycle(
            vec!["a".to_string(), "b".to_string(), "a".to_string()],
            &["b".to_string()],
        );

        assert!(err.to_string().contains("a -> b -> a"));
        assert_eq!(err.code(), Some("PIPELINE-004-CYCLE"));
    }

    #[test]
    fn test_component_failed_wraps_source() {
        let err = PipelineError::ComponentFailed {
            component: "splitter".to_string(),
            source: ComponentError::MissingInput("documents".to_string()),
        };

        assert!(err.to_string().contains("splitter"));
        assert!(err.to_string().contains("documents"));
    }

    #[test]
    fn test_runaway_loop_message() {
        let err = RunawayLoopError::new("counter", 3, 3);
        assert!(err.to_string().contains("counter"));
        assert!(err.to_string().contains("(3)"));
    }

    #[test]
    fn test_suggestions() {
        assert!(ConnectionSuggestions::get("PIPELINE-004-CYCLE").is_some());
        assert!(ConnectionSuggestions::get("UNKNOWN").is_none());

        let hinted = ConnectionError::duplicate_connection("b.in", "a.out");
        assert!(hinted.suggestion().unwrap().contains("variadic"));
        let general = ConnectionError::unknown_socket("a", "x", "output", &[]);
        assert!(general.suggestion().unwrap().contains("Pipeline::outputs()"));
        assert_eq!(ConnectionError::new("plain").suggestion(), None);
    }
}
