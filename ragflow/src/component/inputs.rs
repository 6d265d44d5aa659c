//! Values handed to a component's `run`.

use crate::errors::ComponentError;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// The resolved input values for one component execution.
///
/// Every input socket of the component is present: delivered values,
/// caller-provided values, or declared defaults. Variadic sockets hold a JSON
/// array with one element per received value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentInputs {
    values: HashMap<String, serde_json::Value>,
}

impl ComponentInputs {
    /// Creates an empty input set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value.
    #[must_use]
    pub fn with(mut self, socket: impl Into<String>, value: serde_json::Value) -> Self {
        self.values.insert(socket.into(), value);
        self
    }

    /// Inserts a value.
    pub fn insert(&mut self, socket: impl Into<String>, value: serde_json::Value) {
        self.values.insert(socket.into(), value);
    }

    /// Deserializes a mandatory input.
    ///
    /// # Errors
    ///
    /// Returns `MissingInput` if absent and `InvalidInput` if the value does
    /// not have the expected shape.
    pub fn get<T: DeserializeOwned>(&self, socket: &str) -> Result<T, ComponentError> {
        let value = self
            .values
            .get(socket)
            .ok_or_else(|| ComponentError::MissingInput(socket.to_string()))?;
        serde_json::from_value(value.clone()).map_err(|e| ComponentError::invalid_input(socket, e))
    }

    /// Deserializes an optional input; absent and `null` both yield `None`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if a non-null value has the wrong shape.
    pub fn get_optional<T: DeserializeOwned>(&self, socket: &str) -> Result<Option<T>, ComponentError> {
        match self.values.get(socket) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| ComponentError::invalid_input(socket, e)),
        }
    }

    /// Returns the raw value of a socket.
    #[must_use]
    pub fn raw(&self, socket: &str) -> Option<&serde_json::Value> {
        self.values.get(socket)
    }

    /// Checks if a socket has a value.
    #[must_use]
    pub fn contains(&self, socket: &str) -> bool {
        self.values.contains_key(socket)
    }

    /// Returns the socket names with values.
    #[must_use]
    pub fn sockets(&self) -> Vec<&String> {
        self.values.keys().collect()
    }

    /// Number of sockets with values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no socket has a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consumes the inputs, returning the raw map.
    #[must_use]
    pub fn into_inner(self) -> HashMap<String, serde_json::Value> {
        self.values
    }
}

impl From<HashMap<String, serde_json::Value>> for ComponentInputs {
    fn from(values: HashMap<String, serde_json::Value>) -> Self {
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Document;

    #[test]
    fn test_typed_get() {
        let inputs = ComponentInputs::new()
            .with("prompt", serde_json::json!("hi"))
            .with("documents", serde_json::json!([{"content": "a"}]));

        let prompt: String = inputs.get("prompt").unwrap();
        assert_eq!(prompt, "hi");

        let docs: Vec<Document> = inputs.get("documents").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text(), "a");
    }

    #[test]
    fn test_missing_and_invalid() {
        let inputs = ComponentInputs::new().with("count", serde_json::json!("three"));

        assert!(matches!(
            inputs.get::<i64>("other"),
            Err(ComponentError::MissingInput(_))
        ));
        assert!(matches!(
            inputs.get::<i64>("count"),
            Err(ComponentError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_optional_null_is_none() {
        let inputs = ComponentInputs::new().with("kwargs", serde_json::Value::Null);

        let kwargs: Option<HashMap<String, serde_json::Value>> = inputs.get_optional("kwargs").unwrap();
        assert!(kwargs.is_none());
        assert!(inputs.get_optional::<String>("absent").unwrap().is_none());
    }
}
