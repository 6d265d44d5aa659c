//! Registry of component constructors used during deserialization.
//!
//! The registry maps the `type` identifiers found in pipeline documents to
//! constructors. It is populated once at startup and passed by shared
//! reference into [`crate::pipeline::Pipeline::from_dict`], which cannot
//! modify it.

use super::Component;
use crate::components::{DocumentSplitter, FileTypeRouter};
use crate::errors::DeserializationError;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a component from its init parameters.
pub type ComponentConstructor =
    Arc<dyn Fn(&serde_json::Value) -> Result<Arc<dyn Component>, DeserializationError> + Send + Sync>;

/// Registry for component constructors.
#[derive(Default, Clone)]
pub struct ComponentRegistry {
    constructors: HashMap<String, ComponentConstructor>,
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

impl ComponentRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in components that need no injected services.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(DocumentSplitter::TYPE_NAME, |params| {
            Ok(Arc::new(DocumentSplitter::from_init_parameters(params)?) as Arc<dyn Component>)
        });
        registry.register(FileTypeRouter::TYPE_NAME, |params| {
            Ok(Arc::new(FileTypeRouter::from_init_parameters(params)?) as Arc<dyn Component>)
        });
        registry
    }

    /// Registers a constructor, replacing any previous one for `type_name`.
    pub fn register<F>(&mut self, type_name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(&serde_json::Value) -> Result<Arc<dyn Component>, DeserializationError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(type_name.into(), Arc::new(constructor));
        self
    }

    /// Checks if a type is registered.
    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    /// Lists registered type identifiers, sorted.
    #[must_use]
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Builds the component registered as `type_name`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownComponentType` if nothing is registered under
    /// `type_name`, or whatever the constructor reports.
    pub fn create(
        &self,
        component: &str,
        type_name: &str,
        init_parameters: &serde_json::Value,
    ) -> Result<Arc<dyn Component>, DeserializationError> {
        let constructor = self.constructors.get(type_name).ok_or_else(|| {
            DeserializationError::UnknownComponentType {
                component: component.to_string(),
                type_name: type_name.to_string(),
            }
        })?;
        constructor(init_parameters)
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Returns true if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}
