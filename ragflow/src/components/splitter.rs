//! Splits long documents into shorter ones.

use crate::component::{Component, ComponentInputs, ComponentOutputs, InputSocket, OutputSocket, SocketType};
use crate::core::Document;
use crate::errors::{ComponentError, DeserializationError, SerializationError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The unit a document is split by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SplitBy {
    /// Split at `" "`.
    #[default]
    Word,
    /// Split at `"."`.
    Sentence,
    /// Split at form feeds.
    Page,
    /// Split at blank lines.
    Passage,
}

impl SplitBy {
    /// The separator that ends each unit.
    #[must_use]
    pub fn separator(self) -> &'static str {
        match self {
            Self::Word => " ",
            Self::Sentence => ".",
            Self::Page => "\u{c}",
            Self::Passage => "\n\n",
        }
    }
}

/// Init parameters of [`DocumentSplitter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSplitterConfig {
    /// Unit to split by.
    #[serde(default)]
    pub split_by: SplitBy,
    /// Maximum number of units per split.
    #[serde(default = "default_split_length")]
    pub split_length: usize,
    /// Number of units shared by consecutive splits.
    #[serde(default)]
    pub split_overlap: usize,
}

fn default_split_length() -> usize {
    200
}

impl Default for DocumentSplitterConfig {
    fn default() -> Self {
        Self {
            split_by: SplitBy::default(),
            split_length: default_split_length(),
            split_overlap: 0,
        }
    }
}

impl DocumentSplitterConfig {
    /// Creates a config.
    #[must_use]
    pub fn new(split_by: SplitBy, split_length: usize, split_overlap: usize) -> Self {
        Self {
            split_by,
            split_length,
            split_overlap,
        }
    }
}

/// Splits each input document into windows of `split_length` units.
///
/// Every split copies the parent's metadata and records the parent id under
/// `meta.source_id`.
#[derive(Debug, Clone)]
pub struct DocumentSplitter {
    config: DocumentSplitterConfig,
}

impl DocumentSplitter {
    /// Registry identifier.
    pub const TYPE_NAME: &'static str = "ragflow.components.preprocessors.DocumentSplitter";

    /// Creates a splitter.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `split_length` is zero or
    /// `split_overlap` is not smaller than `split_length`.
    pub fn new(config: DocumentSplitterConfig) -> Result<Self, ComponentError> {
        if config.split_length == 0 {
            return Err(ComponentError::configuration("split_length must be greater than 0"));
        }
        if config.split_overlap >= config.split_length {
            return Err(ComponentError::configuration(
                "split_overlap must be smaller than split_length",
            ));
        }
        Ok(Self { config })
    }

    /// Rebuilds a splitter from serialized init parameters.
    pub fn from_init_parameters(params: &serde_json::Value) -> Result<Self, DeserializationError> {
        let config: DocumentSplitterConfig = serde_json::from_value(params.clone())
            .map_err(|e| DeserializationError::invalid_parameter(Self::TYPE_NAME, e))?;
        Self::new(config).map_err(|e| DeserializationError::invalid_parameter(Self::TYPE_NAME, e))
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &DocumentSplitterConfig {
        &self.config
    }

    /// Splits the given documents.
    ///
    /// # Errors
    ///
    /// Returns an invalid input error for documents without content.
    pub fn split(&self, documents: &[Document]) -> Result<Vec<Document>, ComponentError> {
        let mut splits = Vec::new();
        for doc in documents {
            let Some(content) = doc.content.as_deref() else {
                return Err(ComponentError::invalid_input(
                    "documents",
                    format!(
                        "DocumentSplitter only works with text documents but content for document ID {} is None",
                        doc.id
                    ),
                ));
            };

            let units = split_into_units(content, self.config.split_by.separator());
            let mut meta = doc.meta.clone();
            meta.insert("source_id".to_string(), serde_json::Value::String(doc.id.clone()));

            for text in concatenate_units(&units, self.config.split_length, self.config.split_overlap) {
                splits.push(Document::with_meta(text, meta.clone()));
            }
        }
        Ok(splits)
    }
}

/// Splits at `separator`, re-attaching it to every unit but the last.
fn split_into_units(text: &str, separator: &str) -> Vec<String> {
    let parts: Vec<&str> = text.split(separator).collect();
    let last = parts.len().saturating_sub(1);
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            if i < last {
                format!("{part}{separator}")
            } else {
                (*part).to_string()
            }
        })
        .collect()
}

/// Joins units into windows of `length` units advancing by `length - overlap`.
///
/// A trailing partial window is emitted when the last full window did not
/// reach the end of the input. Empty windows are dropped.
fn concatenate_units(units: &[String], length: usize, overlap: usize) -> Vec<String> {
    let step = length - overlap;
    let total = units.len();
    let mut windows: Vec<&[String]> = Vec::new();

    if total == 0 {
        return Vec::new();
    }
    if total < length {
        windows.push(units);
    } else {
        let mut start = 0;
        while start + length <= total {
            windows.push(&units[start..start + length]);
            start += step;
        }
        let remainder = (total - length) % step;
        if remainder != 0 {
            let tail = length - (step - remainder);
            windows.push(&units[total - tail..]);
        }
    }

    windows
        .into_iter()
        .map(|window| window.concat())
        .filter(|text| !text.is_empty())
        .collect()
}

#[async_trait]
impl Component for DocumentSplitter {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn input_sockets(&self) -> Vec<InputSocket> {
        vec![InputSocket::new("documents", SocketType::list(SocketType::Document))]
    }

    fn output_sockets(&self) -> Vec<OutputSocket> {
        vec![OutputSocket::new("documents", SocketType::list(SocketType::Document))]
    }

    async fn run(&self, inputs: ComponentInputs) -> Result<ComponentOutputs, ComponentError> {
        let documents: Vec<Document> = inputs.get("documents")?;
        let splits = self.split(&documents)?;
        tracing::debug!(
            input_documents = documents.len(),
            output_documents = splits.len(),
            split_by = ?self.config.split_by,
            "Split documents"
        );

        let value = serde_json::to_value(splits)
            .map_err(|e| ComponentError::invalid_input("documents", e))?;
        Ok(ComponentOutputs::from([("documents".to_string(), value)]))
    }

    fn to_dict(&self) -> Result<serde_json::Value, SerializationError> {
        serde_json::to_value(&self.config).map_err(|e| SerializationError::new(Self::TYPE_NAME, e))
    }
}
