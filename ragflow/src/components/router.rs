//! Routes file paths and byte streams by MIME type.

use crate::component::{Component, ComponentInputs, ComponentOutputs, InputSocket, OutputSocket, SocketType};
use crate::core::ByteStream;
use crate::errors::{ComponentError, DeserializationError, SerializationError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Output socket receiving sources that match none of the configured types.
pub const UNCLASSIFIED: &str = "unclassified";

/// Extensions the system MIME database does not know about.
const CUSTOM_MIME_MAPPINGS: &[(&str, &str)] = &[("md", "text/markdown"), ("markdown", "text/markdown")];

/// Init parameters of [`FileTypeRouter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTypeRouterConfig {
    /// MIME types that get their own output socket, in declaration order.
    pub mime_types: Vec<String>,
}

/// Groups sources by MIME type.
///
/// Paths are classified by extension, byte streams by their
/// `meta.content_type`. Each configured type is an output socket; everything
/// else goes to [`UNCLASSIFIED`]. Every output is emitted on each run, empty
/// or not.
#[derive(Debug, Clone)]
pub struct FileTypeRouter {
    config: FileTypeRouterConfig,
}

impl FileTypeRouter {
    /// Registry identifier.
    pub const TYPE_NAME: &'static str = "ragflow.components.routers.FileTypeRouter";

    /// Creates a router.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `mime_types` is empty, contains an
    /// unknown type, or lists a type twice.
    pub fn new(config: FileTypeRouterConfig) -> Result<Self, ComponentError> {
        if config.mime_types.is_empty() {
            return Err(ComponentError::configuration("The list of mime types cannot be empty."));
        }
        if let Some(unknown) = config.mime_types.iter().find(|m| !is_known_mime_type(m)) {
            return Err(ComponentError::configuration(format!(
                "Unknown mime type: '{unknown}'. Ensure you passed a list of strings in the 'mime_types' parameter"
            )));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = config.mime_types.iter().find(|m| !seen.insert(m.as_str())) {
            return Err(ComponentError::configuration(format!(
                "Duplicate mime type: '{duplicate}'. Each mime type gets one output socket"
            )));
        }
        Ok(Self { config })
    }

    /// Shorthand for [`FileTypeRouter::new`] from a list of types.
    pub fn with_mime_types<I, S>(mime_types: I) -> Result<Self, ComponentError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(FileTypeRouterConfig {
            mime_types: mime_types.into_iter().map(Into::into).collect(),
        })
    }

    /// Rebuilds a router from serialized init parameters.
    pub fn from_init_parameters(params: &serde_json::Value) -> Result<Self, DeserializationError> {
        let config: FileTypeRouterConfig = serde_json::from_value(params.clone())
            .map_err(|e| DeserializationError::invalid_parameter(Self::TYPE_NAME, e))?;
        Self::new(config).map_err(|e| DeserializationError::invalid_parameter(Self::TYPE_NAME, e))
    }

    /// Returns the configured MIME types.
    #[must_use]
    pub fn mime_types(&self) -> &[String] {
        &self.config.mime_types
    }

    fn source_type() -> SocketType {
        SocketType::union([SocketType::Path, SocketType::ByteStream])
    }

    fn bucket_for(&self, mime_type: Option<&str>) -> String {
        match mime_type {
            Some(mime) if self.config.mime_types.iter().any(|m| m == mime) => mime.to_string(),
            _ => UNCLASSIFIED.to_string(),
        }
    }
}

fn is_known_mime_type(mime_type: &str) -> bool {
    mime_guess::get_mime_extensions_str(mime_type).is_some()
        || CUSTOM_MIME_MAPPINGS.iter().any(|(_, m)| *m == mime_type)
}

/// Guesses a path's MIME type from its extension.
fn mime_type_for_path(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    if let Some((_, mime)) = CUSTOM_MIME_MAPPINGS.iter().find(|(ext, _)| *ext == extension) {
        return Some((*mime).to_string());
    }
    mime_guess::from_ext(&extension).first_raw().map(str::to_string)
}

#[async_trait]
impl Component for FileTypeRouter {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn input_sockets(&self) -> Vec<InputSocket> {
        vec![InputSocket::new(
            "sources",
            SocketType::list(SocketType::union([
                SocketType::Str,
                SocketType::Path,
                SocketType::ByteStream,
            ])),
        )]
    }

    fn output_sockets(&self) -> Vec<OutputSocket> {
        self.config
            .mime_types
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(UNCLASSIFIED))
            .map(|name| OutputSocket::new(name, SocketType::list(Self::source_type())))
            .collect()
    }

    async fn run(&self, inputs: ComponentInputs) -> Result<ComponentOutputs, ComponentError> {
        let sources: Vec<serde_json::Value> = inputs.get("sources")?;

        let mut outputs: ComponentOutputs = self
            .output_sockets()
            .into_iter()
            .map(|socket| (socket.name, serde_json::Value::Array(Vec::new())))
            .collect();

        for source in sources {
            let mime_type = match &source {
                serde_json::Value::String(path) => mime_type_for_path(Path::new(path)),
                serde_json::Value::Object(_) => {
                    let stream: ByteStream = serde_json::from_value(source.clone())
                        .map_err(|e| ComponentError::invalid_input("sources", e))?;
                    stream.content_type().map(str::to_string)
                }
                other => {
                    return Err(ComponentError::invalid_input(
                        "sources",
                        format!("Unsupported data source type: {other}"),
                    ))
                }
            };

            let bucket = self.bucket_for(mime_type.as_deref());
            tracing::trace!(bucket = %bucket, "Routed source");
            if let Some(serde_json::Value::Array(items)) = outputs.get_mut(&bucket) {
                items.push(source);
            }
        }

        Ok(outputs)
    }

    fn to_dict(&self) -> Result<serde_json::Value, SerializationError> {
        serde_json::to_value(&self.config).map_err(|e| SerializationError::new(Self::TYPE_NAME, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn route(router: &FileTypeRouter, sources: serde_json::Value) -> ComponentOutputs {
        let inputs = ComponentInputs::new().with("sources", sources);
        tokio_test::block_on(router.run(inputs)).unwrap()
    }

    #[test]
    fn test_routes_paths_by_extension() {
        let router = FileTypeRouter::with_mime_types(["text/plain", "application/pdf"]).unwrap();
        let outputs = route(&router, json!(["notes.txt", "paper.PDF", "song.mp3"]));

        assert_eq!(outputs["text/plain"], json!(["notes.txt"]));
        assert_eq!(outputs["application/pdf"], json!(["paper.PDF"]));
        assert_eq!(outputs[UNCLASSIFIED], json!(["song.mp3"]));
    }

    #[test]
    fn test_markdown_custom_mapping() {
        let router = FileTypeRouter::with_mime_types(["text/markdown"]).unwrap();
        let outputs = route(&router, json!(["README.md", "guide.markdown", "no_extension"]));

        assert_eq!(outputs["text/markdown"], json!(["README.md", "guide.markdown"]));
        assert_eq!(outputs[UNCLASSIFIED], json!(["no_extension"]));
    }

    #[test]
    fn test_routes_byte_streams_by_content_type() {
        let router = FileTypeRouter::with_mime_types(["text/plain"]).unwrap();
        let plain = serde_json::to_value(ByteStream::from_text("hi").with_content_type("text/plain")).unwrap();
        let untyped = serde_json::to_value(ByteStream::from_text("??")).unwrap();

        let outputs = route(&router, json!([plain.clone(), untyped.clone()]));

        assert_eq!(outputs["text/plain"], json!([plain]));
        assert_eq!(outputs[UNCLASSIFIED], json!([untyped]));
    }

    #[test]
    fn test_all_outputs_present_when_empty() {
        let router = FileTypeRouter::with_mime_types(["text/plain", "image/jpeg"]).unwrap();
        let outputs = route(&router, json!([]));

        assert_eq!(outputs.len(), 3);
        assert!(outputs.values().all(|v| v == &json!([])));
    }

    #[test]
    fn test_output_sockets_follow_declaration_order() {
        let router = FileTypeRouter::with_mime_types(["image/jpeg", "text/plain"]).unwrap();
        let names: Vec<String> = router.output_sockets().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["image/jpeg", "text/plain", UNCLASSIFIED]);
    }

    #[test]
    fn test_unsupported_source_rejected() {
        let router = FileTypeRouter::with_mime_types(["text/plain"]).unwrap();
        let inputs = ComponentInputs::new().with("sources", json!([42]));
        let result = tokio_test::block_on(router.run(inputs));
        assert!(matches!(result, Err(ComponentError::InvalidInput { .. })));
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(FileTypeRouter::with_mime_types(Vec::<String>::new()).is_err());
        assert!(FileTypeRouter::with_mime_types(["text/not-a-real-type"]).is_err());
        assert!(FileTypeRouter::from_init_parameters(&json!({})).is_err());
    }

    #[test]
    fn test_duplicate_mime_types_rejected() {
        let err = FileTypeRouter::with_mime_types(["text/plain", "application/pdf", "text/plain"]).unwrap_err();
        assert!(matches!(&err, ComponentError::Configuration(msg) if msg.contains("'text/plain'")));

        let params = json!({"mime_types": ["text/plain", "text/plain"]});
        assert!(FileTypeRouter::from_init_parameters(&params).is_err());
    }

    #[test]
    fn test_to_dict_round_trip() {
        let router = FileTypeRouter::with_mime_types(["text/plain", "text/markdown"]).unwrap();
        let params = router.to_dict().unwrap();
        assert_eq!(params, json!({"mime_types": ["text/plain", "text/markdown"]}));

        let restored = FileTypeRouter::from_init_parameters(&params).unwrap();
        assert_eq!(restored.mime_types(), router.mime_types());
    }
}
