//! Documents and byte streams, the payloads most components exchange.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A unit of text plus metadata.
///
/// The `id` is derived from the content and metadata, so two documents with
/// the same text and metadata share an id. Deserializing a document without an
/// `id` field computes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DocumentRepr")]
pub struct Document {
    /// Content hash identifier.
    pub id: String,
    /// Text content; `None` for documents that only carry metadata.
    pub content: Option<String>,
    /// Arbitrary metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct DocumentRepr {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    meta: BTreeMap<String, serde_json::Value>,
}

impl From<DocumentRepr> for Document {
    fn from(repr: DocumentRepr) -> Self {
        let id = repr
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| content_hash(repr.content.as_deref(), &repr.meta));
        Self {
            id,
            content: repr.content,
            meta: repr.meta,
        }
    }
}

impl Document {
    /// Creates a text document with no metadata.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_meta(content, BTreeMap::new())
    }

    /// Creates a text document with metadata.
    #[must_use]
    pub fn with_meta(content: impl Into<String>, meta: BTreeMap<String, serde_json::Value>) -> Self {
        let content = Some(content.into());
        let id = content_hash(content.as_deref(), &meta);
        Self { id, content, meta }
    }

    /// Creates a document without content.
    #[must_use]
    pub fn empty(meta: BTreeMap<String, serde_json::Value>) -> Self {
        let id = content_hash(None, &meta);
        Self {
            id,
            content: None,
            meta,
        }
    }

    /// Returns the text content, or an empty string.
    #[must_use]
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

fn content_hash(content: Option<&str>, meta: &BTreeMap<String, serde_json::Value>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.unwrap_or_default().as_bytes());
    // BTreeMap serialization is key-ordered, so the hash is stable.
    if let Ok(meta_json) = serde_json::to_vec(meta) {
        hasher.update(&meta_json);
    }
    hex::encode(hasher.finalize())
}

/// Raw binary data plus metadata, e.g. the bytes of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteStream {
    /// The payload, base64-encoded when serialized.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    /// Arbitrary metadata; routers read `content_type` from here.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, serde_json::Value>,
    /// MIME type of the payload, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ByteStream {
    /// Creates a byte stream with no metadata.
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            meta: BTreeMap::new(),
            mime_type: None,
        }
    }

    /// Creates a byte stream from UTF-8 text.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self::new(text.as_bytes().to_vec())
    }

    /// Sets the MIME type and mirrors it into `meta.content_type`.
    #[must_use]
    pub fn with_content_type(mut self, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        self.meta.insert(
            "content_type".to_string(),
            serde_json::Value::String(mime_type.clone()),
        );
        self.mime_type = Some(mime_type);
        self
    }

    /// Returns the content type, preferring `meta.content_type`.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.meta
            .get("content_type")
            .and_then(serde_json::Value::as_str)
            .or(self.mime_type.as_deref())
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_is_deterministic() {
        let a = Document::new("hello");
        let b = Document::new("hello");
        let c = Document::new("world");

        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.id.len(), 64);
    }

    #[test]
    fn test_document_id_depends_on_meta() {
        let mut meta = BTreeMap::new();
        meta.insert("page".to_string(), serde_json::json!(1));

        let plain = Document::new("hello");
        let with_meta = Document::with_meta("hello", meta);
        assert_ne!(plain.id, with_meta.id);
    }

    #[test]
    fn test_document_deserialize_computes_missing_id() {
        let doc: Document = serde_json::from_value(serde_json::json!({"content": "hello"})).unwrap();
        assert_eq!(doc.id, Document::new("hello").id);

        let doc: Document =
            serde_json::from_value(serde_json::json!({"id": "fixed", "content": "hello"})).unwrap();
        assert_eq!(doc.id, "fixed");
    }

    #[test]
    fn test_byte_stream_base64() {
        let stream = ByteStream::from_text("abc").with_content_type("text/plain");
        let json = serde_json::to_value(&stream).unwrap();

        assert_eq!(json["data"], "YWJj");
        assert_eq!(json["meta"]["content_type"], "text/plain");

        let back: ByteStream = serde_json::from_value(json).unwrap();
        assert_eq!(back, stream);
        assert_eq!(back.content_type(), Some("text/plain"));
    }
}
