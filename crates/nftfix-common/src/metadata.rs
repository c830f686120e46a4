//! Metadata document model, malformation detection and repair
//!
//! A metadata document is the JSON object an on-chain record points at. Only a
//! handful of fields matter here (`image`, `animation_url` and
//! `properties.files`) and none of them is required to have a particular JSON
//! type; everything else is carried through untouched so that a repaired
//! document differs from its source only in the file list.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

/// MIME type recorded for the `image` entry of a repaired file list.
pub const IMAGE_MIME: &str = "image/jpeg";

/// MIME type recorded for the `animation_url` entry of a repaired file list.
pub const ANIMATION_MIME: &str = "video/mp4";

/// Off-chain metadata document: any JSON object, fields kept in source order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataDocument {
    fields: Map<String, Value>,
}

/// One entry of a repaired `properties.files` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub uri: String,

    #[serde(rename = "type")]
    pub mime: String,
}

impl FileEntry {
    pub fn new(uri: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime: mime.into(),
        }
    }

    fn into_value(self) -> Value {
        let mut entry = Map::new();
        entry.insert("uri".to_string(), Value::String(self.uri));
        entry.insert("type".to_string(), Value::String(self.mime));
        Value::Object(entry)
    }
}

impl MetadataDocument {
    /// Top-level field by name
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// `properties.files` as declared, whatever its type
    pub fn declared_files(&self) -> Option<&Value> {
        self.fields
            .get("properties")
            .and_then(Value::as_object)
            .and_then(|properties| properties.get("files"))
    }

    /// `properties.files` when it is a list, empty otherwise
    pub fn files(&self) -> &[Value] {
        self.declared_files()
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// `image` as text; null, `false`, `0` and empty values count as absent
    pub fn image_uri(&self) -> Option<String> {
        self.fields.get("image").filter(|v| is_truthy(v)).map(as_text)
    }

    /// `animation_url` as text, with the same absence rules as [`Self::image_uri`]
    pub fn animation_uri(&self) -> Option<String> {
        self.fields.get("animation_url").filter(|v| is_truthy(v)).map(as_text)
    }

    /// Replace `properties.files`, creating `properties` when it is missing or
    /// not an object
    fn set_files(&mut self, files: Vec<FileEntry>) {
        let files = Value::Array(files.into_iter().map(FileEntry::into_value).collect());
        match self.fields.get_mut("properties") {
            Some(Value::Object(properties)) => {
                properties.insert("files".to_string(), files);
            },
            _ => {
                let mut properties = Map::new();
                properties.insert("files".to_string(), files);
                self.fields
                    .insert("properties".to_string(), Value::Object(properties));
            },
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Strings as-is, anything else in its JSON text form
fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_http_uri(uri: &str) -> bool {
    uri.starts_with("http://") || uri.starts_with("https://")
}

fn entry_has_http_uri(entry: &Value) -> bool {
    entry
        .get("uri")
        .and_then(Value::as_str)
        .is_some_and(is_http_uri)
}

/// A document is malformed when it declares files and at least one of them
/// is not addressed by an HTTP(S) URL.
///
/// A missing or empty file list is well-formed. An entry without a string
/// `uri` (including entries that are not objects) counts as non-HTTP, and so
/// does a non-empty `files` value that is not a list. Reachability and
/// content type are not checked.
pub fn is_malformed(doc: &MetadataDocument) -> bool {
    match doc.declared_files() {
        None => false,
        Some(Value::Array(files)) => files.iter().any(|entry| !entry_has_http_uri(entry)),
        Some(other) => is_truthy(other),
    }
}

/// A repaired entry whose URI does not carry the extension its MIME type implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NonCanonicalUri {
    /// `image` does not end in `jpg`/`jpeg`
    Image(String),
    /// `animation_url` does not end in `mp4`
    Animation(String),
}

impl fmt::Display for NonCanonicalUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NonCanonicalUri::Image(uri) => write!(f, "non jpeg image uri {}", uri),
            NonCanonicalUri::Animation(uri) => write!(f, "non mp4 animation uri {}", uri),
        }
    }
}

/// Result of [`repair`]
#[derive(Debug, Clone, PartialEq)]
pub struct Repair {
    pub document: MetadataDocument,
    pub warnings: Vec<NonCanonicalUri>,
}

/// Rebuild `properties.files` from `image` and `animation_url`.
///
/// The new list holds the image entry (typed `image/jpeg`) followed by the
/// animation entry (typed `video/mp4`), each only when the source field is
/// present. Non-string sources are written in their JSON text form. All other
/// fields are copied unchanged. The function is deterministic: equal inputs
/// give equal outputs.
///
/// The extension check behind [`NonCanonicalUri`] ignores ASCII case, so
/// `clip.MP4` and `a.JPG` are canonical.
pub fn repair(doc: &MetadataDocument) -> Repair {
    let mut files = Vec::with_capacity(2);
    let mut warnings = Vec::new();

    if let Some(image) = doc.image_uri() {
        if !has_suffix(&image, &["jpg", "jpeg"]) {
            warnings.push(NonCanonicalUri::Image(image.clone()));
        }
        files.push(FileEntry::new(image, IMAGE_MIME));
    }

    if let Some(animation) = doc.animation_uri() {
        if !has_suffix(&animation, &["mp4"]) {
            warnings.push(NonCanonicalUri::Animation(animation.clone()));
        }
        files.push(FileEntry::new(animation, ANIMATION_MIME));
    }

    for warning in &warnings {
        warn!(%warning, "Repaired file entry has a non-canonical extension");
    }

    let mut document = doc.clone();
    document.set_files(files);

    Repair { document, warnings }
}

fn has_suffix(uri: &str, suffixes: &[&str]) -> bool {
    let lower = uri.to_ascii_lowercase();
    suffixes.iter().any(|suffix| lower.ends_with(suffix))
}
