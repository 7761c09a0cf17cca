//! Output sanitizer: normalizes arbitrary tool payloads into the
//! canonical `SanitizedResult` before they reach persisted state or a
//! render sink.
//!
//! The contract is total: `sanitize` never fails and is idempotent —
//! sanitizing the serialization of its own output yields an equal
//! result.

use relay_store::{FileRef, SanitizedResult};
use serde_json::{Map, Value};

const CANONICAL_KEYS: [&str; 6] = ["response", "files", "images", "note", "error", "file"];

pub fn sanitize(raw: &Value) -> SanitizedResult {
    let value = unwrap_dual_shape(raw);

    let Some(object) = value.as_object() else {
        return SanitizedResult::from_response(scalar_text(value));
    };

    // An empty object is the serialization of an all-empty result, so
    // it is already canonical.
    if object.is_empty() || CANONICAL_KEYS.iter().any(|key| object.contains_key(*key)) {
        return canonical_from_object(object);
    }

    // Unrecognized structured output: keep it whole as a string, the
    // same degradation used when sanitization cannot do better.
    SanitizedResult::from_response(value.to_string())
}

/// Some tools answer with a two-element tuple whose halves are the same
/// structured payload; the first element is canonical.
fn unwrap_dual_shape(raw: &Value) -> &Value {
    if let Value::Array(items) = raw {
        if items.len() == 2 && is_structured(&items[0]) && is_structured(&items[1]) {
            return &items[0];
        }
    }
    raw
}

fn is_structured(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

fn canonical_from_object(object: &Map<String, Value>) -> SanitizedResult {
    let response = object.get("response").and_then(|value| match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    });

    let mut files: Vec<FileRef> = object
        .get("files")
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default();

    // Legacy singular `file` member: a sandbox output path.
    if let Some(path) = object.get("file").and_then(Value::as_str) {
        files.push(file_ref_from_path(path));
    }

    let images = object
        .get("images")
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default();

    SanitizedResult {
        response,
        files,
        images,
        note: object.get("note").and_then(Value::as_str).map(str::to_string),
        error: object.get("error").and_then(Value::as_str).map(str::to_string),
    }
}

fn file_ref_from_path(path: &str) -> FileRef {
    let name = path.rsplit('/').next().unwrap_or(path).to_string();
    let id = name.split('.').next().unwrap_or(&name).to_string();
    let mime_type = name.rsplit('.').next().unwrap_or_default().to_string();
    FileRef {
        name,
        id,
        download_link: path.replacen("data/output/", "/output/", 1),
        mime_type,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
