//! Typed blocks and the JSON-Patch-style updates applied to them.

use serde::{Deserialize, Serialize};

/// A retrievable citation. Deduplicated by normalized URL; duplicates merge
/// their snippets by concatenation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl Source {
    /// Lowercased, trailing-slash-trimmed URL used as the dedupe key.
    pub fn normalized_url(&self) -> String {
        normalize_url(&self.url)
    }

    /// Merge `other` into `self`, concatenating snippets and preferring
    /// whichever side already has a given optional field.
    pub fn merge(&mut self, other: Source) {
        match (&mut self.snippet, other.snippet) {
            (Some(existing), Some(incoming)) if *existing != incoming => {
                existing.push(' ');
                existing.push_str(&incoming);
            }
            (None, Some(incoming)) => self.snippet = Some(incoming),
            _ => {}
        }
        if self.thumbnail.is_none() {
            self.thumbnail = other.thumbnail;
        }
        for image in other.images {
            if !self.images.contains(&image) {
                self.images.push(image);
            }
        }
        if self.author.is_none() {
            self.author = other.author;
        }
        if self.date.is_none() {
            self.date = other.date;
        }
    }
}

pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    trimmed.to_ascii_lowercase()
}

/// A persistent narrative fragment attached to the session, not a block.
/// Deduplicated by `id` or by `title`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Domain-specific widget output: which widget produced it and its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetData {
    pub widget_type: String,
    pub params: serde_json::Value,
}

/// A typed, identifiable unit of answer content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Text { id: String, data: String },
    Source { id: String, data: Vec<Source> },
    Widget { id: String, data: WidgetData },
    Suggestion { id: String, data: Vec<String> },
}

impl Block {
    pub fn id(&self) -> &str {
        match self {
            Block::Text { id, .. } => id,
            Block::Source { id, .. } => id,
            Block::Widget { id, .. } => id,
            Block::Suggestion { id, .. } => id,
        }
    }
}

/// A single RFC 6902-flavored patch operation. Only `replace` at `/data` is
/// required to have defined behavior; other ops/paths are accepted and
/// applied where meaningful, matching the spec's "graceful fallback to the
/// manual case" requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchOp {
    pub op: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("unsupported patch op {op} at path {path}")]
    Unsupported { op: String, path: String },
    #[error("patch value for op {op} at path {path} was missing or malformed")]
    BadValue { op: String, path: String },
}

/// Apply a patch array to a block in place. The only operation the spec
/// requires full fidelity for is `replace /data` on a text block; that case
/// is handled directly. Anything else falls back to a best-effort handling
/// of the manual `replace /data` case per op, logging and skipping ops it
/// cannot apply.
pub fn apply_patch(block: &mut Block, patch: &[PatchOp]) -> Result<(), PatchError> {
    for op in patch {
        match (op.op.as_str(), op.path.as_str(), &mut *block) {
            ("replace", "/data", Block::Text { data, .. }) => {
                let value = op
                    .value
                    .as_ref()
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| PatchError::BadValue { op: op.op.clone(), path: op.path.clone() })?;
                *data = value.to_string();
            }
            ("replace", "/data", Block::Suggestion { data, .. }) => {
                let value = op
                    .value
                    .as_ref()
                    .ok_or_else(|| PatchError::BadValue { op: op.op.clone(), path: op.path.clone() })?;
                let parsed: Vec<String> = serde_json::from_value(value.clone())
                    .map_err(|_| PatchError::BadValue { op: op.op.clone(), path: op.path.clone() })?;
                *data = parsed;
            }
            (unsupported_op, path, _) => {
                return Err(PatchError::Unsupported { op: unsupported_op.to_string(), path: path.to_string() });
            }
        }
    }
    Ok(())
}

/// Build the single patch the spec actually relies on: replace the full
/// accumulated text of a text block.
pub fn replace_data_patch(value: impl Into<serde_json::Value>) -> Vec<PatchOp> {
    vec![PatchOp { op: "replace".to_string(), path: "/data".to_string(), value: Some(value.into()) }]
}
