//! Vendor "Binary" suggestion response reader and writer.
//!
//! ```text
//! {"result": "success",
//!  "suggestion": [[{"Box": {"x1","y1","x2","y2"}, "Class", "Scores", "Picture_id"?}, ...], ...],
//!  "total_time": 0.42}
//! ```
//!
//! `suggestion` is a list of groups, one per picture the service looked at.
//! Groups are flattened on read; `Picture_id` is kept in the detection's
//! `extra` map so the writer can rebuild the same grouping.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::converter::{describe_malformed, native_from_value, Entry, FormatConverter};
use super::model::{Detection, Document, EXTRA_PICTURE_ID};
use super::BBoxXYWH;
use crate::error::TileLabelError;

const FORMAT: &str = "Binary";
const REQUIRED_KEYS: &[&str] = &["suggestion"];

pub(crate) const META_RESULT: &str = "result";
pub(crate) const META_TOTAL_TIME: &str = "total_time";

const DEFAULT_RESULT: &str = "success";

// ============================================================================
// Binary schema types
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BinaryResponse {
    #[serde(default = "default_result")]
    pub result: String,

    pub suggestion: Vec<Entry<Vec<Entry<BinarySuggestion>>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_time: Option<f64>,
}

fn default_result() -> String {
    DEFAULT_RESULT.to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BinarySuggestion {
    #[serde(rename = "Box")]
    pub bbox: BinaryBox,

    #[serde(rename = "Class")]
    pub class: String,

    #[serde(rename = "Scores", default)]
    pub scores: Option<f64>,

    #[serde(rename = "Picture_id", default, skip_serializing_if = "Option::is_none")]
    pub picture_id: Option<Value>,
}

/// Corner-form box: `(x1, y1)` top-left, `(x2, y2)` bottom-right.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BinaryBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

// ============================================================================
// Public API
// ============================================================================

#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryConverter;

impl FormatConverter for BinaryConverter {
    type Native = BinaryResponse;

    fn name(&self) -> &'static str {
        FORMAT
    }

    fn to_exchange(&self, native: &BinaryResponse) -> Result<Document, TileLabelError> {
        Ok(binary_to_document(native))
    }

    fn from_exchange(&self, document: &Document) -> Result<BinaryResponse, TileLabelError> {
        Ok(document_to_binary(document))
    }
}

pub fn read_binary_json(path: &Path) -> Result<Document, TileLabelError> {
    let file = File::open(path)?;
    let value: Value = serde_json::from_reader(BufReader::new(file)).map_err(|source| {
        TileLabelError::JsonParse {
            format: FORMAT,
            path: path.to_path_buf(),
            source,
        }
    })?;
    let native: BinaryResponse = native_from_value(value, FORMAT, path, REQUIRED_KEYS)?;
    Ok(binary_to_document(&native))
}

pub fn write_binary_json(path: &Path, document: &Document) -> Result<(), TileLabelError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), &document_to_binary(document)).map_err(
        |source| TileLabelError::JsonWrite {
            format: FORMAT,
            path: path.to_path_buf(),
            source,
        },
    )
}

pub fn from_binary_str(json: &str) -> Result<Document, TileLabelError> {
    let value: Value = serde_json::from_str(json).map_err(parse_error)?;
    let native: BinaryResponse =
        native_from_value(value, FORMAT, Path::new("<string>"), REQUIRED_KEYS)?;
    Ok(binary_to_document(&native))
}

pub fn from_binary_slice(bytes: &[u8]) -> Result<Document, TileLabelError> {
    let value: Value = serde_json::from_slice(bytes).map_err(parse_error)?;
    let native: BinaryResponse =
        native_from_value(value, FORMAT, Path::new("<bytes>"), REQUIRED_KEYS)?;
    Ok(binary_to_document(&native))
}

pub fn to_binary_string(document: &Document) -> Result<String, TileLabelError> {
    serde_json::to_string_pretty(&document_to_binary(document)).map_err(|source| {
        TileLabelError::JsonWrite {
            format: FORMAT,
            path: "<string>".into(),
            source,
        }
    })
}

fn parse_error(source: serde_json::Error) -> TileLabelError {
    TileLabelError::JsonParse {
        format: FORMAT,
        path: "<string>".into(),
        source,
    }
}

// ============================================================================
// Conversion: Binary -> Document
// ============================================================================

fn binary_to_document(native: &BinaryResponse) -> Document {
    // The response carries no image size.
    let mut document = Document::default();

    for (group_idx, group) in native.suggestion.iter().enumerate() {
        let items = match group {
            Entry::Parsed(items) => items,
            Entry::Malformed(raw) => {
                warn!(
                    "skipping malformed Binary suggestion[{group_idx}]: {}",
                    describe_malformed(raw)
                );
                continue;
            }
        };

        for (idx, entry) in items.iter().enumerate() {
            let item = match entry {
                Entry::Parsed(item) => item,
                Entry::Malformed(raw) => {
                    warn!(
                        "skipping malformed Binary suggestion[{group_idx}][{idx}]: {}",
                        describe_malformed(raw)
                    );
                    continue;
                }
            };

            let b = item.bbox;
            let mut detection = Detection::new(
                BBoxXYWH::from_xyxy(b.x1, b.y1, b.x2, b.y2),
                item.class.clone(),
                item.scores.unwrap_or(0.0),
            );
            if let Some(picture_id) = &item.picture_id {
                detection = detection.with_extra(EXTRA_PICTURE_ID, picture_id.clone());
            }
            document.push(detection);
        }
    }

    document
        .metadata
        .insert(META_RESULT.to_string(), Value::from(native.result.clone()));
    if let Some(total_time) = native.total_time {
        document
            .metadata
            .insert(META_TOTAL_TIME.to_string(), Value::from(total_time));
    }

    document
}

// ============================================================================
// Conversion: Document -> Binary
// ============================================================================

fn document_to_binary(document: &Document) -> BinaryResponse {
    // Groups keyed by picture id in first-seen order; `None` collects the
    // detections that never had one.
    let mut groups: Vec<(Option<&Value>, Vec<Entry<BinarySuggestion>>)> = Vec::new();

    for detection in document.detections() {
        let picture_id = detection.extra.get(EXTRA_PICTURE_ID);
        let (x1, y1, x2, y2) = detection.bbox.to_xyxy();
        let suggestion = BinarySuggestion {
            bbox: BinaryBox { x1, y1, x2, y2 },
            class: detection.category.clone(),
            scores: Some(detection.score),
            picture_id: picture_id.cloned(),
        };

        match groups.iter_mut().find(|(key, _)| *key == picture_id) {
            Some((_, items)) => items.push(Entry::Parsed(suggestion)),
            None => groups.push((picture_id, vec![Entry::Parsed(suggestion)])),
        }
    }

    let metadata = &document.metadata;
    BinaryResponse {
        result: metadata
            .get(META_RESULT)
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_RESULT)
            .to_string(),
        suggestion: groups
            .into_iter()
            .map(|(_, items)| Entry::Parsed(items))
            .collect(),
        total_time: metadata.get(META_TOTAL_TIME).and_then(Value::as_f64),
    }
}

// ============================================================================
// Tests
// ============================================================================
