//! Vendor FormData detection response reader and writer.
//!
//! ```text
//! {"dataset_id": "1377606572385112064",
//!  "result": [
//!    {"RegisterMatrix": [[1,0,0],[0,1,0],[0,0,1]]},
//!    {"Box": {"X": 1148, "Y": 689, "Width": 45, "Height": 154, "Angle": 0},
//!     "Score": 0.866, "label": "jiaza"}
//!  ],
//!  "image_width": 1920, "image_height": 1080}
//! ```
//!
//! Boxes are already top-left `x, y, width, height` in pixels, so the bbox
//! mapping is a direct copy. A non-zero `Angle` is kept in the detection's
//! `extra` map. The registration matrix carries no detection and is skipped.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::converter::{describe_malformed, native_from_value, Entry, FormatConverter};
use super::model::{Detection, Document, Image, EXTRA_ANGLE};
use super::BBoxXYWH;
use crate::error::TileLabelError;

const FORMAT: &str = "FormData";
const REQUIRED_KEYS: &[&str] = &["result"];

/// Label used when a box entry carries none.
pub const DEFAULT_LABEL: &str = "unknown";

pub(crate) const META_DATASET_ID: &str = "dataset_id";
pub(crate) const META_NUM_TILES: &str = "num_tiles";
pub(crate) const META_TOTAL_DETECTIONS: &str = "total_detections";

// ============================================================================
// FormData schema types
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormDataResponse {
    /// Services send this as a string or a bare number; it is kept as text.
    #[serde(default, deserialize_with = "deserialize_dataset_id")]
    pub dataset_id: Option<String>,

    pub result: Vec<Entry<FormDataItem>>,

    #[serde(default)]
    pub image_width: u32,

    #[serde(default)]
    pub image_height: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_tiles: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_detections: Option<u64>,
}

fn deserialize_dataset_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(dataset_id_text(&Value::deserialize(deserializer)?))
}

fn dataset_id_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// One element of the `result` list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormDataItem {
    Matrix(RegisterMatrix),
    Detection(FormDataDetection),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegisterMatrix {
    #[serde(rename = "RegisterMatrix")]
    pub matrix: Value,
}

impl RegisterMatrix {
    pub fn identity() -> Self {
        Self {
            matrix: serde_json::json!([[1, 0, 0], [0, 1, 0], [0, 0, 1]]),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormDataDetection {
    #[serde(rename = "Box")]
    pub bbox: FormDataBox,

    #[serde(rename = "Score", default)]
    pub score: Option<f64>,

    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FormDataBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub angle: f64,
}

// ============================================================================
// Public API
// ============================================================================

#[derive(Clone, Copy, Debug, Default)]
pub struct FormDataConverter;

impl FormatConverter for FormDataConverter {
    type Native = FormDataResponse;

    fn name(&self) -> &'static str {
        FORMAT
    }

    fn to_exchange(&self, native: &FormDataResponse) -> Result<Document, TileLabelError> {
        Ok(formdata_to_document(native))
    }

    fn from_exchange(&self, document: &Document) -> Result<FormDataResponse, TileLabelError> {
        Ok(document_to_formdata(document))
    }
}

pub fn read_formdata_json(path: &Path) -> Result<Document, TileLabelError> {
    let file = File::open(path)?;
    let value: Value = serde_json::from_reader(BufReader::new(file)).map_err(|source| {
        TileLabelError::JsonParse {
            format: FORMAT,
            path: path.to_path_buf(),
            source,
        }
    })?;
    let native: FormDataResponse = native_from_value(value, FORMAT, path, REQUIRED_KEYS)?;
    Ok(formdata_to_document(&native))
}

pub fn write_formdata_json(path: &Path, document: &Document) -> Result<(), TileLabelError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), &document_to_formdata(document)).map_err(
        |source| TileLabelError::JsonWrite {
            format: FORMAT,
            path: path.to_path_buf(),
            source,
        },
    )
}

pub fn from_formdata_str(json: &str) -> Result<Document, TileLabelError> {
    let value: Value = serde_json::from_str(json).map_err(parse_error)?;
    let native: FormDataResponse =
        native_from_value(value, FORMAT, Path::new("<string>"), REQUIRED_KEYS)?;
    Ok(formdata_to_document(&native))
}

pub fn from_formdata_slice(bytes: &[u8]) -> Result<Document, TileLabelError> {
    let value: Value = serde_json::from_slice(bytes).map_err(parse_error)?;
    let native: FormDataResponse =
        native_from_value(value, FORMAT, Path::new("<bytes>"), REQUIRED_KEYS)?;
    Ok(formdata_to_document(&native))
}

pub fn to_formdata_string(document: &Document) -> Result<String, TileLabelError> {
    serde_json::to_string_pretty(&document_to_formdata(document)).map_err(|source| {
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
// Conversion: FormData -> Document
// ============================================================================

fn formdata_to_document(native: &FormDataResponse) -> Document {
    let mut document = Document::new(Image::new(1u64, "", native.image_width, native.image_height));

    for (idx, entry) in native.result.iter().enumerate() {
        let item = match entry {
            Entry::Parsed(FormDataItem::Detection(item)) => item,
            Entry::Parsed(FormDataItem::Matrix(_)) => {
                debug!("skipping RegisterMatrix at result[{idx}]");
                continue;
            }
            Entry::Malformed(raw) => {
                warn!("skipping malformed FormData result[{idx}]: {}", describe_malformed(raw));
                continue;
            }
        };

        let b = &item.bbox;
        let label = item.label.as_deref().unwrap_or(DEFAULT_LABEL);
        let mut detection = Detection::new(
            BBoxXYWH::new(b.x, b.y, b.width, b.height),
            label,
            item.score.unwrap_or(0.0),
        );
        if b.angle != 0.0 {
            detection = detection.with_extra(EXTRA_ANGLE, b.angle);
        }
        document.push(detection);
    }

    if let Some(dataset_id) = &native.dataset_id {
        document
            .metadata
            .insert(META_DATASET_ID.to_string(), Value::from(dataset_id.clone()));
    }
    if let Some(num_tiles) = native.num_tiles {
        document
            .metadata
            .insert(META_NUM_TILES.to_string(), Value::from(num_tiles));
    }
    document.metadata.insert(
        META_TOTAL_DETECTIONS.to_string(),
        Value::from(document.len() as u64),
    );

    document
}

// ============================================================================
// Conversion: Document -> FormData
// ============================================================================

fn document_to_formdata(document: &Document) -> FormDataResponse {
    let mut result = Vec::with_capacity(document.len() + 1);
    result.push(Entry::Parsed(FormDataItem::Matrix(RegisterMatrix::identity())));

    for detection in document.detections() {
        let bbox = &detection.bbox;
        result.push(Entry::Parsed(FormDataItem::Detection(FormDataDetection {
            bbox: FormDataBox {
                x: bbox.x,
                y: bbox.y,
                width: bbox.width,
                height: bbox.height,
                angle: detection.angle().unwrap_or(0.0),
            },
            score: Some(detection.score),
            label: Some(detection.category.clone()),
        })));
    }

    let metadata = &document.metadata;
    let dataset_id = metadata.get(META_DATASET_ID).and_then(dataset_id_text);

    FormDataResponse {
        dataset_id,
        result,
        image_width: document.image.width,
        image_height: document.image.height,
        num_tiles: metadata.get(META_NUM_TILES).and_then(Value::as_u64),
        total_detections: metadata.get(META_TOTAL_DETECTIONS).and_then(Value::as_u64),
    }
}

// ============================================================================
// Tests
// ============================================================================
