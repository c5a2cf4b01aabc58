//! Exchange (COCO-like) JSON reader and writer.
//!
//! This is the wire form of [`Document`] that other tools read:
//!
//! ```text
//! {"images":[{"id","width","height","file_name"}],
//!  "annotations":[{"id","image_id","category_id","bbox":[x,y,w,h],"area","score","iscrowd"}],
//!  "categories":[{"id","name"}],
//!  "metadata":{...}}
//! ```
//!
//! Annotation keys outside that set (for example `angle` or `picture_id`)
//! are carried in the detection's `extra` map and written back verbatim.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::converter::{describe_malformed, native_from_value, Entry, FormatConverter};
use super::model::{Category, Detection, Document, Image, Metadata};
use super::{BBoxXYWH, CategoryId, ImageId};
use crate::error::TileLabelError;

const FORMAT: &str = "COCO";
const REQUIRED_KEYS: &[&str] = &["annotations"];

// ============================================================================
// Exchange schema types
// ============================================================================

/// Top-level exchange document as it appears on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CocoDocument {
    #[serde(default)]
    pub images: Vec<Entry<CocoImage>>,

    pub annotations: Vec<Entry<CocoAnnotation>>,

    #[serde(default)]
    pub categories: Vec<Entry<CocoCategory>>,

    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CocoImage {
    #[serde(default = "default_image_id")]
    pub id: u64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub file_name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CocoCategory {
    pub id: u64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CocoAnnotation {
    #[serde(default)]
    pub id: u64,

    #[serde(default = "default_image_id")]
    pub image_id: u64,

    pub category_id: u64,

    /// `[x, y, width, height]` with `(x, y)` the top-left corner.
    pub bbox: [f64; 4],

    #[serde(default)]
    pub area: Option<f64>,

    #[serde(default)]
    pub score: Option<f64>,

    #[serde(default)]
    pub iscrowd: u8,

    /// Polygons/RLE are accepted but not carried; detection only.
    #[serde(default, skip_serializing)]
    pub segmentation: Option<Value>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_image_id() -> u64 {
    1
}

// ============================================================================
// Public API
// ============================================================================

/// Converter for the exchange schema itself; the mapping is the identity
/// apart from dense annotation renumbering.
#[derive(Clone, Copy, Debug, Default)]
pub struct CocoConverter;

impl FormatConverter for CocoConverter {
    type Native = CocoDocument;

    fn name(&self) -> &'static str {
        FORMAT
    }

    fn to_exchange(&self, native: &CocoDocument) -> Result<Document, TileLabelError> {
        Ok(coco_to_document(native))
    }

    fn from_exchange(&self, document: &Document) -> Result<CocoDocument, TileLabelError> {
        Ok(document_to_coco(document))
    }
}

/// Reads an exchange document from a JSON file.
pub fn read_coco_json(path: &Path) -> Result<Document, TileLabelError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let value: Value =
        serde_json::from_reader(reader).map_err(|source| TileLabelError::JsonParse {
            format: FORMAT,
            path: path.to_path_buf(),
            source,
        })?;
    let coco: CocoDocument = native_from_value(value, FORMAT, path, REQUIRED_KEYS)?;

    Ok(coco_to_document(&coco))
}

/// Writes an exchange document to a JSON file (pretty-printed).
pub fn write_coco_json(path: &Path, document: &Document) -> Result<(), TileLabelError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, &document_to_coco(document)).map_err(|source| {
        TileLabelError::JsonWrite {
            format: FORMAT,
            path: path.to_path_buf(),
            source,
        }
    })
}

pub fn from_coco_str(json: &str) -> Result<Document, TileLabelError> {
    let value: Value = serde_json::from_str(json).map_err(parse_error)?;
    let coco: CocoDocument = native_from_value(value, FORMAT, Path::new("<string>"), REQUIRED_KEYS)?;
    Ok(coco_to_document(&coco))
}

/// Reads an exchange document from raw bytes; used by fuzzing.
pub fn from_coco_slice(bytes: &[u8]) -> Result<Document, TileLabelError> {
    let value: Value = serde_json::from_slice(bytes).map_err(parse_error)?;
    let coco: CocoDocument = native_from_value(value, FORMAT, Path::new("<bytes>"), REQUIRED_KEYS)?;
    Ok(coco_to_document(&coco))
}

pub fn to_coco_string(document: &Document) -> Result<String, TileLabelError> {
    serde_json::to_string_pretty(&document_to_coco(document)).map_err(|source| {
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
// Conversion: exchange JSON -> Document
// ============================================================================

fn coco_to_document(coco: &CocoDocument) -> Document {
    if coco.images.len() > 1 {
        warn!(
            "exchange document lists {} images; using the first and ignoring the rest",
            coco.images.len()
        );
    }

    let image = match coco.images.first() {
        Some(Entry::Parsed(img)) => Image {
            id: ImageId::new(img.id),
            width: img.width,
            height: img.height,
            file_name: img.file_name.clone(),
        },
        Some(Entry::Malformed(raw)) => {
            warn!("salvaging malformed images[0]: {}", describe_malformed(raw));
            image_from_raw(raw)
        }
        None => Image::default(),
    };

    let mut document = Document::new(image);
    document.metadata = coco.metadata.clone();

    for (idx, entry) in coco.categories.iter().enumerate() {
        match entry {
            Entry::Parsed(cat) => document
                .categories
                .push(Category::new(CategoryId::new(cat.id), cat.name.clone())),
            Entry::Malformed(raw) => {
                warn!("skipping malformed category[{idx}]: {}", describe_malformed(raw))
            }
        }
    }

    for (idx, entry) in coco.annotations.iter().enumerate() {
        let ann = match entry {
            Entry::Parsed(ann) => ann,
            Entry::Malformed(raw) => {
                warn!("skipping malformed annotation[{idx}]: {}", describe_malformed(raw));
                continue;
            }
        };

        let Some(name) = document.category_name(CategoryId::new(ann.category_id)) else {
            warn!(
                "skipping annotation[{idx}]: category_id {} is not declared",
                ann.category_id
            );
            continue;
        };

        let [x, y, w, h] = ann.bbox;
        let detection = Detection {
            bbox: BBoxXYWH::new(x, y, w, h),
            category: name.to_string(),
            score: ann.score.unwrap_or(0.0),
            extra: ann.extra.clone(),
        };
        document.push(detection);
    }

    document
}

/// Reads whatever image fields are usable from an entry that did not match
/// the schema; the rest fall back to the defaults.
fn image_from_raw(raw: &Value) -> Image {
    let dimension = |key: &str| {
        raw.get(key)
            .and_then(Value::as_f64)
            .filter(|value| value.is_finite() && *value >= 0.0)
            .map_or(0, |value| value as u32)
    };
    Image {
        id: ImageId::new(raw.get("id").and_then(Value::as_u64).unwrap_or(1)),
        width: dimension("width"),
        height: dimension("height"),
        file_name: raw
            .get("file_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

// ============================================================================
// Conversion: Document -> exchange JSON
// ============================================================================

fn document_to_coco(document: &Document) -> CocoDocument {
    let image = &document.image;

    let annotations = document
        .annotations
        .iter()
        .map(|ann| {
            let bbox = &ann.detection.bbox;
            Entry::Parsed(CocoAnnotation {
                id: ann.id.as_u64(),
                image_id: image.id.as_u64(),
                category_id: ann.category_id.as_u64(),
                bbox: bbox.to_array(),
                area: Some(bbox.area()),
                score: Some(ann.detection.score),
                iscrowd: 0,
                segmentation: None,
                extra: ann.detection.extra.clone(),
            })
        })
        .collect();

    let categories = document
        .categories
        .iter()
        .map(|cat| {
            Entry::Parsed(CocoCategory {
                id: cat.id.as_u64(),
                name: cat.name.clone(),
            })
        })
        .collect();

    CocoDocument {
        images: vec![Entry::Parsed(CocoImage {
            id: image.id.as_u64(),
            width: image.width,
            height: image.height,
            file_name: image.file_name.clone(),
        })],
        annotations,
        categories,
        metadata: document.metadata.clone(),
    }
}

// ============================================================================
// Tests
// ============================================================================
