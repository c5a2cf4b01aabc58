//! Label Studio task JSON reader and writer.
//!
//! One task describes one image. Rectangle results carry their box as
//! percentages of `original_width`/`original_height`:
//!
//! ```text
//! {"data": {"image": "...", "filename": "...", "label": "a, b"},
//!  "annotations": [{"result": [{"from_name": "label", "to_name": "image",
//!     "type": "rectanglelabels",
//!     "value": {"x": 10, "y": 20, "width": 5, "height": 5, "rectanglelabels": ["a"]},
//!     "original_width": 640, "original_height": 480, "score": 0.9}]}]}
//! ```
//!
//! Only `rectanglelabels` results are read; other result types are skipped.
//! Rotation is carried as the detection's `angle` and never applied to the
//! box geometry.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::converter::{describe_malformed, native_from_value, Entry, FormatConverter};
use super::model::{Detection, Document, Image, EXTRA_ANGLE};
use super::{BBoxXYWH, Percent};
use crate::error::TileLabelError;

const FORMAT: &str = "Label Studio";
const RECTANGLE_LABELS: &str = "rectanglelabels";
const FROM_NAME: &str = "label";
const TO_NAME: &str = "image";

// ============================================================================
// Label Studio schema types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelStudioTask {
    #[serde(default)]
    pub data: LsTaskData,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<LsResultSet>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predictions: Option<Vec<LsResultSet>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LsTaskData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_class: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LsResultSet {
    #[serde(default)]
    pub result: Vec<Entry<LsResult>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LsResult {
    #[serde(default)]
    pub from_name: String,

    #[serde(default)]
    pub to_name: String,

    #[serde(rename = "type")]
    pub result_type: String,

    /// Kept raw until the result type is known.
    #[serde(default)]
    pub value: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_height: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LsRectangleValue {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,

    #[serde(default)]
    pub rectanglelabels: Vec<String>,
}

/// Which task key the writer fills with results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputMode {
    #[default]
    Annotations,
    Predictions,
}

// ============================================================================
// Public API
// ============================================================================

#[derive(Clone, Debug, Default)]
pub struct LabelStudioConverter {
    pub output_mode: OutputMode,
    /// Prepended to the image basename to form `data.image`.
    pub prefix: String,
}

impl LabelStudioConverter {
    pub fn new(output_mode: OutputMode, prefix: impl Into<String>) -> Self {
        Self {
            output_mode,
            prefix: prefix.into(),
        }
    }
}

impl FormatConverter for LabelStudioConverter {
    type Native = LabelStudioTask;

    fn name(&self) -> &'static str {
        FORMAT
    }

    fn to_exchange(&self, native: &LabelStudioTask) -> Result<Document, TileLabelError> {
        Ok(task_to_document(native))
    }

    fn from_exchange(&self, document: &Document) -> Result<LabelStudioTask, TileLabelError> {
        document_to_task(document, self.output_mode, &self.prefix)
    }
}

pub fn read_label_studio_json(path: &Path) -> Result<Document, TileLabelError> {
    let file = File::open(path)?;
    let value: Value = serde_json::from_reader(BufReader::new(file)).map_err(|source| {
        TileLabelError::JsonParse {
            format: FORMAT,
            path: path.to_path_buf(),
            source,
        }
    })?;
    let task = task_from_value(value, path)?;
    Ok(task_to_document(&task))
}

pub fn write_label_studio_json(
    path: &Path,
    document: &Document,
    converter: &LabelStudioConverter,
) -> Result<(), TileLabelError> {
    let task = converter.from_exchange(document)?;
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), &task).map_err(|source| {
        TileLabelError::JsonWrite {
            format: FORMAT,
            path: path.to_path_buf(),
            source,
        }
    })
}

pub fn from_label_studio_str(json: &str) -> Result<Document, TileLabelError> {
    let value: Value = serde_json::from_str(json).map_err(parse_error)?;
    let task = task_from_value(value, Path::new("<string>"))?;
    Ok(task_to_document(&task))
}

pub fn from_label_studio_slice(bytes: &[u8]) -> Result<Document, TileLabelError> {
    let value: Value = serde_json::from_slice(bytes).map_err(parse_error)?;
    let task = task_from_value(value, Path::new("<bytes>"))?;
    Ok(task_to_document(&task))
}

pub fn to_label_studio_string(
    document: &Document,
    converter: &LabelStudioConverter,
) -> Result<String, TileLabelError> {
    let task = converter.from_exchange(document)?;
    serde_json::to_string_pretty(&task).map_err(|source| TileLabelError::JsonWrite {
        format: FORMAT,
        path: "<string>".into(),
        source,
    })
}

fn parse_error(source: serde_json::Error) -> TileLabelError {
    TileLabelError::JsonParse {
        format: FORMAT,
        path: "<string>".into(),
        source,
    }
}

/// Accepts a single task object, or a task-export array holding one task.
fn task_from_value(value: Value, path: &Path) -> Result<LabelStudioTask, TileLabelError> {
    let value = match value {
        Value::Array(mut tasks) => {
            if tasks.len() > 1 {
                warn!(
                    "{}: export holds {} tasks; reading only the first",
                    path.display(),
                    tasks.len()
                );
            }
            if tasks.is_empty() {
                return Err(TileLabelError::SchemaInvalid {
                    format: FORMAT,
                    path: path.to_path_buf(),
                    message: "task array is empty".to_string(),
                });
            }
            tasks.swap_remove(0)
        }
        other => other,
    };

    let task: LabelStudioTask = native_from_value(value, FORMAT, path, &[])?;
    if task.annotations.is_none() && task.predictions.is_none() {
        return Err(TileLabelError::SchemaInvalid {
            format: FORMAT,
            path: path.to_path_buf(),
            message: "task has neither 'annotations' nor 'predictions'".to_string(),
        });
    }
    Ok(task)
}

// ============================================================================
// Conversion: Label Studio -> Document
// ============================================================================

fn task_to_document(task: &LabelStudioTask) -> Document {
    // Annotations win over predictions unless they are empty.
    let sets = task
        .annotations
        .as_ref()
        .filter(|sets| !sets.is_empty())
        .or(task.predictions.as_ref());
    let sets: &[LsResultSet] = sets.map(Vec::as_slice).unwrap_or_default();
    if sets.len() > 1 {
        warn!("task has {} result sets; reading only the first", sets.len());
    }
    let results: &[Entry<LsResult>] = sets.first().map(|set| set.result.as_slice()).unwrap_or_default();

    let file_name = task
        .data
        .filename
        .clone()
        .or_else(|| task.data.image.as_deref().and_then(image_basename))
        .unwrap_or_default();

    let mut dims: Option<(u32, u32)> = None;
    let mut detections = Vec::new();

    for (idx, entry) in results.iter().enumerate() {
        let result = match entry {
            Entry::Parsed(result) => result,
            Entry::Malformed(raw) => {
                warn!("skipping malformed result[{idx}]: {}", describe_malformed(raw));
                continue;
            }
        };
        if result.result_type != RECTANGLE_LABELS {
            debug!("skipping result[{idx}] of type '{}'", result.result_type);
            continue;
        }

        let value: LsRectangleValue = match serde_json::from_value(result.value.clone()) {
            Ok(value) => value,
            Err(source) => {
                warn!("skipping result[{idx}]: invalid rectangle value: {source}");
                continue;
            }
        };
        let Some(label) = value.rectanglelabels.first() else {
            warn!("skipping result[{idx}]: no rectanglelabels");
            continue;
        };
        if value.rectanglelabels.len() > 1 {
            debug!("result[{idx}] has {} labels; keeping '{label}'", value.rectanglelabels.len());
        }

        let own_dims = result.original_width.zip(result.original_height);
        let Some((width, height)) = own_dims.or(dims) else {
            warn!("skipping result[{idx}]: no original_width/original_height");
            continue;
        };
        match dims {
            None => dims = Some((width, height)),
            Some(first) if first != (width, height) => warn!(
                "result[{idx}] original size {width}x{height} differs from {}x{}",
                first.0, first.1
            ),
            Some(_) => {}
        }

        let percent = BBoxXYWH::<Percent>::new(value.x, value.y, value.width, value.height);
        let mut detection =
            Detection::new(percent.to_pixel(width, height), label.clone(), result.score.unwrap_or(0.0));
        let rotation = value.rotation.or(result.rotation).unwrap_or(0.0);
        if rotation != 0.0 {
            detection = detection.with_extra(EXTRA_ANGLE, rotation);
        }
        detections.push(detection);
    }

    let (width, height) = dims.unwrap_or((0, 0));
    let mut document = Document::new(Image::new(1u64, file_name, width, height));
    for detection in detections {
        document.push(detection);
    }
    document
}

// ============================================================================
// Conversion: Document -> Label Studio
// ============================================================================

fn document_to_task(
    document: &Document,
    output_mode: OutputMode,
    prefix: &str,
) -> Result<LabelStudioTask, TileLabelError> {
    let image = &document.image;
    if !document.is_empty() && (image.width == 0 || image.height == 0) {
        return Err(TileLabelError::ConversionFailed {
            format: FORMAT,
            message: format!(
                "cannot express {} detections as percentages of a {}x{} image",
                document.len(),
                image.width,
                image.height
            ),
        });
    }

    let mut results = Vec::with_capacity(document.len());
    for annotation in &document.annotations {
        let detection = &annotation.detection;
        let percent = detection
            .bbox
            .to_percent(image.width, image.height)
            .ok_or_else(|| TileLabelError::ConversionFailed {
                format: FORMAT,
                message: format!("annotation {} has no image size to scale by", annotation.id),
            })?;

        let value = LsRectangleValue {
            x: percent.x,
            y: percent.y,
            width: percent.width,
            height: percent.height,
            rotation: detection.angle(),
            rectanglelabels: vec![detection.category.clone()],
        };
        let value = serde_json::to_value(value).map_err(|source| TileLabelError::JsonWrite {
            format: FORMAT,
            path: "<string>".into(),
            source,
        })?;

        results.push(Entry::Parsed(LsResult {
            from_name: FROM_NAME.to_string(),
            to_name: TO_NAME.to_string(),
            result_type: RECTANGLE_LABELS.to_string(),
            value,
            original_width: Some(image.width),
            original_height: Some(image.height),
            rotation: None,
            score: Some(detection.score),
        }));
    }

    let sets = if results.is_empty() {
        Vec::new()
    } else {
        vec![LsResultSet { result: results }]
    };

    let basename = image_basename(&image.file_name).unwrap_or_default();
    let (review_label, target_class) = review_metadata(&basename);
    let data = LsTaskData {
        image: Some(format!("{prefix}{basename}")),
        filename: Some(basename),
        label: Some(document.label_names().join(", ")),
        review_label,
        target_class,
    };

    let (annotations, predictions) = match output_mode {
        OutputMode::Annotations => (Some(sets), None),
        OutputMode::Predictions => (None, Some(sets)),
    };

    Ok(LabelStudioTask {
        data,
        annotations,
        predictions,
    })
}

// ============================================================================
// Helpers
// ============================================================================

/// Last path segment of a file path or URL, without query or fragment.
fn image_basename(image_ref: &str) -> Option<String> {
    let no_query = image_ref.split('?').next().unwrap_or(image_ref);
    let no_fragment = no_query.split('#').next().unwrap_or(no_query);
    let normalized = no_fragment.replace('\\', "/");
    let candidate = normalized.rsplit('/').next()?;
    if candidate.is_empty() {
        return None;
    }
    Some(candidate.to_string())
}

/// Splits `FN_<class>_...` / `FP_<class>_...` review file names into
/// `(review_label, target_class)`.
fn review_metadata(basename: &str) -> (Option<String>, Option<String>) {
    if !(basename.starts_with("FN_") || basename.starts_with("FP_")) {
        return (None, None);
    }
    let mut parts = basename.split('_');
    let review_label = parts.next().map(str::to_string);
    let target_class = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
    (review_label, target_class)
}

// ============================================================================
// Tests
// ============================================================================
