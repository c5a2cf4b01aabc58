use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationReport;

/// Boxed error returned by a prediction collaborator.
pub type PredictError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for tilelabel operations.
#[derive(Debug, Error)]
pub enum TileLabelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {format} JSON from {path}: {source}")]
    JsonParse {
        format: &'static str,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write {format} JSON to {path}: {source}")]
    JsonWrite {
        format: &'static str,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse XML from {path}: {message}")]
    XmlParse { path: PathBuf, message: String },

    #[error("Invalid {format} payload in {path}: {message}")]
    SchemaInvalid {
        format: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("Cannot convert document to {format}: {message}")]
    ConversionFailed {
        format: &'static str,
        message: String,
    },

    #[error("Invalid tile configuration: {0}")]
    InvalidTileConfig(String),

    #[error("Prediction failed for tile {tile_index} at ({x_offset}, {y_offset}): {source}")]
    PredictionFailed {
        tile_index: usize,
        x_offset: u32,
        y_offset: u32,
        #[source]
        source: PredictError,
    },

    #[error("Failed to decode image: {0}")]
    ImageDecode(#[source] image::ImageError),

    #[error("Failed to encode tile {tile_index}: {source}")]
    ImageEncode {
        tile_index: usize,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to read image size from {path}: {message}")]
    ImageSize { path: PathBuf, message: String },

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to parse config from {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Validation failed with {error_count} error(s) and {warning_count} warning(s)")]
    ValidationFailed {
        error_count: usize,
        warning_count: usize,
        report: ValidationReport,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}
