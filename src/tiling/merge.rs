//! Combining tile-local documents into one whole-image document.

use log::info;
use serde_json::Value;

use super::nms::suppress;
use crate::error::TileLabelError;
use crate::ir::{Detection, Document, Image, Metadata};

/// Metadata key holding the number of merged tiles.
pub const META_NUM_TILES: &str = "num_tiles";
/// Metadata key holding the number of detections kept after NMS.
pub const META_TOTAL_DETECTIONS: &str = "total_detections";

/// One tile's prediction, in tile-local coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct TileResult {
    pub document: Document,
    pub x_offset: u32,
    pub y_offset: u32,
}

impl TileResult {
    pub fn new(document: Document, x_offset: u32, y_offset: u32) -> Self {
        Self {
            document,
            x_offset,
            y_offset,
        }
    }
}

/// Merges per-tile documents into one document over the original image.
///
/// Every detection is shifted by its tile's offset. Categories are unified
/// by name across every tile's category table and numbered from 1 in
/// lexicographic name order, so the same label under different tile-local
/// ids ends up as one category. All detections then go through
/// [`suppress`] with `iou_threshold`, and the survivors are numbered 1.. in
/// score-descending order.
///
/// The result describes image 1 with the original size and an empty file
/// name. Its metadata is that of the first tile that carried any, with
/// `num_tiles` and `total_detections` overwritten.
///
/// # Errors
///
/// Returns [`TileLabelError::InvalidTileConfig`] if `iou_threshold` is not
/// in `[0, 1]`.
pub fn combine(
    tile_results: &[TileResult],
    original_width: u32,
    original_height: u32,
    iou_threshold: f64,
) -> Result<Document, TileLabelError> {
    let mut metadata = tile_results
        .iter()
        .map(|tile| &tile.document.metadata)
        .find(|metadata| !metadata.is_empty())
        .cloned()
        .unwrap_or_else(Metadata::new);

    let mut detections: Vec<Detection> = Vec::new();
    for tile in tile_results {
        let dx = f64::from(tile.x_offset);
        let dy = f64::from(tile.y_offset);
        for annotation in &tile.document.annotations {
            let mut detection = annotation.detection.clone();
            // Names come from the tile's own category table; the copy on
            // the detection is only a fallback.
            if let Some(name) = tile.document.category_name(annotation.category_id) {
                detection.category = name.to_string();
            }
            detection.bbox = detection.bbox.translate(dx, dy);
            detections.push(detection);
        }
    }
    let total_before = detections.len();

    let mut document = Document::new(Image::new(1u64, "", original_width, original_height));

    // Declared categories count even when no detection in the tile uses them.
    let mut names: Vec<&str> = tile_results
        .iter()
        .flat_map(|tile| tile.document.categories.iter().map(|c| c.name.as_str()))
        .chain(detections.iter().map(|d| d.category.as_str()))
        .collect();
    names.sort_unstable();
    names.dedup();
    for name in names {
        document.intern_category(name);
    }

    for detection in suppress(detections, iou_threshold)? {
        document.push(detection);
    }

    metadata.insert(META_NUM_TILES.to_string(), Value::from(tile_results.len()));
    metadata.insert(META_TOTAL_DETECTIONS.to_string(), Value::from(document.len()));
    document.metadata = metadata;

    info!(
        "merged {} tiles: kept {} of {} detections",
        tile_results.len(),
        document.len(),
        total_before
    );
    Ok(document)
}
