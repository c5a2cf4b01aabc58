//! Greedy non-maximum suppression over exchange detections.

use log::debug;

use crate::config::validate_iou_threshold;
use crate::error::TileLabelError;
use crate::geometry::iou;
use crate::ir::Detection;

/// Returns the indices of the detections that survive NMS, in score
/// descending order.
///
/// Detections are visited by score, highest first; ties keep their input
/// order. Each kept detection suppresses every remaining one whose IoU
/// with it is `>= iou_threshold`. Suppressed detections are never
/// reconsidered. Categories are ignored: two overlapping boxes of different
/// classes still suppress each other.
///
/// # Errors
///
/// Returns [`TileLabelError::InvalidTileConfig`] if `iou_threshold` is not
/// in `[0, 1]`.
///
/// # Examples
///
/// ```
/// use tilelabel::ir::{BBoxXYWH, Detection};
/// use tilelabel::tiling::nms::non_maximum_suppression;
///
/// let detections = vec![
///     Detection::new(BBoxXYWH::new(10.0, 10.0, 40.0, 40.0), "a", 0.9),
///     Detection::new(BBoxXYWH::new(15.0, 15.0, 40.0, 40.0), "a", 0.8),
///     Detection::new(BBoxXYWH::new(100.0, 100.0, 50.0, 50.0), "a", 0.95),
/// ];
///
/// let keep = non_maximum_suppression(&detections, 0.5).unwrap();
/// assert_eq!(keep, vec![2, 0]);
/// ```
pub fn non_maximum_suppression(
    detections: &[Detection],
    iou_threshold: f64,
) -> Result<Vec<usize>, TileLabelError> {
    validate_iou_threshold(iou_threshold)?;

    let mut order: Vec<usize> = (0..detections.len()).collect();
    // `sort_by` is stable, so equal scores stay in input order.
    order.sort_by(|&a, &b| detections[b].score.total_cmp(&detections[a].score));

    let mut suppressed = vec![false; detections.len()];
    let mut keep = Vec::new();

    for (rank, &idx) in order.iter().enumerate() {
        if suppressed[idx] {
            continue;
        }
        keep.push(idx);

        let kept_box = &detections[idx].bbox;
        for &other in &order[rank + 1..] {
            if !suppressed[other] && iou(kept_box, &detections[other].bbox) >= iou_threshold {
                suppressed[other] = true;
            }
        }
    }

    debug!(
        "NMS kept {} of {} detections at IoU threshold {iou_threshold}",
        keep.len(),
        detections.len()
    );
    Ok(keep)
}

/// Runs [`non_maximum_suppression`] and returns the survivors by value.
pub fn suppress(
    detections: Vec<Detection>,
    iou_threshold: f64,
) -> Result<Vec<Detection>, TileLabelError> {
    let keep = non_maximum_suppression(&detections, iou_threshold)?;
    let mut slots: Vec<Option<Detection>> = detections.into_iter().map(Some).collect();
    Ok(keep.into_iter().filter_map(|idx| slots[idx].take()).collect())
}
