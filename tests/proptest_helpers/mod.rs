#![allow(dead_code)]

use tilelabel::config::TilingConfig;
use tilelabel::ir::{BBoxXYWH, Detection, Document, Image, Pixel};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub const EPS_EXCHANGE: f64 = 1e-9;
pub const EPS_BINARY: f64 = 1e-6;
pub const EPS_LABEL_STUDIO: f64 = 1e-6;
pub const EPS_VOC: f64 = 1e-9;

pub const LABELS: [&str; 5] = ["a", "cat", "dog", "jieba", "zebra"];

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// What a detection means, independent of ids.
#[derive(Clone, Debug, PartialEq)]
pub struct DetSem {
    pub category: String,
    pub bbox: [f64; 4],
    pub score: f64,
}

pub fn det_semantics(doc: &Document) -> Vec<DetSem> {
    doc.detections()
        .map(|d| DetSem {
            category: d.category.clone(),
            bbox: d.bbox.to_array(),
            score: d.score,
        })
        .collect()
}

/// Compares detections in order: same labels, boxes and scores within `eps`.
pub fn assert_detections_equivalent(a: &Document, b: &Document, eps: f64) -> Result<(), String> {
    let left = det_semantics(a);
    let right = det_semantics(b);
    if left.len() != right.len() {
        return Err(format!(
            "detection count mismatch: left={} right={}",
            left.len(),
            right.len()
        ));
    }

    for (idx, (l, r)) in left.iter().zip(&right).enumerate() {
        if l.category != r.category {
            return Err(format!(
                "detection {idx}: category '{}' vs '{}'",
                l.category, r.category
            ));
        }
        let box_close = l.bbox.iter().zip(&r.bbox).all(|(x, y)| (x - y).abs() <= eps);
        if !box_close {
            return Err(format!("detection {idx}: bbox {:?} vs {:?}", l.bbox, r.bbox));
        }
        if (l.score - r.score).abs() > eps {
            return Err(format!("detection {idx}: score {} vs {}", l.score, r.score));
        }
    }
    Ok(())
}

pub fn category_names(doc: &Document) -> Vec<String> {
    doc.categories.iter().map(|c| c.name.clone()).collect()
}

pub fn arb_label() -> impl Strategy<Value = String> {
    prop::sample::select(LABELS.to_vec()).prop_map(str::to_string)
}

/// A box inside a `width` x `height` image with fractional coordinates.
pub fn arb_bbox_in(width: u32, height: u32) -> BoxedStrategy<BBoxXYWH<Pixel>> {
    let (w, h) = (f64::from(width), f64::from(height));
    (0.0..w - 1.0, 0.0..h - 1.0)
        .prop_flat_map(move |(x, y)| (Just(x), Just(y), 0.5..=(w - x), 0.5..=(h - y)))
        .prop_map(|(x, y, bw, bh)| BBoxXYWH::new(x, y, bw, bh))
        .boxed()
}

/// A box inside a `width` x `height` image with whole-pixel corners.
pub fn arb_integral_bbox_in(width: u32, height: u32) -> BoxedStrategy<BBoxXYWH<Pixel>> {
    (0..width - 1, 0..height - 1)
        .prop_flat_map(move |(x, y)| (Just(x), Just(y), 1..=(width - x), 1..=(height - y)))
        .prop_map(|(x, y, bw, bh)| {
            BBoxXYWH::new(f64::from(x), f64::from(y), f64::from(bw), f64::from(bh))
        })
        .boxed()
}

/// Scores with at most four decimals, so text formats keep them exactly.
pub fn arb_score() -> impl Strategy<Value = f64> {
    (0u32..=10_000).prop_map(|n| f64::from(n) / 10_000.0)
}

/// A free-floating box for geometry properties; may be degenerate.
pub fn arb_any_bbox() -> impl Strategy<Value = BBoxXYWH<Pixel>> {
    (-100.0..1000.0f64, -100.0..1000.0f64, 0.0..300.0f64, 0.0..300.0f64)
        .prop_map(|(x, y, w, h)| BBoxXYWH::new(x, y, w, h))
}

pub fn arb_detection_list(max_dets: usize) -> BoxedStrategy<Vec<Detection>> {
    prop::collection::vec(
        (arb_label(), arb_any_bbox(), 0.0..=1.0f64)
            .prop_map(|(label, bbox, score)| Detection::new(bbox, label, score)),
        0..=max_dets,
    )
    .boxed()
}

/// A document on an image of random size with up to `max_dets` detections.
///
/// With `integral` set, boxes have whole-pixel corners; scores always have
/// at most four decimals.
pub fn arb_document(max_dets: usize, integral: bool) -> BoxedStrategy<Document> {
    (16u32..2048, 16u32..2048, 0u32..1000)
        .prop_flat_map(move |(width, height, name)| {
            let bbox = if integral {
                arb_integral_bbox_in(width, height)
            } else {
                arb_bbox_in(width, height)
            };
            let detections = prop::collection::vec((arb_label(), bbox, arb_score()), 0..=max_dets);
            (Just(width), Just(height), Just(name), detections)
        })
        .prop_map(|(width, height, name, detections)| {
            let mut doc = Document::new(Image::new(1u64, format!("img_{name}.jpg"), width, height));
            for (label, bbox, score) in detections {
                doc.push(Detection::new(bbox, label, score));
            }
            doc
        })
        .boxed()
}

/// A tiling configuration that always validates.
pub fn arb_tiling_config() -> impl Strategy<Value = TilingConfig> {
    (8u32..600, 8u32..600)
        .prop_flat_map(|(tile_width, tile_height)| {
            (
                Just(tile_width),
                Just(tile_height),
                0..tile_width.min(tile_height),
            )
        })
        .prop_map(|(tile_width, tile_height, overlap)| TilingConfig {
            tile_width,
            tile_height,
            overlap,
            ..TilingConfig::default()
        })
}
