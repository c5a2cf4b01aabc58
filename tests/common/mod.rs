#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tilelabel::ir::{BBoxXYWH, Detection, Document, Image};

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Writes a black RGB PNG; only its header matters to most callers.
pub fn write_png(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    image::RgbImage::new(width, height)
        .save(path)
        .expect("write png file");
}

/// A 640x480 document with two labels and one rotated box.
pub fn street_document() -> Document {
    let mut doc = Document::new(Image::new(1u64, "street.jpg", 640, 480));
    doc.push(Detection::new(
        BBoxXYWH::new(10.0, 20.0, 90.0, 180.0),
        "person",
        0.92,
    ));
    doc.push(
        Detection::new(BBoxXYWH::new(300.0, 200.0, 40.0, 30.0), "car", 0.41)
            .with_extra(tilelabel::ir::EXTRA_ANGLE, 12.5),
    );
    doc.push(Detection::new(
        BBoxXYWH::new(500.0, 100.0, 20.0, 60.0),
        "person",
        0.66,
    ));
    doc
}

pub fn boxes(doc: &Document) -> Vec<[f64; 4]> {
    doc.detections().map(|d| d.bbox.to_array()).collect()
}

pub fn labels(doc: &Document) -> Vec<&str> {
    doc.detections().map(|d| d.category.as_str()).collect()
}

pub fn assert_boxes_close(left: &[[f64; 4]], right: &[[f64; 4]], eps: f64) {
    assert_eq!(left.len(), right.len(), "box count differs");
    for (idx, (a, b)) in left.iter().zip(right).enumerate() {
        for k in 0..4 {
            assert!(
                (a[k] - b[k]).abs() <= eps,
                "box {idx} differs: {a:?} vs {b:?}"
            );
        }
    }
}
