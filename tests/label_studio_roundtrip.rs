//! Integration tests for Label Studio task JSON support.

use serde_json::Value;
use tilelabel::ir::io_label_studio_json::{
    read_label_studio_json, write_label_studio_json, LabelStudioConverter, OutputMode,
};
use tilelabel::TileLabelError;

mod common;

#[test]
fn fixture_reads_first_label_and_scales_percentages() {
    let doc = read_label_studio_json(&common::fixture("sample.label_studio.json")).expect("read");

    assert_eq!(doc.image.file_name, "FN_scratch_0001.jpg");
    assert_eq!((doc.image.width, doc.image.height), (400, 200));
    assert_eq!(common::labels(&doc), vec!["scratch"]);
    common::assert_boxes_close(&common::boxes(&doc), &[[40.0, 40.0, 100.0, 100.0]], 1e-9);
    assert_eq!(doc.annotations[0].detection.score, 0.8);
}

#[test]
fn file_roundtrip_with_prefix_and_review_metadata() {
    let original = read_label_studio_json(&common::fixture("sample.label_studio.json")).expect("read");
    let temp = tempfile::tempdir().expect("create temp dir");
    let path = temp.path().join("task.json");

    let converter = LabelStudioConverter::new(OutputMode::Annotations, "http://host/img/");
    write_label_studio_json(&path, &original, &converter).expect("write");

    let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["data"]["image"], "http://host/img/FN_scratch_0001.jpg");
    assert_eq!(raw["data"]["review_label"], "FN");
    assert_eq!(raw["data"]["target_class"], "scratch");
    assert_eq!(raw["data"]["label"], "scratch");
    let result = &raw["annotations"][0]["result"][0];
    assert_eq!(result["type"], "rectanglelabels");
    assert_eq!(result["value"]["rectanglelabels"][0], "scratch");
    assert_eq!(result["original_width"], 400);
    assert!(raw.get("predictions").is_none());

    let restored = read_label_studio_json(&path).expect("read back");
    common::assert_boxes_close(&common::boxes(&restored), &common::boxes(&original), 1e-9);
    assert_eq!(restored.image, original.image);
}

#[test]
fn predictions_mode_writes_predictions_key() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let path = temp.path().join("task.json");
    let converter = LabelStudioConverter::new(OutputMode::Predictions, "");

    write_label_studio_json(&path, &common::street_document(), &converter).expect("write");
    let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

    assert!(raw.get("annotations").is_none());
    let results = raw["predictions"][0]["result"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[1]["value"]["rotation"], 12.5);
    assert_eq!(raw["data"]["label"], "car, person");

    let restored = read_label_studio_json(&path).expect("read back");
    assert_eq!(restored.annotations[1].detection.angle(), Some(12.5));
    common::assert_boxes_close(
        &common::boxes(&restored),
        &common::boxes(&common::street_document()),
        1e-9,
    );
}

#[test]
fn document_without_size_cannot_be_written() {
    let mut doc = common::street_document();
    doc.image.width = 0;
    let temp = tempfile::tempdir().expect("create temp dir");

    let err = write_label_studio_json(
        &temp.path().join("task.json"),
        &doc,
        &LabelStudioConverter::default(),
    )
    .unwrap_err();
    assert!(matches!(err, TileLabelError::ConversionFailed { .. }), "{err}");
}
