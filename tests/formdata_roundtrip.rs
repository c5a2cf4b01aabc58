//! Integration tests for the vendor FormData format.

use serde_json::Value;
use tilelabel::ir::io_formdata_json::{
    from_formdata_str, read_formdata_json, to_formdata_string, write_formdata_json,
};
use tilelabel::ir::EXTRA_ANGLE;
use tilelabel::TileLabelError;

mod common;

#[test]
fn minimal_response_converts_to_one_annotation() {
    let json = r#"{"result":[{"RegisterMatrix":[[1,0,0],[0,1,0],[0,0,1]]},{"Box":{"X":10,"Y":10,"Width":5,"Height":5,"Angle":0},"Score":0.9,"label":"a"}],"image_width":100,"image_height":100}"#;
    let doc = from_formdata_str(json).expect("parse formdata");

    assert_eq!(doc.len(), 1);
    let annotation = &doc.annotations[0];
    assert_eq!(annotation.detection.bbox.to_array(), [10.0, 10.0, 5.0, 5.0]);
    assert_eq!(annotation.detection.bbox.area(), 25.0);
    assert_eq!(annotation.detection.score, 0.9);
    assert!(annotation.detection.extra.is_empty());
    assert_eq!(doc.categories.len(), 1);
    assert_eq!(doc.categories[0].name, "a");
    assert_eq!((doc.image.width, doc.image.height), (100, 100));
}

#[test]
fn fixture_skips_matrix_and_malformed_entries() {
    let doc = read_formdata_json(&common::fixture("sample.formdata.json")).expect("read fixture");

    assert_eq!(common::labels(&doc), vec!["a", "jieba"]);
    assert_eq!(doc.annotations[1].detection.angle(), Some(15.0));
    assert_eq!(
        doc.metadata.get("dataset_id"),
        Some(&Value::from("1377606572385112064"))
    );
    assert_eq!(doc.metadata.get("total_detections"), Some(&Value::from(2)));
}

#[test]
fn file_roundtrip_keeps_boxes_angle_and_metadata() {
    let original = read_formdata_json(&common::fixture("sample.formdata.json")).expect("read");
    let temp = tempfile::tempdir().expect("create temp dir");
    let path = temp.path().join("out.json");

    write_formdata_json(&path, &original).expect("write");
    let restored = read_formdata_json(&path).expect("read back");

    assert_eq!(common::boxes(&restored), common::boxes(&original));
    assert_eq!(restored.annotations[1].detection.extra.get(EXTRA_ANGLE), Some(&Value::from(15.0)));
    assert_eq!(restored.metadata, original.metadata);

    let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(raw["result"][0].get("RegisterMatrix").is_some());
    assert_eq!(raw["result"][2]["Box"]["Angle"], 15.0);
}

#[test]
fn exchange_document_writes_labels_and_scores() {
    let doc = common::street_document();
    let raw: Value = serde_json::from_str(&to_formdata_string(&doc).unwrap()).unwrap();

    let result = raw["result"].as_array().unwrap();
    assert_eq!(result.len(), 4);
    assert_eq!(result[1]["label"], "person");
    assert_eq!(result[1]["Score"], 0.92);
    assert_eq!(result[2]["Box"]["Angle"], 12.5);
    assert_eq!(raw["image_width"], 640);
}

#[test]
fn missing_label_and_score_use_defaults() {
    let doc = from_formdata_str(r#"{"result":[{"Box":{"X":1,"Y":2,"Width":3,"Height":4}}]}"#)
        .expect("parse");
    assert_eq!(doc.annotations[0].detection.category, "unknown");
    assert_eq!(doc.annotations[0].detection.score, 0.0);
    assert_eq!((doc.image.width, doc.image.height), (0, 0));
}

#[test]
fn missing_result_is_schema_error() {
    let err = from_formdata_str(r#"{"image_width": 10}"#).unwrap_err();
    assert!(matches!(err, TileLabelError::SchemaInvalid { .. }), "{err}");
}

#[test]
fn broken_json_is_parse_error() {
    let err = from_formdata_str(r#"{"result": [}"#).unwrap_err();
    assert!(matches!(err, TileLabelError::JsonParse { .. }), "{err}");
}
