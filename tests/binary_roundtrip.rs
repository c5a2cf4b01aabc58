//! Integration tests for the vendor Binary suggestion format.

use serde_json::Value;
use tilelabel::ir::io_binary_json::{
    from_binary_str, read_binary_json, to_binary_string, write_binary_json,
};
use tilelabel::ir::EXTRA_PICTURE_ID;
use tilelabel::TileLabelError;

mod common;

#[test]
fn fixture_flattens_groups_and_converts_corners() {
    let doc = read_binary_json(&common::fixture("sample.binary.json")).expect("read fixture");

    assert_eq!(common::labels(&doc), vec!["crack", "spot", "crack"]);
    assert_eq!(
        common::boxes(&doc),
        vec![
            [10.0, 20.0, 30.0, 40.0],
            [50.0, 50.0, 5.0, 8.0],
            [0.0, 0.0, 12.0, 12.0]
        ]
    );
    assert_eq!(doc.categories.len(), 2);
    assert_eq!(
        doc.annotations[2].detection.extra.get(EXTRA_PICTURE_ID),
        Some(&Value::from("p2"))
    );
    assert_eq!(doc.metadata.get("total_time"), Some(&Value::from(0.42)));
    assert_eq!((doc.image.width, doc.image.height), (0, 0));
}

#[test]
fn file_roundtrip_rebuilds_picture_groups() {
    let original = read_binary_json(&common::fixture("sample.binary.json")).expect("read");
    let temp = tempfile::tempdir().expect("create temp dir");
    let path = temp.path().join("out.json");

    write_binary_json(&path, &original).expect("write");
    let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

    let groups = raw["suggestion"].as_array().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].as_array().unwrap().len(), 2);
    assert_eq!(groups[1][0]["Picture_id"], "p2");
    assert_eq!(groups[0][0]["Box"]["x2"], 40.0);
    assert_eq!(raw["result"], "success");
    assert_eq!(raw["total_time"], 0.42);

    let restored = read_binary_json(&path).expect("read back");
    assert_eq!(common::boxes(&restored), common::boxes(&original));
}

#[test]
fn detections_without_picture_id_share_one_group() {
    let doc = common::street_document();
    let raw: Value = serde_json::from_str(&to_binary_string(&doc).unwrap()).unwrap();

    let groups = raw["suggestion"].as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].as_array().unwrap().len(), 3);
    assert!(groups[0][0].get("Picture_id").is_none());
    assert_eq!(groups[0][1]["Class"], "car");
    assert_eq!(groups[0][1]["Box"]["x2"], 340.0);
}

#[test]
fn malformed_entry_is_skipped_not_fatal() {
    let json = r#"{"suggestion": [[
        {"Box": {"x1": 1, "y1": 1, "x2": 2, "y2": 2}, "Class": "ok", "Scores": 0.3},
        {"Box": {"x1": "one"}, "Class": "bad"},
        {"Box": {"x1": 0, "y1": 0, "x2": 1, "y2": 1}}
    ], "not a group"]}"#;
    let doc = from_binary_str(json).expect("parse");
    assert_eq!(common::labels(&doc), vec!["ok"]);
    assert_eq!(doc.metadata.get("result"), Some(&Value::from("success")));
}

#[test]
fn missing_suggestion_is_schema_error() {
    let err = from_binary_str(r#"{"result": "success"}"#).unwrap_err();
    assert!(matches!(err, TileLabelError::SchemaInvalid { .. }), "{err}");
}
