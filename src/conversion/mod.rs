//! Format dispatch and conversion lossiness reporting.
//!
//! Conversions always pass through the exchange [`Document`]. Before a
//! document is written to a target schema, [`build_conversion_report`]
//! describes what that schema cannot carry and which policies the readers
//! and writers apply.

pub mod report;

pub use report::{
    ConversionCounts, ConversionIssue, ConversionIssueCode, ConversionReport, ConversionSeverity,
};

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::TileLabelError;
use crate::ir::io_label_studio_json::{LabelStudioConverter, OutputMode};
use crate::ir::{
    io_binary_json, io_coco_json, io_formdata_json, io_label_studio_json, io_voc_xml, Document,
    EXTRA_ANGLE, EXTRA_PICTURE_ID,
};

/// Schema identifier, decoupled from the CLI's argument parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Exchange,
    FormData,
    Binary,
    Voc,
    LabelStudio,
}

impl Format {
    pub fn name(&self) -> &'static str {
        match self {
            Format::Exchange => "exchange",
            Format::FormData => "formdata",
            Format::Binary => "binary",
            Format::Voc => "voc",
            Format::LabelStudio => "label-studio",
        }
    }

    /// Document metadata keys the schema can carry; `None` means all.
    fn metadata_keys(&self) -> Option<&'static [&'static str]> {
        match self {
            Format::Exchange => None,
            Format::FormData => Some(&["dataset_id", "num_tiles", "total_detections"]),
            Format::Binary => Some(&["result", "total_time"]),
            Format::Voc | Format::LabelStudio => Some(&[]),
        }
    }

    /// Detection `extra` keys the schema can carry; `None` means all.
    fn extra_keys(&self) -> Option<&'static [&'static str]> {
        match self {
            Format::Exchange => None,
            Format::FormData | Format::LabelStudio => Some(&[EXTRA_ANGLE]),
            Format::Binary => Some(&[EXTRA_PICTURE_ID]),
            Format::Voc => Some(&["pose", "truncated", "difficult"]),
        }
    }
}

/// Writer settings that only some schemas use.
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    pub output_mode: OutputMode,
    /// Prefix for Label Studio `data.image`.
    pub prefix: String,
}

/// Reads a native file of `format` into an exchange document.
pub fn read_document(path: &Path, format: Format) -> Result<Document, TileLabelError> {
    match format {
        Format::Exchange => io_coco_json::read_coco_json(path),
        Format::FormData => io_formdata_json::read_formdata_json(path),
        Format::Binary => io_binary_json::read_binary_json(path),
        Format::Voc => io_voc_xml::read_voc_xml(path),
        Format::LabelStudio => io_label_studio_json::read_label_studio_json(path),
    }
}

/// Writes an exchange document as a native file of `format`.
pub fn write_document(
    path: &Path,
    document: &Document,
    format: Format,
    options: &WriteOptions,
) -> Result<(), TileLabelError> {
    match format {
        Format::Exchange => io_coco_json::write_coco_json(path, document),
        Format::FormData => io_formdata_json::write_formdata_json(path, document),
        Format::Binary => io_binary_json::write_binary_json(path, document),
        Format::Voc => io_voc_xml::write_voc_xml(path, document),
        Format::LabelStudio => {
            let converter = LabelStudioConverter::new(options.output_mode, options.prefix.clone());
            io_label_studio_json::write_label_studio_json(path, document, &converter)
        }
    }
}

/// Describes what writing `document` (read from `from`) as `to` will lose
/// and which policies apply.
pub fn build_conversion_report(document: &Document, from: Format, to: Format) -> ConversionReport {
    let mut report = ConversionReport::new(from.name(), to.name());

    report.input = ConversionCounts {
        detections: document.len(),
        categories: document.categories.len(),
    };
    report.output = ConversionCounts {
        detections: document.len(),
        categories: if to == Format::Exchange {
            document.categories.len()
        } else {
            document.label_names().len()
        },
    };

    if to != Format::Exchange {
        analyze_category_ids(document, &mut report);
    }
    analyze_extra(document, to, &mut report);
    analyze_metadata(document, to, &mut report);

    match to {
        Format::Exchange => {}
        Format::FormData => {
            if !document.image.file_name.is_empty() {
                report.add(ConversionIssue::warning(
                    ConversionIssueCode::DropImageFileName,
                    format!("image file name '{}' will be dropped", document.image.file_name),
                ));
            }
            report.add(ConversionIssue::info(
                ConversionIssueCode::FormDataIdentityRegisterMatrix,
                "FormData writer emits an identity RegisterMatrix before the boxes",
            ));
        }
        Format::Binary => {
            if !document.image.file_name.is_empty() {
                report.add(ConversionIssue::warning(
                    ConversionIssueCode::DropImageFileName,
                    format!("image file name '{}' will be dropped", document.image.file_name),
                ));
            }
            if document.image.width > 0 || document.image.height > 0 {
                report.add(ConversionIssue::warning(
                    ConversionIssueCode::DropImageSize,
                    format!(
                        "image size {}x{} will be dropped",
                        document.image.width, document.image.height
                    ),
                ));
            }
            report.add(ConversionIssue::info(
                ConversionIssueCode::BinaryGroupsByPictureId,
                "Binary writer groups suggestions by picture id in first-seen order",
            ));
        }
        Format::Voc => analyze_to_voc(document, &mut report),
        Format::LabelStudio => {
            let image = &document.image;
            if !document.is_empty() && (image.width == 0 || image.height == 0) {
                report.add(ConversionIssue::warning(
                    ConversionIssueCode::LabelStudioMissingImageSize,
                    format!(
                        "{} detection(s) cannot be expressed as percentages of a {}x{} image",
                        document.len(),
                        image.width,
                        image.height
                    ),
                ));
            }
            if document.detections().any(|d| d.angle().is_some()) {
                add_rotation_policy(&mut report);
            }
        }
    }

    if from != Format::Exchange {
        report.add(ConversionIssue::info(
            ConversionIssueCode::ReaderCategoryIdAssignment,
            format!(
                "{} reader assigns category ids from 1 in first-seen order",
                from.name()
            ),
        ));
    }
    if from == Format::LabelStudio {
        report.add(ConversionIssue::info(
            ConversionIssueCode::LabelStudioFirstLabelWins,
            "Label Studio reader keeps the first label of a multi-label rectangle",
        ));
        report.add(ConversionIssue::info(
            ConversionIssueCode::LabelStudioSkipsOtherResults,
            "Label Studio reader skips results that are not rectanglelabels",
        ));
        if !report.has_code(ConversionIssueCode::RotationNotApplied) {
            add_rotation_policy(&mut report);
        }
    }

    report
}

/// Ids survive a name-keyed schema only if they already are the
/// first-seen numbering of the labels in use.
fn analyze_category_ids(document: &Document, report: &mut ConversionReport) {
    let mut seen: Vec<&str> = Vec::new();
    for detection in document.detections() {
        if !seen.contains(&detection.category.as_str()) {
            seen.push(&detection.category);
        }
    }

    let renumbered = document.categories.len() != seen.len()
        || document
            .categories
            .iter()
            .zip(&seen)
            .enumerate()
            .any(|(idx, (category, name))| {
                category.id.as_u64() != idx as u64 + 1 || category.name != *name
            });

    if renumbered {
        let unused = document.categories.len().saturating_sub(seen.len());
        let mut message = "category ids are not carried; names will be renumbered on read".to_string();
        if unused > 0 {
            message.push_str(&format!(" and {unused} unused category(s) dropped"));
        }
        report.add(ConversionIssue::warning(
            ConversionIssueCode::DropCategoryIds,
            message,
        ));
    }
}

fn analyze_extra(document: &Document, to: Format, report: &mut ConversionReport) {
    let Some(allowed) = to.extra_keys() else {
        return;
    };

    let count_with = |key: &str| {
        document
            .detections()
            .filter(|d| d.extra.contains_key(key))
            .count()
    };

    for (key, code) in [
        (EXTRA_ANGLE, ConversionIssueCode::DropAngle),
        (EXTRA_PICTURE_ID, ConversionIssueCode::DropPictureId),
    ] {
        if allowed.contains(&key) {
            continue;
        }
        let count = count_with(key);
        if count > 0 {
            report.add(ConversionIssue::warning(
                code,
                format!("{count} detection(s) carry '{key}', which {} cannot store", to.name()),
            ));
        }
    }

    let other_keys: BTreeSet<&str> = document
        .detections()
        .flat_map(|d| d.extra.keys())
        .map(String::as_str)
        .filter(|key| *key != EXTRA_ANGLE && *key != EXTRA_PICTURE_ID && !allowed.contains(key))
        .collect();
    if !other_keys.is_empty() {
        let keys: Vec<&str> = other_keys.into_iter().collect();
        report.add(ConversionIssue::warning(
            ConversionIssueCode::DropDetectionExtra,
            format!("detection field(s) {} will be dropped", keys.join(", ")),
        ));
    }
}

fn analyze_metadata(document: &Document, to: Format, report: &mut ConversionReport) {
    let Some(allowed) = to.metadata_keys() else {
        return;
    };
    let dropped: Vec<&str> = document
        .metadata
        .keys()
        .map(String::as_str)
        .filter(|key| !allowed.contains(key))
        .collect();
    if !dropped.is_empty() {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::DropDocumentMetadata,
            format!("metadata key(s) {} will be dropped", dropped.join(", ")),
        ));
    }
}

fn analyze_to_voc(document: &Document, report: &mut ConversionReport) {
    let fractional = document
        .detections()
        .filter(|d| {
            let (x1, y1, x2, y2) = d.bbox.to_xyxy();
            [x1, y1, x2, y2].iter().any(|v| v.fract() != 0.0)
        })
        .count();
    if fractional > 0 {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::VocRoundsCoordinates,
            format!("{fractional} detection(s) have fractional corners that will be rounded"),
        ));
    }

    let precise = document
        .detections()
        .filter(|d| {
            let scaled = d.score * 1e4;
            (scaled - scaled.round()).abs() > 1e-6
        })
        .count();
    if precise > 0 {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::VocConfidencePrecision,
            format!("{precise} score(s) will be written with 4 decimal places"),
        ));
    }
}

fn add_rotation_policy(report: &mut ConversionReport) {
    report.add(ConversionIssue::info(
        ConversionIssueCode::RotationNotApplied,
        "rotation is carried as an angle; boxes stay axis-aligned",
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BBoxXYWH, Category, Detection, Image};
    use serde_json::Value;

    fn sample_document() -> Document {
        let mut doc = Document::new(Image::new(1u64, "img.jpg", 100, 100));
        doc.push(
            Detection::new(BBoxXYWH::new(10.5, 10.0, 20.0, 20.0), "cat", 0.91234)
                .with_extra(EXTRA_ANGLE, 15.0)
                .with_extra(EXTRA_PICTURE_ID, 2)
                .with_extra("tracker", "t-1"),
        );
        doc.push(Detection::new(BBoxXYWH::new(0.0, 0.0, 5.0, 5.0), "dog", 0.5));
        doc.metadata.insert("dataset_id".into(), Value::from("ds"));
        doc.metadata.insert("source".into(), Value::from("unit"));
        doc
    }

    #[test]
    fn to_exchange_is_not_lossy() {
        let report = build_conversion_report(&sample_document(), Format::Exchange, Format::Exchange);
        assert!(!report.is_lossy());
        assert_eq!(report.info_count(), 0);
        assert_eq!(report.output, report.input);
    }

    #[test]
    fn to_voc_detects_all_lossiness() {
        let report = build_conversion_report(&sample_document(), Format::Exchange, Format::Voc);

        for code in [
            ConversionIssueCode::DropAngle,
            ConversionIssueCode::DropPictureId,
            ConversionIssueCode::DropDetectionExtra,
            ConversionIssueCode::DropDocumentMetadata,
            ConversionIssueCode::VocRoundsCoordinates,
            ConversionIssueCode::VocConfidencePrecision,
        ] {
            assert!(report.has_code(code), "missing {code:?}");
        }
        assert!(!report.has_code(ConversionIssueCode::DropCategoryIds));
    }

    #[test]
    fn to_formdata_keeps_angle_and_known_metadata() {
        let report = build_conversion_report(&sample_document(), Format::Exchange, Format::FormData);

        assert!(!report.has_code(ConversionIssueCode::DropAngle));
        assert!(report.has_code(ConversionIssueCode::DropPictureId));
        let metadata_issue = report
            .issues
            .iter()
            .find(|i| i.code == ConversionIssueCode::DropDocumentMetadata)
            .expect("metadata issue");
        assert!(metadata_issue.message.contains("source"));
        assert!(!metadata_issue.message.contains("dataset_id"));
        assert!(report.has_code(ConversionIssueCode::FormDataIdentityRegisterMatrix));
    }

    #[test]
    fn to_binary_drops_image_size_keeps_picture_id() {
        let report = build_conversion_report(&sample_document(), Format::Exchange, Format::Binary);
        assert!(report.has_code(ConversionIssueCode::DropImageSize));
        assert!(!report.has_code(ConversionIssueCode::DropPictureId));
        assert!(report.has_code(ConversionIssueCode::DropAngle));
    }

    #[test]
    fn to_label_studio_without_size_is_flagged() {
        let mut doc = sample_document();
        doc.image.width = 0;
        let report = build_conversion_report(&doc, Format::Exchange, Format::LabelStudio);
        assert!(report.has_code(ConversionIssueCode::LabelStudioMissingImageSize));
        assert!(report.has_code(ConversionIssueCode::RotationNotApplied));
    }

    #[test]
    fn unused_or_reordered_categories_are_reported() {
        let mut doc = sample_document();
        doc.categories.push(Category::new(9u64, "unused"));
        let report = build_conversion_report(&doc, Format::Exchange, Format::FormData);

        assert!(report.has_code(ConversionIssueCode::DropCategoryIds));
        assert_eq!(report.input.categories, 3);
        assert_eq!(report.output.categories, 2);
    }

    #[test]
    fn label_studio_source_adds_policy_notes() {
        let report =
            build_conversion_report(&Document::default(), Format::LabelStudio, Format::Exchange);
        assert!(report.has_code(ConversionIssueCode::ReaderCategoryIdAssignment));
        assert!(report.has_code(ConversionIssueCode::LabelStudioFirstLabelWins));
        assert!(report.has_code(ConversionIssueCode::RotationNotApplied));
        assert!(!report.is_lossy());
    }

    #[test]
    fn read_and_write_dispatch_by_format() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out.xml");
        write_document(&path, &sample_document(), Format::Voc, &WriteOptions::default())
            .expect("write voc");

        let back = read_document(&path, Format::Voc).expect("read voc");
        assert_eq!(back.len(), 2);
        assert_eq!(back.annotations[0].detection.category, "cat");
    }
}
