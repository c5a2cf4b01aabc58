//! Exchange document validation.
//!
//! Checks the invariants readers and the merge engine are supposed to keep:
//! category references resolve and agree by name, annotation ids are dense
//! and 1-based, and every box and score is usable.

mod report;

pub use report::{IssueCode, IssueContext, Severity, ValidationIssue, ValidationReport};

use std::collections::HashMap;

use crate::ir::{CategoryId, Document};

/// Slack, in pixels, before a box counts as outside the image.
const BOUNDS_TOLERANCE: f64 = 0.5;

#[derive(Clone, Debug, Default)]
pub struct ValidateOptions {
    /// Treat warnings as failures.
    pub strict: bool,
}

impl ValidateOptions {
    /// Whether `report` should be treated as a failed validation.
    pub fn fails(&self, report: &ValidationReport) -> bool {
        report.error_count() > 0 || (self.strict && report.warning_count() > 0)
    }
}

/// Validates a document and returns every issue found.
pub fn validate_document(document: &Document, _opts: &ValidateOptions) -> ValidationReport {
    let mut report = ValidationReport::new();

    let category_names = validate_categories(document, &mut report);
    validate_image(document, &mut report);
    validate_annotations(document, &category_names, &mut report);

    report
}

fn validate_categories<'a>(
    document: &'a Document,
    report: &mut ValidationReport,
) -> HashMap<CategoryId, &'a str> {
    let mut by_id: HashMap<CategoryId, &str> = HashMap::new();
    let mut seen_names: HashMap<&str, CategoryId> = HashMap::new();

    for category in &document.categories {
        let id = category.id.as_u64();

        if by_id.contains_key(&category.id) {
            report.add(ValidationIssue::error(
                IssueCode::DuplicateCategoryId,
                format!("Duplicate category ID {}", id),
                IssueContext::Category { id },
            ));
        } else {
            by_id.insert(category.id, &category.name);
        }

        if category.name.is_empty() {
            report.add(ValidationIssue::warning(
                IssueCode::EmptyCategoryName,
                "Empty category name",
                IssueContext::Category { id },
            ));
        } else if let Some(first_id) = seen_names.get(category.name.as_str()) {
            report.add(ValidationIssue::warning(
                IssueCode::DuplicateCategoryName,
                format!(
                    "Duplicate category name '{}' (also used by category {})",
                    category.name, first_id
                ),
                IssueContext::Category { id },
            ));
        } else {
            seen_names.insert(&category.name, category.id);
        }
    }

    by_id
}

fn validate_image(document: &Document, report: &mut ValidationReport) {
    let image = &document.image;
    let has_boxes = document.detections().any(|d| d.bbox.area() > 0.0);
    if has_boxes && (image.width == 0 || image.height == 0) {
        report.add(ValidationIssue::error(
            IssueCode::MissingImageDimensions,
            format!(
                "Image size {}x{} with {} detection(s) present",
                image.width,
                image.height,
                document.len()
            ),
            IssueContext::Image {
                id: image.id.as_u64(),
            },
        ));
    }
}

fn validate_annotations(
    document: &Document,
    category_names: &HashMap<CategoryId, &str>,
    report: &mut ValidationReport,
) {
    let (width, height) = (document.image.width, document.image.height);

    for (idx, annotation) in document.annotations.iter().enumerate() {
        let id = annotation.id.as_u64();
        let detection = &annotation.detection;

        if id != idx as u64 + 1 {
            report.add(ValidationIssue::error(
                IssueCode::NonSequentialAnnotationId,
                format!("Annotation at position {} has ID {} (expected {})", idx, id, idx + 1),
                IssueContext::Annotation { id },
            ));
        }

        match category_names.get(&annotation.category_id) {
            None => report.add(ValidationIssue::error(
                IssueCode::MissingCategoryRef,
                format!("References non-existent category {}", annotation.category_id),
                IssueContext::Annotation { id },
            )),
            Some(name) if *name != detection.category => report.add(ValidationIssue::error(
                IssueCode::CategoryNameMismatch,
                format!(
                    "Category {} is '{}' but the detection says '{}'",
                    annotation.category_id, name, detection.category
                ),
                IssueContext::Annotation { id },
            )),
            Some(_) => {}
        }

        if !(0.0..=1.0).contains(&detection.score) {
            report.add(ValidationIssue::error(
                IssueCode::ScoreOutOfRange,
                format!("Score {} is outside [0, 1]", detection.score),
                IssueContext::Annotation { id },
            ));
        }

        let bbox = &detection.bbox;
        if !bbox.is_finite() {
            report.add(ValidationIssue::error(
                IssueCode::BBoxNotFinite,
                format!("Non-finite box {:?}", bbox.to_array()),
                IssueContext::Annotation { id },
            ));
            continue;
        }

        if bbox.width < 0.0 || bbox.height < 0.0 {
            report.add(ValidationIssue::error(
                IssueCode::NegativeBBoxSize,
                format!("Negative size {}x{}", bbox.width, bbox.height),
                IssueContext::Annotation { id },
            ));
            continue;
        }

        if bbox.area() == 0.0 {
            report.add(ValidationIssue::warning(
                IssueCode::ZeroBBoxArea,
                format!("Zero area box {:?}", bbox.to_array()),
                IssueContext::Annotation { id },
            ));
        }

        if width > 0 && height > 0 {
            let (w, h) = (f64::from(width), f64::from(height));
            if bbox.x < -BOUNDS_TOLERANCE
                || bbox.y < -BOUNDS_TOLERANCE
                || bbox.x2() > w + BOUNDS_TOLERANCE
                || bbox.y2() > h + BOUNDS_TOLERANCE
            {
                report.add(ValidationIssue::warning(
                    IssueCode::BBoxOutOfBounds,
                    format!(
                        "Box ({:.1}, {:.1}, {:.1}, {:.1}) extends outside the {}x{} image",
                        bbox.x,
                        bbox.y,
                        bbox.x2(),
                        bbox.y2(),
                        width,
                        height
                    ),
                    IssueContext::Annotation { id },
                ));
            }
        }
    }
}
