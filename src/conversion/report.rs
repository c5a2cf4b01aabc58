//! Conversion report types for tracking lossiness and policy decisions.
//!
//! Mirrors `validation::ValidationReport`: a list of coded issues plus
//! counts, printable as text or serializable as JSON.

use serde::Serialize;
use std::fmt;

/// What a conversion between two schemas keeps, drops and decides.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ConversionReport {
    /// Source format name.
    pub from: String,
    /// Target format name.
    pub to: String,
    /// Counts in the exchange document read from the source.
    pub input: ConversionCounts,
    /// Counts the target will carry.
    pub output: ConversionCounts,
    pub issues: Vec<ConversionIssue>,
}

impl ConversionReport {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Default::default()
        }
    }

    pub fn add(&mut self, issue: ConversionIssue) {
        self.issues.push(issue);
    }

    /// Count of warning-level issues (true lossiness).
    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Warning)
            .count()
    }

    /// Count of info-level issues (policy decisions, notes).
    pub fn info_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Info)
            .count()
    }

    /// A conversion is lossy if it has any warning-level issues.
    pub fn is_lossy(&self) -> bool {
        self.warning_count() > 0
    }

    pub fn has_code(&self, code: ConversionIssueCode) -> bool {
        self.issues.iter().any(|issue| issue.code == code)
    }
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  {} detections, {} categories",
            self.input.detections, self.input.categories
        )?;

        if self.output != self.input {
            writeln!(
                f,
                "  output: {} detections, {} categories",
                self.output.detections, self.output.categories
            )?;
        }

        for (severity, title) in [
            (ConversionSeverity::Warning, "Warnings"),
            (ConversionSeverity::Info, "Notes"),
        ] {
            let messages: Vec<&str> = self
                .issues
                .iter()
                .filter(|i| i.severity == severity)
                .map(|i| i.message.as_str())
                .collect();
            if messages.is_empty() {
                continue;
            }
            writeln!(f)?;
            writeln!(f, "{title} ({}):", messages.len())?;
            for message in messages {
                writeln!(f, "  - {message}")?;
            }
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConversionCounts {
    pub detections: usize,
    pub categories: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ConversionIssue {
    pub severity: ConversionSeverity,
    pub code: ConversionIssueCode,
    pub message: String,
}

impl ConversionIssue {
    /// A warning-level issue: information will be lost.
    pub fn warning(code: ConversionIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: ConversionSeverity::Warning,
            code,
            message: message.into(),
        }
    }

    /// An info-level issue: a policy the converter applies.
    pub fn info(code: ConversionIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: ConversionSeverity::Info,
            code,
            message: message.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionSeverity {
    Warning,
    Info,
}

/// Stable issue codes for programmatic consumption.
///
/// These codes are part of the JSON report and should remain stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionIssueCode {
    // Lossiness (Warning level)
    /// Rotation angles have no place in the target schema.
    DropAngle,
    /// Picture ids have no place in the target schema.
    DropPictureId,
    /// Other per-detection extra fields will be dropped.
    DropDetectionExtra,
    /// Some or all document metadata keys will be dropped.
    DropDocumentMetadata,
    /// The target schema carries no image file name.
    DropImageFileName,
    /// The target schema carries no image size.
    DropImageSize,
    /// Category ids are not carried; only names survive.
    DropCategoryIds,
    /// Fractional box corners will be rounded to whole pixels.
    VocRoundsCoordinates,
    /// Scores will be written with 4 decimal places.
    VocConfidencePrecision,
    /// The document has detections but no image size to scale them by.
    LabelStudioMissingImageSize,

    // Policy decisions (Info level)
    /// Reader assigns category ids in first-seen order.
    ReaderCategoryIdAssignment,
    /// Label Studio reader keeps the first of several labels.
    LabelStudioFirstLabelWins,
    /// Label Studio reader skips non-rectangle results.
    LabelStudioSkipsOtherResults,
    /// Rotation is carried as an angle and never applied to the box.
    RotationNotApplied,
    /// FormData writer emits an identity registration matrix.
    FormDataIdentityRegisterMatrix,
    /// Binary writer groups detections by picture id.
    BinaryGroupsByPictureId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_is_not_lossy() {
        let report = ConversionReport::new("exchange", "formdata");
        assert!(!report.is_lossy());
        assert_eq!(report.warning_count(), 0);
        assert_eq!(report.info_count(), 0);
    }

    #[test]
    fn warning_makes_report_lossy() {
        let mut report = ConversionReport::new("exchange", "voc");
        report.add(ConversionIssue::warning(
            ConversionIssueCode::DropAngle,
            "2 detection(s) carry an angle that will be dropped",
        ));
        assert!(report.is_lossy());
        assert!(report.has_code(ConversionIssueCode::DropAngle));
    }

    #[test]
    fn info_does_not_make_report_lossy() {
        let mut report = ConversionReport::new("voc", "exchange");
        report.add(ConversionIssue::info(
            ConversionIssueCode::ReaderCategoryIdAssignment,
            "category ids follow first appearance",
        ));
        assert!(!report.is_lossy());
        assert_eq!(report.info_count(), 1);
    }

    #[test]
    fn display_lists_warnings_then_notes() {
        let mut report = ConversionReport::new("binary", "voc");
        report.input = ConversionCounts {
            detections: 3,
            categories: 2,
        };
        report.output = report.input.clone();
        report.add(ConversionIssue::info(
            ConversionIssueCode::ReaderCategoryIdAssignment,
            "note",
        ));
        report.add(ConversionIssue::warning(ConversionIssueCode::DropPictureId, "loss"));

        let text = report.to_string();
        assert!(text.starts_with("  3 detections, 2 categories\n"));
        let warnings = text.find("Warnings (1):").unwrap();
        let notes = text.find("Notes (1):").unwrap();
        assert!(warnings < notes);
    }

    #[test]
    fn report_serializes_to_json() {
        let mut report = ConversionReport::new("exchange", "binary");
        report.add(ConversionIssue::warning(
            ConversionIssueCode::DropImageSize,
            "image size will be dropped",
        ));

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"from\":\"exchange\""));
        assert!(json.contains("\"severity\":\"warning\""));
        assert!(json.contains("\"code\":\"drop_image_size\""));
    }
}
