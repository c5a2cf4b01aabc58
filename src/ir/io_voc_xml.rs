//! Pascal VOC XML reader and writer.
//!
//! One `<annotation>` document describes one image. Boxes are stored as
//! integer `xmin/ymin/xmax/ymax` corners; the reader accepts fractional
//! values, the writer rounds to the nearest pixel.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use roxmltree::Node;
use serde_json::Value;

use super::converter::FormatConverter;
use super::model::{Detection, Document, Image};
use super::BBoxXYWH;
use crate::error::TileLabelError;

const FORMAT: &str = "VOC";

/// Per-object VOC tags carried through the detection's `extra` map.
const OBJECT_ATTRS: [&str; 3] = ["pose", "truncated", "difficult"];

// ============================================================================
// VOC schema types
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct VocAnnotation {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub objects: Vec<VocObject>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VocObject {
    pub name: String,
    pub confidence: Option<f64>,
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    pub attrs: BTreeMap<String, String>,
}

// ============================================================================
// Public API
// ============================================================================

#[derive(Clone, Copy, Debug, Default)]
pub struct VocConverter;

impl FormatConverter for VocConverter {
    type Native = VocAnnotation;

    fn name(&self) -> &'static str {
        FORMAT
    }

    fn to_exchange(&self, native: &VocAnnotation) -> Result<Document, TileLabelError> {
        Ok(voc_to_document(native))
    }

    fn from_exchange(&self, document: &Document) -> Result<VocAnnotation, TileLabelError> {
        Ok(document_to_voc(document))
    }
}

pub fn read_voc_xml(path: &Path) -> Result<Document, TileLabelError> {
    let xml = fs::read_to_string(path)?;
    let native = parse_voc_xml_str(&xml, path)?;
    Ok(voc_to_document(&native))
}

pub fn write_voc_xml(path: &Path, document: &Document) -> Result<(), TileLabelError> {
    fs::write(path, render_voc_xml(&document_to_voc(document)))?;
    Ok(())
}

pub fn from_voc_xml_str(xml: &str) -> Result<Document, TileLabelError> {
    let native = parse_voc_xml_str(xml, Path::new("<string>"))?;
    Ok(voc_to_document(&native))
}

/// Parses VOC XML from bytes; the input must be valid UTF-8.
pub fn from_voc_xml_slice(bytes: &[u8]) -> Result<Document, TileLabelError> {
    let xml = std::str::from_utf8(bytes).map_err(|source| TileLabelError::XmlParse {
        path: PathBuf::from("<bytes>"),
        message: format!("input is not valid UTF-8: {source}"),
    })?;
    let native = parse_voc_xml_str(xml, Path::new("<bytes>"))?;
    Ok(voc_to_document(&native))
}

pub fn to_voc_xml_string(document: &Document) -> String {
    render_voc_xml(&document_to_voc(document))
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses one `<annotation>` document.
///
/// Broken XML is an [`TileLabelError::XmlParse`]; a root other than
/// `<annotation>` is a [`TileLabelError::SchemaInvalid`]. A missing or
/// unreadable `<size>` yields zero dimensions, and an `<object>` without a
/// usable name or box is skipped with a warning.
pub fn parse_voc_xml_str(xml: &str, path: &Path) -> Result<VocAnnotation, TileLabelError> {
    let document = roxmltree::Document::parse(xml).map_err(|source| TileLabelError::XmlParse {
        path: path.to_path_buf(),
        message: source.to_string(),
    })?;

    let annotation = document.root_element();
    if annotation.tag_name().name() != "annotation" {
        return Err(TileLabelError::SchemaInvalid {
            format: FORMAT,
            path: path.to_path_buf(),
            message: format!(
                "expected <annotation> root element, found <{}>",
                annotation.tag_name().name()
            ),
        });
    }

    let filename = optional_child_text(annotation, "filename").unwrap_or_default();

    let (width, height, depth) = match child_element(annotation, "size") {
        Some(size) => (
            parse_size_field(size, "width", path),
            parse_size_field(size, "height", path),
            parse_size_field(size, "depth", path),
        ),
        None => {
            warn!("{}: no <size> element; image dimensions default to 0", path.display());
            (0, 0, 0)
        }
    };

    let mut objects = Vec::new();
    for (idx, object) in annotation
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "object")
        .enumerate()
    {
        match parse_object(object) {
            Ok(parsed) => objects.push(parsed),
            Err(reason) => warn!("{}: skipping <object> #{idx}: {reason}", path.display()),
        }
    }

    Ok(VocAnnotation {
        filename,
        width,
        height,
        depth,
        objects,
    })
}

fn parse_object(object: Node<'_, '_>) -> Result<VocObject, String> {
    let name = optional_child_text(object, "name").ok_or("missing <name>")?;
    let bndbox = child_element(object, "bndbox").ok_or("missing <bndbox>")?;

    let confidence = match optional_child_text(object, "confidence") {
        Some(raw) => Some(
            raw.parse::<f64>()
                .map_err(|_| format!("invalid <confidence> value '{raw}'"))?,
        ),
        None => None,
    };

    let mut attrs = BTreeMap::new();
    for key in OBJECT_ATTRS {
        if let Some(value) = optional_child_text(object, key) {
            attrs.insert(key.to_string(), value);
        }
    }

    Ok(VocObject {
        name,
        confidence,
        xmin: parse_coord(bndbox, "xmin")?,
        ymin: parse_coord(bndbox, "ymin")?,
        xmax: parse_coord(bndbox, "xmax")?,
        ymax: parse_coord(bndbox, "ymax")?,
        attrs,
    })
}

fn parse_coord(bndbox: Node<'_, '_>, tag: &str) -> Result<f64, String> {
    let raw = optional_child_text(bndbox, tag).ok_or_else(|| format!("missing <{tag}>"))?;
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| format!("invalid <{tag}> value '{raw}'"))
}

fn parse_size_field(size: Node<'_, '_>, tag: &str, path: &Path) -> u32 {
    let Some(raw) = optional_child_text(size, tag) else {
        return 0;
    };
    // Some tools write "640.0".
    match raw.parse::<u32>() {
        Ok(value) => value,
        Err(_) => match raw.parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 && value <= u32::MAX as f64 => {
                value as u32
            }
            _ => {
                warn!(
                    "{}: invalid <{tag}> value '{raw}' in <size>; using 0",
                    path.display()
                );
                0
            }
        },
    }
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn optional_child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child_element(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

// ============================================================================
// Conversion
// ============================================================================

fn voc_to_document(native: &VocAnnotation) -> Document {
    let mut document = Document::new(Image::new(
        1u64,
        native.filename.clone(),
        native.width,
        native.height,
    ));

    for object in &native.objects {
        let mut detection = Detection::new(
            BBoxXYWH::from_xyxy(object.xmin, object.ymin, object.xmax, object.ymax),
            object.name.clone(),
            object.confidence.unwrap_or(0.0),
        );
        for (key, value) in &object.attrs {
            detection = detection.with_extra(key.clone(), value.clone());
        }
        document.push(detection);
    }

    document
}

fn document_to_voc(document: &Document) -> VocAnnotation {
    let objects = document
        .detections()
        .map(|detection| {
            let (x1, y1, x2, y2) = detection.bbox.to_xyxy();
            let attrs = OBJECT_ATTRS
                .iter()
                .filter_map(|key| match detection.extra.get(*key) {
                    Some(Value::String(s)) => Some((key.to_string(), s.clone())),
                    Some(Value::Number(n)) => Some((key.to_string(), n.to_string())),
                    _ => None,
                })
                .collect();

            VocObject {
                name: detection.category.clone(),
                confidence: Some(detection.score),
                xmin: x1.round(),
                ymin: y1.round(),
                xmax: x2.round(),
                ymax: y2.round(),
                attrs,
            }
        })
        .collect();

    VocAnnotation {
        filename: document.image.file_name.clone(),
        width: document.image.width,
        height: document.image.height,
        depth: 3,
        objects,
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn render_voc_xml(native: &VocAnnotation) -> String {
    let mut lines = vec![
        r#"<?xml version="1.0" encoding="UTF-8"?>"#.to_string(),
        "<annotation>".to_string(),
        format!("  <filename>{}</filename>", xml_escape(&native.filename)),
        "  <size>".to_string(),
        format!("    <width>{}</width>", native.width),
        format!("    <height>{}</height>", native.height),
        format!("    <depth>{}</depth>", native.depth),
        "  </size>".to_string(),
    ];

    for object in &native.objects {
        lines.push("  <object>".to_string());
        lines.push(format!("    <name>{}</name>", xml_escape(&object.name)));
        if let Some(confidence) = object.confidence {
            lines.push(format!("    <confidence>{confidence:.4}</confidence>"));
        }
        for (key, value) in &object.attrs {
            lines.push(format!("    <{key}>{}</{key}>", xml_escape(value)));
        }
        lines.push("    <bndbox>".to_string());
        lines.push(format!("      <xmin>{}</xmin>", object.xmin));
        lines.push(format!("      <ymin>{}</ymin>", object.ymin));
        lines.push(format!("      <xmax>{}</xmax>", object.xmax));
        lines.push(format!("      <ymax>{}</ymax>", object.ymax));
        lines.push("    </bndbox>".to_string());
        lines.push("  </object>".to_string());
    }

    lines.push("</annotation>".to_string());
    let mut xml = lines.join("\n");
    xml.push('\n');
    xml
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
