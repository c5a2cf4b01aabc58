//! Exchange document model.
//!
//! Every native reader converts into [`Document`], and every writer converts
//! out of it. A document describes the detections on exactly one image.

use std::collections::BTreeMap;

use serde_json::Value;

use super::bbox::BBoxXYWH;
use super::ids::{AnnotationId, CategoryId, ImageId};
use super::space::Pixel;

/// Opaque document-level key/value bag (`metadata` in exchange JSON).
pub type Metadata = serde_json::Map<String, Value>;

/// Opaque per-detection key/value bag for vendor fields with no canonical
/// meaning (a picture id, a rotation angle, ...).
pub type Extra = BTreeMap<String, Value>;

/// Key under which a non-zero rotation angle (degrees) is kept in [`Extra`].
pub const EXTRA_ANGLE: &str = "angle";

/// Key under which a vendor picture/tile identifier is kept in [`Extra`].
pub const EXTRA_PICTURE_ID: &str = "picture_id";

/// A set of detections on one image, in the canonical COCO-like layout.
///
/// Invariants maintained by [`Document::push`] and [`Document::renumber`]:
/// every annotation's `category_id` resolves in `categories`, and
/// annotation ids are dense and 1-based over `annotations` order. Fields
/// stay public so that validation can report documents that break them.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub image: Image,
    pub annotations: Vec<Annotation>,
    pub categories: Vec<Category>,
    pub metadata: Metadata,
}

impl Default for Document {
    fn default() -> Self {
        Self::new(Image::default())
    }
}

impl Document {
    pub fn new(image: Image) -> Self {
        Self {
            image,
            annotations: Vec::new(),
            categories: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    /// Appends a detection, registering its category on first sight.
    ///
    /// New categories get the next id after the largest one present, so a
    /// document built from scratch numbers them from 1 in first-seen order.
    pub fn push(&mut self, detection: Detection) -> AnnotationId {
        let category_id = self.intern_category(&detection.category);
        let id = AnnotationId::new(self.annotations.len() as u64 + 1);
        self.annotations.push(Annotation {
            id,
            category_id,
            detection,
        });
        id
    }

    /// Returns the id for `name`, adding the category if it is new.
    pub fn intern_category(&mut self, name: &str) -> CategoryId {
        if let Some(id) = self.category_id(name) {
            return id;
        }
        // Declared ids may be sparse; allocate past the largest one.
        let next = self
            .categories
            .iter()
            .map(|category| category.id.as_u64())
            .max()
            .unwrap_or(0)
            + 1;
        let id = CategoryId::new(next);
        self.categories.push(Category::new(id, name));
        id
    }

    pub fn category_id(&self, name: &str) -> Option<CategoryId> {
        self.categories
            .iter()
            .find(|category| category.name == name)
            .map(|category| category.id)
    }

    pub fn category_name(&self, id: CategoryId) -> Option<&str> {
        self.categories
            .iter()
            .find(|category| category.id == id)
            .map(|category| category.name.as_str())
    }

    /// Reassigns dense 1-based annotation ids in current order.
    pub fn renumber(&mut self) {
        for (idx, annotation) in self.annotations.iter_mut().enumerate() {
            annotation.id = AnnotationId::new(idx as u64 + 1);
        }
    }

    pub fn detections(&self) -> impl Iterator<Item = &Detection> {
        self.annotations.iter().map(|annotation| &annotation.detection)
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Category names referenced by detections, sorted and de-duplicated.
    pub fn label_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .detections()
            .map(|detection| detection.category.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// The image a document describes.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub id: ImageId,
    /// Width in pixels; `0` when the native payload did not carry it.
    pub width: u32,
    /// Height in pixels; `0` when the native payload did not carry it.
    pub height: u32,
    pub file_name: String,
}

impl Image {
    pub fn new(id: impl Into<ImageId>, file_name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            file_name: file_name.into(),
        }
    }
}

impl Default for Image {
    fn default() -> Self {
        Self::new(1u64, "", 0, 0)
    }
}

/// A category (class label). The name is the stable identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

impl Category {
    pub fn new(id: impl Into<CategoryId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A single detected object.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BBoxXYWH<Pixel>,
    pub category: String,
    /// Confidence in `[0, 1]`; `0.0` when the source carried none.
    pub score: f64,
    pub extra: Extra,
}

impl Detection {
    pub fn new(bbox: BBoxXYWH<Pixel>, category: impl Into<String>, score: f64) -> Self {
        Self {
            bbox,
            category: category.into(),
            score,
            extra: Extra::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Rotation angle in degrees, if one was carried through `extra`.
    pub fn angle(&self) -> Option<f64> {
        self.extra.get(EXTRA_ANGLE).and_then(Value::as_f64)
    }
}

/// A detection placed in a document: its annotation id and category id.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub id: AnnotationId,
    pub category_id: CategoryId,
    pub detection: Detection,
}
