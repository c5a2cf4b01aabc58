//! Exchange document model and per-schema adapters.
//!
//! Every native schema converts into [`Document`], a COCO-like description
//! of the detections on one image, and back out of it. Merging, validation
//! and lossiness reporting only ever look at the exchange form.
//!
//! # Design Principles
//!
//! 1. **One box form**: boxes are `x, y, width, height` with a top-left
//!    origin. Marker types keep pixel and percentage boxes apart.
//!
//! 2. **Names, not ids**: a detection carries its category name. Category
//!    ids are assigned per document in first-seen order and mean nothing
//!    across documents.
//!
//! 3. **Tolerant reading**: a malformed entry inside an otherwise valid
//!    payload is skipped with a warning; only a missing required top-level
//!    key fails the whole payload.
//!
//! # Example
//!
//! ```
//! use tilelabel::ir::{BBoxXYWH, Detection, Document, Image};
//!
//! let mut document = Document::new(Image::new(1u64, "image.jpg", 640, 480));
//! document.push(Detection::new(BBoxXYWH::new(10.0, 20.0, 90.0, 180.0), "person", 0.92));
//!
//! assert_eq!(document.categories[0].name, "person");
//! assert_eq!(document.annotations[0].id.as_u64(), 1);
//! ```

mod bbox;
mod converter;
mod ids;
pub mod io_binary_json;
pub mod io_coco_json;
pub mod io_formdata_json;
pub mod io_label_studio_json;
pub mod io_voc_xml;
mod model;
mod space;

pub use bbox::BBoxXYWH;
pub use converter::{Entry, FormatConverter};
pub use ids::{AnnotationId, CategoryId, ImageId};
pub use model::{
    Annotation, Category, Detection, Document, Extra, Image, Metadata, EXTRA_ANGLE,
    EXTRA_PICTURE_ID,
};
pub use space::{Percent, Pixel};
