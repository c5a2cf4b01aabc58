//! Bounding box type in canonical XYWH format.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use super::{Percent, Pixel};

/// An axis-aligned bounding box `(x, y, width, height)` where `(x, y)` is
/// the top-left corner.
///
/// The `TSpace` parameter is either [`Pixel`] or [`Percent`]. Rotation is
/// never part of the box; formats that carry an angle keep it in the
/// detection's `extra` map.
///
/// The constructor does not reject negative sizes or non-finite values, so
/// that validation can report them instead of parsing panicking on them.
#[derive(Clone, Copy, PartialEq)]
pub struct BBoxXYWH<TSpace> {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    _space: PhantomData<TSpace>,
}

impl<TSpace> BBoxXYWH<TSpace> {
    #[inline]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            _space: PhantomData,
        }
    }

    /// Builds a box from corner coordinates `(x1, y1, x2, y2)`.
    #[inline]
    pub fn from_xyxy(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    #[inline]
    pub fn x2(&self) -> f64 {
        self.x + self.width
    }

    #[inline]
    pub fn y2(&self) -> f64 {
        self.y + self.height
    }

    /// Returns the area; negative or zero for degenerate boxes.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Returns `[x, y, width, height]`.
    #[inline]
    pub fn to_array(&self) -> [f64; 4] {
        [self.x, self.y, self.width, self.height]
    }

    /// Returns `(x1, y1, x2, y2)`.
    #[inline]
    pub fn to_xyxy(&self) -> (f64, f64, f64, f64) {
        (self.x, self.y, self.x2(), self.y2())
    }
}

impl BBoxXYWH<Pixel> {
    /// Shifts the box origin; size is unchanged.
    #[inline]
    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Expresses the box as percentages of the image size.
    ///
    /// Returns `None` when either image dimension is zero.
    pub fn to_percent(&self, image_width: u32, image_height: u32) -> Option<BBoxXYWH<Percent>> {
        if image_width == 0 || image_height == 0 {
            return None;
        }
        let w = image_width as f64;
        let h = image_height as f64;
        Some(BBoxXYWH::new(
            self.x / w * 100.0,
            self.y / h * 100.0,
            self.width / w * 100.0,
            self.height / h * 100.0,
        ))
    }
}

impl BBoxXYWH<Percent> {
    pub fn to_pixel(&self, image_width: u32, image_height: u32) -> BBoxXYWH<Pixel> {
        let w = image_width as f64;
        let h = image_height as f64;
        BBoxXYWH::new(
            self.x / 100.0 * w,
            self.y / 100.0 * h,
            self.width / 100.0 * w,
            self.height / 100.0 * h,
        )
    }
}

impl<TSpace> std::fmt::Debug for BBoxXYWH<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BBoxXYWH")
            .field("x", &self.x)
            .field("y", &self.y)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl<TSpace> Default for BBoxXYWH<TSpace> {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

// Serialized as the COCO `[x, y, w, h]` array; custom impls avoid
// TSpace: Serialize/Deserialize bounds.
impl<TSpace> Serialize for BBoxXYWH<TSpace> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_array().serialize(serializer)
    }
}

impl<'de, TSpace> Deserialize<'de> for BBoxXYWH<TSpace> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let [x, y, width, height] = <[f64; 4]>::deserialize(deserializer)?;
        Ok(Self::new(x, y, width, height))
    }
}
