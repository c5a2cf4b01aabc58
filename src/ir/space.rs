//! Coordinate space marker types.
//!
//! Zero-sized types used as type parameters so that pixel boxes and
//! percentage boxes (Label Studio) cannot be mixed up at compile time.

use std::fmt;

/// Marker type for absolute pixel coordinates, origin top-left.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pixel {}

/// Marker type for coordinates expressed as percentages (0-100) of the
/// image dimensions.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Percent {}

impl fmt::Debug for Pixel {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

impl fmt::Debug for Percent {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}
