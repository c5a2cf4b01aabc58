//! Splitting large images into overlapping tiles and merging the per-tile
//! detections back into one document.
//!
//! The flow is:
//!
//! 1. [`plan`] lays a grid of tile rectangles over the image.
//! 2. [`split`] crops each rectangle and encodes it as JPEG.
//! 3. A [`Predictor`] turns each tile into a tile-local [`Document`]
//!    (see [`predict_tiled`]).
//! 4. [`combine`] shifts every detection into image coordinates, unifies
//!    categories by name and removes duplicates from the overlap with NMS.
//!
//! [`Document`]: crate::ir::Document

pub mod merge;
pub mod nms;
pub mod predict;

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GenericImageView, ImageFormat};
use log::debug;

use crate::config::TilingConfig;
use crate::error::TileLabelError;

pub use merge::{combine, TileResult};
pub use predict::{predict_image, predict_tiled, ConvertingPredictor, Predictor};

/// A tile's placement in the original image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileRect {
    /// Row-major position, starting at 0.
    pub index: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// An encoded crop ready to be sent to a prediction service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    pub index: usize,
    pub x_offset: u32,
    pub y_offset: u32,
    pub width: u32,
    pub height: u32,
    /// JPEG-encoded RGB pixels of the crop.
    pub bytes: Vec<u8>,
}

/// Whether an image of this size exceeds one tile on either axis.
pub fn needs_tiling(width: u32, height: u32, config: &TilingConfig) -> bool {
    width > config.tile_width || height > config.tile_height
}

/// Computes the tile grid for a `width` x `height` image.
///
/// Origins advance by `tile - overlap` on each axis. The last tile on an
/// axis is pulled back so that its far edge sits exactly on the image edge;
/// an axis no longer than one tile gets a single tile spanning all of it.
/// Tiles never extend past the image and no rectangle is emitted twice.
/// A zero-sized image has no tiles.
///
/// ```
/// use tilelabel::config::TilingConfig;
/// use tilelabel::tiling::plan;
///
/// let tiles = plan(3000, 3000, &TilingConfig::default()).unwrap();
/// assert_eq!(tiles.len(), 6);
/// let last = tiles.last().unwrap();
/// assert_eq!((last.x + last.width, last.y + last.height), (3000, 3000));
/// ```
pub fn plan(width: u32, height: u32, config: &TilingConfig) -> Result<Vec<TileRect>, TileLabelError> {
    config.validate()?;
    if width == 0 || height == 0 {
        return Ok(Vec::new());
    }

    let (stride_x, stride_y) = config.stride();
    let columns = axis_origins(width, config.tile_width, stride_x);
    let rows = axis_origins(height, config.tile_height, stride_y);
    let tile_width = config.tile_width.min(width);
    let tile_height = config.tile_height.min(height);

    let mut tiles = Vec::with_capacity(columns.len() * rows.len());
    for &y in &rows {
        for &x in &columns {
            tiles.push(TileRect {
                index: tiles.len(),
                x,
                y,
                width: tile_width,
                height: tile_height,
            });
        }
    }

    debug!(
        "planned {} tiles ({} columns x {} rows) for {width}x{height}",
        tiles.len(),
        columns.len(),
        rows.len()
    );
    Ok(tiles)
}

/// Tile origins along one axis of length `len`.
fn axis_origins(len: u32, tile: u32, stride: u32) -> Vec<u32> {
    if len <= tile {
        return vec![0];
    }

    let last = len - tile;
    let mut origins = Vec::new();
    let mut pos = 0;
    while pos < last {
        origins.push(pos);
        pos += stride;
    }
    origins.push(last);
    origins
}

/// Crops `image` along [`plan`] and JPEG-encodes each tile.
pub fn split(image: &DynamicImage, config: &TilingConfig) -> Result<Vec<Tile>, TileLabelError> {
    let (width, height) = image.dimensions();
    plan(width, height, config)?
        .into_iter()
        .map(|rect| {
            let crop = image.crop_imm(rect.x, rect.y, rect.width, rect.height);
            Ok(Tile {
                index: rect.index,
                x_offset: rect.x,
                y_offset: rect.y,
                width: rect.width,
                height: rect.height,
                bytes: encode_jpeg(&crop, rect.index)?,
            })
        })
        .collect()
}

/// Encodes an image as RGB8 JPEG; alpha and extra channels are dropped.
pub(crate) fn encode_jpeg(image: &DynamicImage, tile_index: usize) -> Result<Vec<u8>, TileLabelError> {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut bytes = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .map_err(|source| TileLabelError::ImageEncode { tile_index, source })?;
    Ok(bytes)
}

/// Opens and decodes an image file.
pub fn load_image(path: &Path) -> Result<DynamicImage, TileLabelError> {
    image::open(path).map_err(TileLabelError::ImageDecode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(tile_width: u32, tile_height: u32, overlap: u32) -> TilingConfig {
        TilingConfig {
            tile_width,
            tile_height,
            overlap,
            ..TilingConfig::default()
        }
    }

    #[test]
    fn axis_origins_pull_back_last_tile() {
        assert_eq!(axis_origins(3000, 1386, 1354), vec![0, 1354, 1614]);
        assert_eq!(axis_origins(3000, 1516, 1484), vec![0, 1484]);
        assert_eq!(axis_origins(100, 100, 90), vec![0]);
        assert_eq!(axis_origins(50, 100, 90), vec![0]);
    }

    #[test]
    fn axis_origins_do_not_repeat_edge_anchor() {
        // 0, 90 and then 100 - 10 = 90 again would be a duplicate.
        assert_eq!(axis_origins(100, 10, 90), vec![0, 90]);
        assert_eq!(axis_origins(20, 10, 10), vec![0, 10]);
    }

    #[test]
    fn default_grid_on_3000_square() {
        let tiles = plan(3000, 3000, &TilingConfig::default()).unwrap();
        assert_eq!(tiles.len(), 6);

        let origins: Vec<(u32, u32)> = tiles.iter().map(|t| (t.x, t.y)).collect();
        assert_eq!(
            origins,
            vec![(0, 0), (1354, 0), (1614, 0), (0, 1484), (1354, 1484), (1614, 1484)]
        );
        for (idx, tile) in tiles.iter().enumerate() {
            assert_eq!(tile.index, idx);
            assert!(tile.x + tile.width <= 3000);
            assert!(tile.y + tile.height <= 3000);
        }
    }

    #[test]
    fn small_image_is_one_tile() {
        let tiles = plan(300, 200, &config(640, 640, 32)).unwrap();
        assert_eq!(
            tiles,
            vec![TileRect {
                index: 0,
                x: 0,
                y: 0,
                width: 300,
                height: 200
            }]
        );
        assert!(!needs_tiling(300, 200, &config(640, 640, 32)));
        assert!(needs_tiling(641, 200, &config(640, 640, 32)));
    }

    #[test]
    fn one_axis_tiled_other_spanned() {
        let tiles = plan(1000, 100, &config(400, 400, 0)).unwrap();
        let xs: Vec<u32> = tiles.iter().map(|t| t.x).collect();
        assert_eq!(xs, vec![0, 400, 600]);
        assert!(tiles.iter().all(|t| t.height == 100 && t.y == 0));
    }

    #[test]
    fn invalid_overlap_is_rejected_before_planning() {
        let err = plan(1000, 1000, &config(100, 100, 100)).unwrap_err();
        assert!(matches!(err, TileLabelError::InvalidTileConfig(_)));
    }

    #[test]
    fn zero_sized_image_has_no_tiles() {
        assert!(plan(0, 100, &TilingConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn split_encodes_each_tile_as_jpeg() {
        let image = DynamicImage::new_rgba8(50, 30);
        let tiles = split(&image, &config(32, 32, 4)).unwrap();

        assert_eq!(tiles.len(), 2);
        assert_eq!((tiles[1].x_offset, tiles[1].y_offset), (18, 0));
        for tile in &tiles {
            assert_eq!((tile.width, tile.height), (32, 30));
            // JPEG SOI marker
            assert_eq!(&tile.bytes[..2], &[0xFF, 0xD8]);
            let decoded = image::load_from_memory(&tile.bytes).unwrap();
            assert_eq!(decoded.dimensions(), (32, 30));
        }
    }
}
