//! Tiling and merge settings.
//!
//! Settings can be read from a YAML file; every key is optional and falls
//! back to the defaults below.
//!
//! ```yaml
//! tile_width: 1386
//! tile_height: 1516
//! overlap: 32
//! iou_threshold: 0.5
//! max_workers: 4
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TileLabelError;

pub const DEFAULT_TILE_WIDTH: u32 = 1386;
pub const DEFAULT_TILE_HEIGHT: u32 = 1516;
pub const DEFAULT_OVERLAP: u32 = 32;
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.5;
pub const DEFAULT_MAX_WORKERS: usize = 4;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TilingConfig {
    /// Largest image width the prediction service accepts.
    pub tile_width: u32,
    /// Largest image height the prediction service accepts.
    pub tile_height: u32,
    /// Pixels shared by neighbouring tiles on each axis.
    pub overlap: u32,
    /// Detections overlapping a better one by at least this IoU are dropped.
    pub iou_threshold: f64,
    /// Upper bound on concurrent prediction calls.
    pub max_workers: usize,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            tile_width: DEFAULT_TILE_WIDTH,
            tile_height: DEFAULT_TILE_HEIGHT,
            overlap: DEFAULT_OVERLAP,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl TilingConfig {
    /// Reads a YAML config file and validates it.
    pub fn from_yaml_file(path: &Path) -> Result<Self, TileLabelError> {
        let raw = fs::read_to_string(path)?;
        let config: TilingConfig =
            serde_yaml::from_str(&raw).map_err(|source| TileLabelError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that would make tiling loop forever or make NMS
    /// meaningless.
    pub fn validate(&self) -> Result<(), TileLabelError> {
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(TileLabelError::InvalidTileConfig(format!(
                "tile size must be positive, got {}x{}",
                self.tile_width, self.tile_height
            )));
        }
        if self.overlap >= self.tile_width || self.overlap >= self.tile_height {
            return Err(TileLabelError::InvalidTileConfig(format!(
                "overlap {} must be smaller than the tile size {}x{}",
                self.overlap, self.tile_width, self.tile_height
            )));
        }
        validate_iou_threshold(self.iou_threshold)?;
        if self.max_workers == 0 {
            return Err(TileLabelError::InvalidTileConfig(
                "max_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Distance between consecutive tile origins as `(x, y)`.
    ///
    /// Only meaningful once [`TilingConfig::validate`] has passed.
    pub fn stride(&self) -> (u32, u32) {
        (
            self.tile_width.saturating_sub(self.overlap),
            self.tile_height.saturating_sub(self.overlap),
        )
    }
}

pub(crate) fn validate_iou_threshold(threshold: f64) -> Result<(), TileLabelError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(TileLabelError::InvalidTileConfig(format!(
            "IoU threshold must be between 0 and 1, got {threshold}"
        )));
    }
    Ok(())
}
