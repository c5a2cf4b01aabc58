//! Running a prediction service over tiles.
//!
//! The service itself is outside this crate: callers hand in a
//! [`Predictor`] that turns encoded image bytes into a tile-local
//! [`Document`]. Tiles are dispatched on a bounded rayon pool and merged
//! only once every tile has answered.

use image::{DynamicImage, GenericImageView};
use log::debug;
use rayon::prelude::*;

use super::merge::{combine, TileResult};
use super::{encode_jpeg, needs_tiling, split};
use crate::config::TilingConfig;
use crate::error::{PredictError, TileLabelError};
use crate::ir::{Document, FormatConverter};

/// Source of detections for one encoded image.
///
/// Implementations are called from several worker threads at once and
/// must not depend on call order.
pub trait Predictor: Sync {
    fn predict(&self, image_bytes: &[u8]) -> Result<Document, PredictError>;
}

impl<F> Predictor for F
where
    F: Fn(&[u8]) -> Result<Document, PredictError> + Sync,
{
    fn predict(&self, image_bytes: &[u8]) -> Result<Document, PredictError> {
        self(image_bytes)
    }
}

/// Adapts a caller that returns a native vendor response into a
/// [`Predictor`] by normalizing through a [`FormatConverter`].
///
/// ```
/// use tilelabel::error::PredictError;
/// use tilelabel::ir::io_formdata_json::{FormDataConverter, FormDataResponse};
/// use tilelabel::tiling::{ConvertingPredictor, Predictor};
///
/// let predictor = ConvertingPredictor::new(FormDataConverter, |_bytes: &[u8]| {
///     let response: FormDataResponse = serde_json::from_str(r#"{"result": []}"#)?;
///     Ok::<_, PredictError>(response)
/// });
/// assert!(predictor.predict(b"jpeg").unwrap().is_empty());
/// ```
#[derive(Clone, Debug)]
pub struct ConvertingPredictor<C, F> {
    converter: C,
    call: F,
}

impl<C, F> ConvertingPredictor<C, F> {
    pub fn new(converter: C, call: F) -> Self {
        Self { converter, call }
    }
}

impl<C, F> Predictor for ConvertingPredictor<C, F>
where
    C: FormatConverter + Sync,
    F: Fn(&[u8]) -> Result<C::Native, PredictError> + Sync,
{
    fn predict(&self, image_bytes: &[u8]) -> Result<Document, PredictError> {
        let native = (self.call)(image_bytes)?;
        Ok(self.converter.to_exchange(&native)?)
    }
}

/// Splits `image`, predicts every tile and merges the results.
///
/// Up to `config.max_workers` predictions run at once. If any tile fails
/// the whole call fails with [`TileLabelError::PredictionFailed`] naming
/// that tile; a partial merge is never returned.
pub fn predict_tiled<P: Predictor + ?Sized>(
    image: &DynamicImage,
    predictor: &P,
    config: &TilingConfig,
) -> Result<Document, TileLabelError> {
    config.validate()?;
    let (width, height) = image.dimensions();
    let tiles = split(image, config)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.max_workers.min(tiles.len()).max(1))
        .build()?;

    let results: Vec<TileResult> = pool.install(|| {
        tiles
            .par_iter()
            .map(|tile| {
                debug!(
                    "predicting tile {} at ({}, {}) size {}x{}",
                    tile.index, tile.x_offset, tile.y_offset, tile.width, tile.height
                );
                predictor
                    .predict(&tile.bytes)
                    .map(|document| TileResult::new(document, tile.x_offset, tile.y_offset))
                    .map_err(|source| TileLabelError::PredictionFailed {
                        tile_index: tile.index,
                        x_offset: tile.x_offset,
                        y_offset: tile.y_offset,
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()
    })?;

    combine(&results, width, height, config.iou_threshold)
}

/// Predicts `image` directly when it fits in one tile, otherwise through
/// [`predict_tiled`].
///
/// A direct prediction is returned as the predictor produced it, except
/// that missing image dimensions are filled in.
pub fn predict_image<P: Predictor + ?Sized>(
    image: &DynamicImage,
    predictor: &P,
    config: &TilingConfig,
) -> Result<Document, TileLabelError> {
    let (width, height) = image.dimensions();
    if needs_tiling(width, height, config) {
        return predict_tiled(image, predictor, config);
    }

    let bytes = encode_jpeg(image, 0)?;
    let mut document = predictor
        .predict(&bytes)
        .map_err(|source| TileLabelError::PredictionFailed {
            tile_index: 0,
            x_offset: 0,
            y_offset: 0,
            source,
        })?;
    if document.image.width == 0 || document.image.height == 0 {
        document.image.width = width;
        document.image.height = height;
    }
    Ok(document)
}
