//! Working resolution resizing

use crate::{
    error::{BgRemovalError, Result},
    types::Raster,
};
use image::imageops::{self, FilterType};

/// Default bound for the longest side of the working raster
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

/// Bounds rasters to a maximum working resolution
pub struct ImageResizer;

impl ImageResizer {
    /// Target dimensions for fitting `(width, height)` within `max_dimension`
    ///
    /// Returns the input dimensions unchanged when both sides already fit.
    ///
    /// # Errors
    /// - `max_dimension` of zero
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> Result<(u32, u32)> {
        if max_dimension == 0 {
            return Err(BgRemovalError::config_value_error(
                "max dimension",
                max_dimension,
                "1 or greater",
                Some(DEFAULT_MAX_DIMENSION),
            ));
        }

        if width <= max_dimension && height <= max_dimension {
            return Ok((width, height));
        }

        let max = f64::from(max_dimension);
        let ratio = (max / f64::from(width)).min(max / f64::from(height));

        // Clamped to [1, max_dimension] before narrowing
        let scale_side = |side: u32| (f64::from(side) * ratio).round().clamp(1.0, max) as u32;

        Ok((scale_side(width), scale_side(height)))
    }

    /// Fit a raster within `max_dimension`, preserving aspect ratio
    ///
    /// Rasters that already fit are copied unchanged; larger ones are
    /// resampled with a bilinear (triangle) filter.
    ///
    /// # Errors
    /// - `max_dimension` of zero
    /// - The resampled surface could not be created
    pub fn fit_within(raster: &Raster, max_dimension: u32) -> Result<Raster> {
        let (width, height) = raster.dimensions();
        let (new_width, new_height) = Self::target_dimensions(width, height, max_dimension)?;

        if (new_width, new_height) == (width, height) {
            return Ok(raster.clone());
        }

        log::debug!(
            "Resizing {}x{} to {}x{} (max dimension {})",
            width,
            height,
            new_width,
            new_height,
            max_dimension
        );

        let resized = imageops::resize(raster.as_image(), new_width, new_height, FilterType::Triangle);
        Raster::from_image(resized).map_err(|e| {
            BgRemovalError::stage_error(
                "resize",
                &e.to_string(),
                Some(&format!("{}x{} -> {}x{}", width, height, new_width, new_height)),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_small_raster_is_copied() {
        let raster = Raster::filled(300, 200, Rgba([1, 2, 3, 255])).unwrap();
        let resized = ImageResizer::fit_within(&raster, 1024).unwrap();
        assert_eq!(resized, raster);

        // Exactly at the bound is not resized either
        let raster = Raster::filled(1024, 10, Rgba([1, 2, 3, 255])).unwrap();
        assert_eq!(ImageResizer::fit_within(&raster, 1024).unwrap().dimensions(), (1024, 10));
    }

    #[test]
    fn test_landscape_is_bounded() {
        let raster = Raster::filled(2048, 1024, Rgba([9, 9, 9, 255])).unwrap();
        let resized = ImageResizer::fit_within(&raster, 1024).unwrap();
        assert_eq!(resized.dimensions(), (1024, 512));
        assert_eq!(resized.pixel(10, 10), Some(Rgba([9, 9, 9, 255])));
    }

    #[test]
    fn test_target_dimensions() {
        assert_eq!(ImageResizer::target_dimensions(1500, 3000, 1024).unwrap(), (512, 1024));
        assert_eq!(ImageResizer::target_dimensions(1025, 1025, 1024).unwrap(), (1024, 1024));
        assert_eq!(ImageResizer::target_dimensions(1999, 1000, 1000).unwrap(), (1000, 500));
    }

    #[test]
    fn test_extreme_aspect_ratio_keeps_one_pixel() {
        assert_eq!(ImageResizer::target_dimensions(10_000, 1, 100).unwrap(), (100, 1));
        assert_eq!(ImageResizer::target_dimensions(1, 10_000, 100).unwrap(), (1, 100));
    }

    #[test]
    fn test_zero_max_dimension_is_rejected() {
        let raster = Raster::filled(4, 4, Rgba([0, 0, 0, 255])).unwrap();
        assert!(matches!(
            ImageResizer::fit_within(&raster, 0),
            Err(BgRemovalError::InvalidConfig(_))
        ));
    }
}
