//! Mask to alpha compositing and background fill

use crate::{
    config::{BackgroundColor, RemovalSettings},
    error::Result,
    types::{EnhancedMask, Raster},
};
use image::Rgba;

/// Maps an enhanced mask onto a raster's alpha channel
#[derive(Debug, Clone, PartialEq)]
pub struct Compositor {
    background_color: BackgroundColor,
}

impl Compositor {
    #[must_use]
    pub fn new(settings: &RemovalSettings) -> Self {
        Self {
            background_color: settings.background_color,
        }
    }

    /// Apply `mask` as the alpha channel of a copy of `raster`
    ///
    /// The mask may have any resolution; each raster pixel takes the mask
    /// sample found by integer nearest-neighbour mapping. RGB channels are
    /// kept. With a solid background color the result is flattened onto it.
    ///
    /// # Errors
    /// - The output surface could not be created
    pub fn apply(&self, raster: &Raster, mask: &EnhancedMask) -> Result<Raster> {
        let (width, height) = raster.dimensions();
        let (mask_width, mask_height) = mask.dimensions();

        let column_map: Vec<u32> = (0..width)
            .map(|x| Self::map_coordinate(x, width, mask_width))
            .collect();

        let mut output = raster.clone();
        for (x, y, pixel) in output.as_image_mut().enumerate_pixels_mut() {
            let mx = column_map
                .get(x as usize)
                .copied()
                .unwrap_or(mask_width.saturating_sub(1));
            let my = Self::map_coordinate(y, height, mask_height);
            let weight = mask.get(mx, my).unwrap_or(0.0);
            pixel[3] = Self::alpha_from_weight(weight);
        }

        match self.background_color {
            BackgroundColor::Transparent => Ok(output),
            BackgroundColor::Solid(color) => Self::flatten(&output, color),
        }
    }

    /// Nearest-neighbour index of raster coordinate `x` in a mask axis
    ///
    /// Computed as `min(x * mask_len / raster_len, mask_len - 1)` in integer
    /// arithmetic, so results are bit-reproducible.
    #[must_use]
    pub fn map_coordinate(x: u32, raster_len: u32, mask_len: u32) -> u32 {
        if raster_len == 0 || mask_len == 0 {
            return 0;
        }
        let mapped = u64::from(x) * u64::from(mask_len) / u64::from(raster_len);
        mapped.min(u64::from(mask_len - 1)) as u32
    }

    /// Alpha for a foreground weight: 0 is transparent, 1 is opaque
    #[must_use]
    pub fn alpha_from_weight(weight: f32) -> u8 {
        (weight.clamp(0.0, 1.0) * 255.0).round() as u8
    }

    /// Draw `raster` over a surface filled with `color` (Porter-Duff "over")
    ///
    /// # Errors
    /// - The fill surface could not be created
    pub fn flatten(raster: &Raster, color: Rgba<u8>) -> Result<Raster> {
        let (width, height) = raster.dimensions();
        let mut canvas = Raster::filled(width, height, color)?;

        for (dst, src) in canvas
            .as_image_mut()
            .pixels_mut()
            .zip(raster.as_image().pixels())
        {
            *dst = Self::over(*src, *dst);
        }

        Ok(canvas)
    }

    fn over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
        let src_alpha = f32::from(src[3]) / 255.0;
        let dst_alpha = f32::from(dst[3]) / 255.0;
        let out_alpha = src_alpha + dst_alpha * (1.0 - src_alpha);

        if out_alpha <= 0.0 {
            return Rgba([0, 0, 0, 0]);
        }

        let blend = |channel: usize| {
            let value = (f32::from(src[channel]) * src_alpha
                + f32::from(dst[channel]) * dst_alpha * (1.0 - src_alpha))
                / out_alpha;
            value.round().clamp(0.0, 255.0) as u8
        };

        Rgba([
            blend(0),
            blend(1),
            blend(2),
            (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SegmentationMask;

    fn weights(width: u32, height: u32, scores: Vec<f32>) -> EnhancedMask {
        EnhancedMask::from_weights(SegmentationMask::new(width, height, scores).unwrap())
    }

    fn transparent() -> Compositor {
        Compositor::new(&RemovalSettings::default())
    }

    #[test]
    fn test_alpha_convention() {
        assert_eq!(Compositor::alpha_from_weight(0.0), 0);
        assert_eq!(Compositor::alpha_from_weight(1.0), 255);
        assert_eq!(Compositor::alpha_from_weight(0.5), 128);
    }

    #[test]
    fn test_apply_same_resolution_keeps_rgb() {
        let raster = Raster::from_raw(2, 1, vec![10, 20, 30, 255, 40, 50, 60, 7]).unwrap();
        let result = transparent().apply(&raster, &weights(2, 1, vec![0.0, 1.0])).unwrap();

        assert_eq!(result.pixel(0, 0), Some(Rgba([10, 20, 30, 0])));
        assert_eq!(result.pixel(1, 0), Some(Rgba([40, 50, 60, 255])));
    }

    #[test]
    fn test_map_coordinate() {
        // Upscaling repeats mask samples
        let mapped: Vec<u32> = (0..4).map(|x| Compositor::map_coordinate(x, 4, 2)).collect();
        assert_eq!(mapped, vec![0, 0, 1, 1]);

        // Downscaling skips mask samples
        let mapped: Vec<u32> = (0..3).map(|x| Compositor::map_coordinate(x, 3, 9)).collect();
        assert_eq!(mapped, vec![0, 3, 6]);

        assert_eq!(Compositor::map_coordinate(1023, 1024, 64), 63);
        assert_eq!(Compositor::map_coordinate(u32::MAX - 1, u32::MAX, u32::MAX), u32::MAX - 1);
    }

    #[test]
    fn test_apply_with_lower_resolution_mask() {
        let raster = Raster::filled(4, 2, Rgba([1, 2, 3, 255])).unwrap();
        let mask = weights(2, 1, vec![1.0, 0.0]);
        let result = transparent().apply(&raster, &mask).unwrap();

        for y in 0..2 {
            assert_eq!(result.alpha(0, y), Some(255));
            assert_eq!(result.alpha(1, y), Some(255));
            assert_eq!(result.alpha(2, y), Some(0));
            assert_eq!(result.alpha(3, y), Some(0));
        }
    }

    #[test]
    fn test_solid_background_flattens() {
        let settings = RemovalSettings {
            background_color: BackgroundColor::rgb(0, 0, 255),
            ..RemovalSettings::default()
        };
        let raster = Raster::filled(3, 1, Rgba([255, 0, 0, 255])).unwrap();
        let mask = weights(3, 1, vec![1.0, 0.0, 128.0 / 255.0]);
        let result = Compositor::new(&settings).apply(&raster, &mask).unwrap();

        assert_eq!(result.pixel(0, 0), Some(Rgba([255, 0, 0, 255])));
        assert_eq!(result.pixel(1, 0), Some(Rgba([0, 0, 255, 255])));
        assert_eq!(result.pixel(2, 0), Some(Rgba([128, 0, 127, 255])));
    }

    #[test]
    fn test_translucent_fill() {
        let raster = Raster::filled(1, 1, Rgba([255, 255, 255, 0])).unwrap();
        let result = Compositor::flatten(&raster, Rgba([0, 0, 0, 128])).unwrap();
        assert_eq!(result.pixel(0, 0), Some(Rgba([0, 0, 0, 128])));

        let empty = Compositor::flatten(&raster, Rgba([9, 9, 9, 0])).unwrap();
        assert_eq!(empty.pixel(0, 0), Some(Rgba([0, 0, 0, 0])));
    }
}
