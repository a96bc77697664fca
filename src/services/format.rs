//! Output format handling service
//!
//! Keeps format specific decisions (extension, MIME type, alpha support,
//! quality mapping) out of the codec and the processor.

use crate::{
    config::OutputFormat,
    error::{BgRemovalError, Result},
    types::Raster,
};
use image::{DynamicImage, ImageFormat};

/// Default JPEG quality in `[0, 1]`
pub const DEFAULT_JPEG_QUALITY: f32 = 0.9;

/// Service for handling output format conversions
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Convert a raster into the pixel layout the target format stores
    ///
    /// JPEG has no alpha channel, so the alpha plane is dropped and the RGB
    /// channels are kept as they are. Flatten onto a background color first
    /// if transparent regions should not show their underlying RGB.
    #[must_use]
    pub fn convert_format(raster: &Raster, format: OutputFormat) -> DynamicImage {
        let image = DynamicImage::ImageRgba8(raster.as_image().clone());
        match format {
            OutputFormat::Png | OutputFormat::WebP => image,
            OutputFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        }
    }

    /// File extension (without the dot)
    ///
    /// # Examples
    /// ```rust
    /// use imgly_maskcomp::{services::OutputFormatHandler, OutputFormat};
    ///
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Png), "png");
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Jpeg), "jpg");
    /// ```
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
        }
    }

    /// MIME type of the encoded output
    #[must_use]
    pub fn mime_type(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::WebP => "image/webp",
        }
    }

    /// `image` crate format used for encoding
    #[must_use]
    pub fn image_format(format: OutputFormat) -> ImageFormat {
        match format {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::WebP => ImageFormat::WebP,
        }
    }

    /// Guess the output format from a file extension
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<OutputFormat> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(OutputFormat::Png),
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "webp" => Some(OutputFormat::WebP),
            _ => None,
        }
    }

    /// Check if a format keeps the alpha channel
    ///
    /// # Examples
    /// ```rust
    /// use imgly_maskcomp::{services::OutputFormatHandler, OutputFormat};
    ///
    /// assert!(OutputFormatHandler::supports_transparency(OutputFormat::Png));
    /// assert!(!OutputFormatHandler::supports_transparency(OutputFormat::Jpeg));
    /// ```
    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        match format {
            OutputFormat::Png | OutputFormat::WebP => true,
            OutputFormat::Jpeg => false,
        }
    }

    /// Warn when a transparent result is about to lose its alpha channel
    pub fn validate_for_background_removal(format: OutputFormat, transparent_result: bool) {
        if transparent_result && !Self::supports_transparency(format) {
            log::warn!(
                "Output format {:?} does not support transparency. Removed background regions will show their original colors.",
                format
            );
        }
    }

    /// Default quality in `[0, 1]` for lossy formats, `None` for lossless ones
    #[must_use]
    pub fn default_quality(format: OutputFormat) -> Option<f32> {
        match format {
            OutputFormat::Jpeg => Some(DEFAULT_JPEG_QUALITY),
            OutputFormat::Png | OutputFormat::WebP => None,
        }
    }

    /// Map a `[0, 1]` quality to the encoder's `1..=100` scale
    ///
    /// # Errors
    /// - Quality outside `[0, 1]` or not finite
    pub fn encoder_quality(quality: f32) -> Result<u8> {
        if !quality.is_finite() || !(0.0..=1.0).contains(&quality) {
            return Err(BgRemovalError::config_value_error(
                "quality",
                quality,
                "0.0-1.0",
                Some(DEFAULT_JPEG_QUALITY),
            ));
        }

        Ok(((quality * 100.0).round() as u8).max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn raster() -> Raster {
        Raster::filled(2, 2, Rgba([255, 0, 0, 128])).unwrap()
    }

    #[test]
    fn test_convert_format_png_keeps_alpha() {
        let converted = OutputFormatHandler::convert_format(&raster(), OutputFormat::Png);
        match converted {
            DynamicImage::ImageRgba8(img) => assert_eq!(img.get_pixel(0, 0)[3], 128),
            _ => panic!("Expected RGBA8 image for PNG format"),
        }
    }

    #[test]
    fn test_convert_format_jpeg_drops_alpha() {
        let converted = OutputFormatHandler::convert_format(&raster(), OutputFormat::Jpeg);
        match converted {
            DynamicImage::ImageRgb8(img) => {
                assert_eq!(img.dimensions(), (2, 2));
                assert_eq!(img.get_pixel(1, 1).0, [255, 0, 0]);
            },
            _ => panic!("Expected RGB8 image for JPEG format"),
        }
    }

    #[test]
    fn test_extensions_and_mime_types() {
        assert_eq!(OutputFormatHandler::get_extension(OutputFormat::WebP), "webp");
        assert_eq!(OutputFormatHandler::mime_type(OutputFormat::Jpeg), "image/jpeg");
        assert_eq!(OutputFormatHandler::from_extension("JPEG"), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormatHandler::from_extension("tiff"), None);
    }

    #[test]
    fn test_supports_transparency() {
        assert!(OutputFormatHandler::supports_transparency(OutputFormat::Png));
        assert!(OutputFormatHandler::supports_transparency(OutputFormat::WebP));
        assert!(!OutputFormatHandler::supports_transparency(OutputFormat::Jpeg));
    }

    #[test]
    fn test_quality_mapping() {
        assert_eq!(OutputFormatHandler::default_quality(OutputFormat::Jpeg), Some(0.9));
        assert_eq!(OutputFormatHandler::default_quality(OutputFormat::Png), None);
        assert_eq!(OutputFormatHandler::encoder_quality(0.9).unwrap(), 90);
        assert_eq!(OutputFormatHandler::encoder_quality(0.0).unwrap(), 1);
        assert_eq!(OutputFormatHandler::encoder_quality(1.0).unwrap(), 100);
        assert!(OutputFormatHandler::encoder_quality(1.2).is_err());
        assert!(OutputFormatHandler::encoder_quality(f32::NAN).is_err());
    }
}
