//! Core types for mask compositing operations

use crate::{
    config::{ModelType, OutputFormat},
    error::{BgRemovalError, Result},
    services::ImageIOService,
    utils::NumericValidator,
};
use chrono::{DateTime, Utc};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgba, RgbaImage};
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// RGBA8 pixel raster
///
/// The buffer always holds exactly `width * height * 4` bytes in R, G, B, A
/// order and both dimensions are non-zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    image: RgbaImage,
}

impl Raster {
    /// Create a raster from a raw RGBA buffer
    ///
    /// # Errors
    /// - Zero dimensions
    /// - Buffer length different from `width * height * 4`
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = NumericValidator::buffer_len(width, height, 4)?;
        if pixels.len() != expected {
            return Err(BgRemovalError::render_target(format!(
                "RGBA buffer holds {} bytes, a {}x{} raster needs {}",
                pixels.len(),
                width,
                height,
                expected
            )));
        }

        let image = ImageBuffer::from_raw(width, height, pixels).ok_or_else(|| {
            BgRemovalError::render_target("Failed to create image surface from RGBA buffer")
        })?;
        Ok(Self { image })
    }

    /// Create a raster with every pixel set to `color`
    ///
    /// # Errors
    /// - Zero dimensions or a surface too large to allocate
    pub fn filled(width: u32, height: u32, color: Rgba<u8>) -> Result<Self> {
        NumericValidator::buffer_len(width, height, 4)?;
        Ok(Self {
            image: ImageBuffer::from_pixel(width, height, color),
        })
    }

    /// Wrap an existing RGBA image
    ///
    /// # Errors
    /// - Zero dimensions
    pub fn from_image(image: RgbaImage) -> Result<Self> {
        NumericValidator::buffer_len(image.width(), image.height(), 4)?;
        Ok(Self { image })
    }

    /// Convert any decoded image to RGBA8
    ///
    /// # Errors
    /// - Zero dimensions
    pub fn from_dynamic(image: &DynamicImage) -> Result<Self> {
        Self::from_image(image.to_rgba8())
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Raster dimensions as `(width, height)`
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Raw RGBA bytes
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Pixel at `(x, y)`, `None` when out of bounds
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        self.image.get_pixel_checked(x, y).copied()
    }

    /// Alpha channel at `(x, y)`, `None` when out of bounds
    #[must_use]
    pub fn alpha(&self, x: u32, y: u32) -> Option<u8> {
        self.pixel(x, y).map(|p| p[3])
    }

    #[must_use]
    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn as_image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Consume the raster and return its RGBA buffer
    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.image.into_raw()
    }
}

/// Meaning of the scores a segmentation backend returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskPolarity {
    /// Score is the probability that a pixel belongs to the foreground
    #[default]
    Foreground,
    /// Score is the probability that a pixel belongs to the background
    Background,
}

/// Raw mask samples as produced by a backend, before coercion to `f32`
#[derive(Debug, Clone, PartialEq)]
pub enum MaskSamples {
    /// Floating point scores, expected in `[0, 1]`
    F32(Vec<f32>),
    /// 8-bit normalized samples (`0..=255`)
    U8(Vec<u8>),
    /// 16-bit normalized samples (`0..=65535`)
    U16(Vec<u16>),
}

impl MaskSamples {
    fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::U8(v) => v.len(),
            Self::U16(v) => v.len(),
        }
    }

    fn into_scores(self) -> Vec<f32> {
        match self {
            Self::F32(v) => v.into_iter().map(coerce_score).collect(),
            Self::U8(v) => v.into_iter().map(|s| f32::from(s) / 255.0).collect(),
            Self::U16(v) => v.into_iter().map(|s| f32::from(s) / 65535.0).collect(),
        }
    }
}

fn coerce_score(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Single-channel mask with one score in `[0, 1]` per pixel
///
/// The mask resolution is independent of the raster it is applied to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentationMask {
    width: u32,
    height: u32,
    scores: Vec<f32>,
}

impl SegmentationMask {
    /// Create a mask from floating point scores
    ///
    /// Values are clamped to `[0, 1]` and NaN becomes 0.
    ///
    /// # Errors
    /// - Zero dimensions
    /// - Score count different from `width * height`
    pub fn new(width: u32, height: u32, scores: Vec<f32>) -> Result<Self> {
        Self::from_samples(width, height, MaskSamples::F32(scores))
    }

    /// Create a mask from any supported sample representation
    ///
    /// # Errors
    /// - Zero dimensions
    /// - Sample count different from `width * height`
    pub fn from_samples(width: u32, height: u32, samples: MaskSamples) -> Result<Self> {
        let expected = NumericValidator::buffer_len(width, height, 1)
            .map_err(|e| BgRemovalError::inference(format!("Malformed mask: {}", e)))?;
        if samples.len() != expected {
            return Err(BgRemovalError::inference(format!(
                "Malformed mask: {} samples for a {}x{} mask",
                samples.len(),
                width,
                height
            )));
        }

        Ok(Self {
            width,
            height,
            scores: samples.into_scores(),
        })
    }

    /// Create a mask with every score set to `value`
    ///
    /// # Errors
    /// - Zero dimensions
    pub fn filled(width: u32, height: u32, value: f32) -> Result<Self> {
        let len = NumericValidator::buffer_len(width, height, 1)?;
        Ok(Self {
            width,
            height,
            scores: vec![coerce_score(value); len],
        })
    }

    /// Create a mask from an 8-bit grayscale image
    ///
    /// # Errors
    /// - Zero dimensions
    pub fn from_gray(image: &GrayImage) -> Result<Self> {
        Self::from_samples(
            image.width(),
            image.height(),
            MaskSamples::U8(image.as_raw().clone()),
        )
    }

    /// Create a mask from a single-channel NCHW output tensor
    ///
    /// # Errors
    /// - Batch or channel count other than 1
    /// - Empty spatial dimensions
    pub fn from_tensor(tensor: &Array4<f32>) -> Result<Self> {
        let (batch, channels, height, width) = tensor.dim();

        if batch != 1 || channels != 1 {
            return Err(BgRemovalError::inference(format!(
                "Expected single-channel output tensor, got shape ({}, {}, {}, {})",
                batch, channels, height, width
            )));
        }

        let width = u32::try_from(width)
            .map_err(|_| BgRemovalError::inference("Tensor width too large for a mask"))?;
        let height = u32::try_from(height)
            .map_err(|_| BgRemovalError::inference("Tensor height too large for a mask"))?;

        Self::new(width, height, tensor.iter().copied().collect())
    }

    /// Same-sized mask holding `scores`, which must already be in `[0, 1]`
    pub(crate) fn with_scores(&self, scores: Vec<f32>) -> Self {
        debug_assert_eq!(scores.len(), self.scores.len());
        Self {
            width: self.width,
            height: self.height,
            scores,
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Mask dimensions as `(width, height)`
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Scores in row-major order
    #[must_use]
    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    /// Mutable scores in row-major order
    pub fn scores_mut(&mut self) -> &mut [f32] {
        &mut self.scores
    }

    /// Score at `(x, y)`, `None` when out of bounds
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.scores
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Mask with every score replaced by `1 - score`
    #[must_use]
    pub fn inverted(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            scores: self.scores.iter().map(|v| 1.0 - v).collect(),
        }
    }

    /// Normalize a backend mask so that scores mean foreground strength
    #[must_use]
    pub fn with_polarity(self, polarity: MaskPolarity) -> Self {
        match polarity {
            MaskPolarity::Foreground => self,
            MaskPolarity::Background => self.inverted(),
        }
    }

    /// Convert the mask to an 8-bit grayscale image
    #[must_use]
    pub fn to_gray_image(&self) -> GrayImage {
        ImageBuffer::from_fn(self.width, self.height, |x, y| {
            let value = self.get(x, y).unwrap_or(0.0);
            Luma([(value * 255.0).round() as u8])
        })
    }

    /// Get mask statistics (pixels at or above 0.5 count as foreground)
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.scores.len();
        let foreground_pixels = self.scores.iter().filter(|&&v| v >= 0.5).count();
        let sum: f64 = self.scores.iter().map(|&v| f64::from(v)).sum();

        MaskStatistics {
            total_pixels,
            foreground_pixels,
            background_pixels: total_pixels - foreground_pixels,
            foreground_ratio: foreground_pixels as f32 / total_pixels as f32,
            mean_score: (sum / total_pixels as f64) as f32,
        }
    }

    /// Save mask as grayscale PNG
    ///
    /// # Errors
    /// - File creation or PNG encoding failures
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.to_gray_image()
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| BgRemovalError::encode(format!("Failed to save mask '{}': {}", path.display(), e)))
    }
}

/// Mask after enhancement: every value is a final foreground weight
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhancedMask(SegmentationMask);

impl EnhancedMask {
    /// Treat the scores of `mask` as final foreground weights
    #[must_use]
    pub fn from_weights(mask: SegmentationMask) -> Self {
        Self(mask)
    }

    #[must_use]
    pub fn as_mask(&self) -> &SegmentationMask {
        &self.0
    }

    #[must_use]
    pub fn into_mask(self) -> SegmentationMask {
        self.0
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    /// Weight at `(x, y)`, `None` when out of bounds
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        self.0.get(x, y)
    }
}

/// Kind of a user supplied hint point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointKind {
    Foreground,
    Background,
}

impl PointKind {
    /// Mask value the point pulls its neighbourhood towards
    #[must_use]
    pub fn target(self) -> f32 {
        match self {
            Self::Foreground => 1.0,
            Self::Background => 0.0,
        }
    }
}

/// Hint point in working-raster pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub kind: PointKind,
}

impl Point {
    #[must_use]
    pub fn foreground(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            kind: PointKind::Foreground,
        }
    }

    #[must_use]
    pub fn background(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            kind: PointKind::Background,
        }
    }
}

/// Statistics about a segmentation mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub foreground_pixels: usize,
    pub background_pixels: usize,
    pub foreground_ratio: f32,
    pub mean_score: f32,
}

/// Detailed timing breakdown for one processing request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Image decoding from bytes
    pub image_decode_ms: u64,

    /// Resize to the working resolution
    pub resize_ms: u64,

    /// Model preparation in the backend
    pub model_load_ms: u64,

    /// Backend inference, including a fallback retry
    pub inference_ms: u64,

    /// Mask normalization and enhancement
    pub enhancement_ms: u64,

    /// Alpha mapping and background fill
    pub compositing_ms: u64,

    /// Final image encoding (if encoded)
    pub image_encode_ms: Option<u64>,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    fn measured_ms(&self) -> u64 {
        self.image_decode_ms
            + self.resize_ms
            + self.model_load_ms
            + self.inference_ms
            + self.enhancement_ms
            + self.compositing_ms
            + self.image_encode_ms.unwrap_or(0)
    }

    /// Time not attributed to any measured phase
    #[must_use]
    pub fn other_overhead_ms(&self) -> u64 {
        self.total_ms.saturating_sub(self.measured_ms())
    }

    /// Get timing summary for display
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Total: {}ms | Decode: {}ms | Resize: {}ms | Model: {}ms | Inference: {}ms | Enhance: {}ms | Composite: {}ms",
            self.total_ms,
            self.image_decode_ms,
            self.resize_ms,
            self.model_load_ms,
            self.inference_ms,
            self.enhancement_ms,
            self.compositing_ms
        );

        if let Some(encode_ms) = self.image_encode_ms {
            summary.push_str(&format!(" | Encode: {}ms", encode_ms));
        }

        let other_ms = self.other_overhead_ms();
        if other_ms > 5 {
            summary.push_str(&format!(" | Other: {}ms", other_ms));
        }

        summary
    }
}

/// Metadata about one processing request
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingMetadata {
    /// Correlation id of the request
    pub request_id: Uuid,

    /// When processing started
    pub started_at: DateTime<Utc>,

    /// Model whose mask was used, `None` for point-only masks
    pub model: Option<ModelType>,

    /// Whether the fallback model produced the mask
    pub used_fallback: bool,

    /// Dimensions of the input raster
    pub original_dimensions: (u32, u32),

    /// Dimensions after resizing, equal to the output dimensions
    pub working_dimensions: (u32, u32),

    /// Native resolution of the mask
    pub mask_dimensions: (u32, u32),

    /// Statistics of the enhanced mask
    pub mask_statistics: Option<MaskStatistics>,

    /// Detailed timing breakdown
    pub timings: ProcessingTimings,
}

impl ProcessingMetadata {
    /// Fresh metadata with a new request id
    #[must_use]
    pub fn new(original_dimensions: (u32, u32)) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            started_at: Utc::now(),
            model: None,
            used_fallback: false,
            original_dimensions,
            working_dimensions: original_dimensions,
            mask_dimensions: (0, 0),
            mask_statistics: None,
            timings: ProcessingTimings::default(),
        }
    }
}

/// Result of a background removal request
#[derive(Debug, Clone)]
pub struct RemovalResult {
    /// Composited (and possibly flattened) raster at working resolution
    pub image: Raster,

    /// Enhanced mask at its native resolution
    pub mask: EnhancedMask,

    /// Processing metadata
    pub metadata: ProcessingMetadata,
}

impl RemovalResult {
    #[must_use]
    pub fn new(image: Raster, mask: EnhancedMask, metadata: ProcessingMetadata) -> Self {
        Self {
            image,
            mask,
            metadata,
        }
    }

    /// Output dimensions
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Encode the result in the given format
    ///
    /// `quality` is in `[0, 1]` and only used by JPEG (default 0.9).
    ///
    /// # Errors
    /// - Encoding failures
    pub fn to_bytes(&self, format: OutputFormat, quality: Option<f32>) -> Result<Vec<u8>> {
        ImageIOService::encode(&self.image, format, quality)
    }

    /// Encode the result and record the encode time in the metadata
    ///
    /// # Errors
    /// - Encoding failures
    pub fn encode_timed(&mut self, format: OutputFormat, quality: Option<f32>) -> Result<Vec<u8>> {
        let encode_start = instant::Instant::now();
        let bytes = self.to_bytes(format, quality)?;
        let encode_ms = encode_start.elapsed().as_millis() as u64;
        self.metadata.timings.image_encode_ms = Some(encode_ms);
        self.metadata.timings.total_ms += encode_ms;
        Ok(bytes)
    }

    /// Save the result in the given format
    ///
    /// # Errors
    /// - Encoding or file write failures
    pub fn save<P: AsRef<Path>>(
        &self,
        path: P,
        format: OutputFormat,
        quality: Option<f32>,
    ) -> Result<()> {
        ImageIOService::save(&self.image, path, format, quality)
    }

    /// Save the result as PNG with alpha channel
    ///
    /// # Errors
    /// - Encoding or file write failures
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.save(path, OutputFormat::Png, None)
    }

    /// Get timing summary for display
    #[must_use]
    pub fn timing_summary(&self) -> String {
        self.metadata.timings.summary()
    }
}
