//! Configuration types for mask compositing operations

use crate::{
    error::{BgRemovalError, Result},
    utils::{ColorParser, NumericValidator},
};
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Segmentation models a backend may be asked to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModelType {
    /// `SegFormer` B0 fine-tuned on ADE20k (small, fast)
    SegformerB0,
    /// `SegFormer` B2 fine-tuned on ADE20k (larger, more accurate)
    SegformerB2,
}

impl ModelType {
    /// All supported models
    pub const ALL: [ModelType; 2] = [ModelType::SegformerB0, ModelType::SegformerB2];

    /// Hugging Face identifier of the model
    #[must_use]
    pub fn identifier(&self) -> &'static str {
        match self {
            Self::SegformerB0 => "Xenova/segformer-b0-finetuned-ade-512-512",
            Self::SegformerB2 => "Xenova/segformer-b2-finetuned-ade-512-512",
        }
    }
}

impl Default for ModelType {
    fn default() -> Self {
        Self::SegformerB2
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for ModelType {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|model| model.identifier() == s.trim())
            .ok_or_else(|| BgRemovalError::invalid_config(format!("Unsupported model '{}'", s)))
    }
}

impl TryFrom<String> for ModelType {
    type Error = BgRemovalError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ModelType> for String {
    fn from(model: ModelType) -> Self {
        model.identifier().to_string()
    }
}

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    Png,
    /// JPEG (no transparency)
    Jpeg,
    /// WebP with alpha channel transparency (lossless)
    WebP,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Png
    }
}

/// Fill behind the foreground after compositing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackgroundColor {
    /// Keep the alpha channel, no flattening
    Transparent,
    /// Flatten onto a solid color (alpha below 255 gives a translucent fill)
    Solid(Rgba<u8>),
}

impl BackgroundColor {
    /// Opaque color from RGB components
    #[must_use]
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::Solid(Rgba([r, g, b, 255]))
    }

    /// Opaque white
    #[must_use]
    pub fn white() -> Self {
        Self::rgb(255, 255, 255)
    }

    /// Whether compositing keeps transparency
    #[must_use]
    pub fn is_transparent(&self) -> bool {
        matches!(self, Self::Transparent)
    }
}

impl Default for BackgroundColor {
    fn default() -> Self {
        Self::Transparent
    }
}

impl fmt::Display for BackgroundColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&ColorParser::to_hex(self))
    }
}

impl FromStr for BackgroundColor {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        ColorParser::parse(s)
    }
}

impl TryFrom<String> for BackgroundColor {
    type Error = BgRemovalError;

    fn try_from(value: String) -> Result<Self> {
        ColorParser::parse(&value)
    }
}

impl From<BackgroundColor> for String {
    fn from(color: BackgroundColor) -> Self {
        ColorParser::to_hex(&color)
    }
}

/// Per-request removal settings
///
/// Settings are owned by the caller and passed by reference into every
/// processing call; nothing in the pipeline mutates or caches them. The
/// core stages trust the values they are given, so run [`validate`] (or
/// build through [`RemovalSettings::builder`]) on anything user supplied.
///
/// [`validate`]: RemovalSettings::validate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::struct_excessive_bools)]
pub struct RemovalSettings {
    /// Segmentation model requested from the backend
    pub model: ModelType,

    /// Center of the soft transition band
    pub threshold: f32,

    /// Half-width of the soft transition band (0 = hard threshold)
    pub softness: f32,

    /// Strength of the edge contrast boost (0 disables it)
    pub edge_enhancement: f32,

    /// Flip isolated pixels that disagree with their neighbourhood
    pub cleanup: bool,

    /// Fill behind the foreground
    pub background_color: BackgroundColor,

    /// Reserved, not read by the compositing core
    pub preserve_details: bool,

    /// Reserved, not read by the compositing core
    pub remove_shades: bool,

    /// Reserved, not read by the compositing core
    pub finetune_mode: bool,
}

impl Default for RemovalSettings {
    fn default() -> Self {
        Self {
            model: ModelType::default(),
            threshold: 0.35,
            softness: 0.3,
            edge_enhancement: 0.4,
            cleanup: true,
            background_color: BackgroundColor::default(),
            preserve_details: true,
            remove_shades: true,
            finetune_mode: false,
        }
    }
}

impl RemovalSettings {
    /// Valid threshold range offered by the settings surface
    pub const THRESHOLD_RANGE: (f32, f32) = (0.05, 0.95);

    /// Create a new settings builder
    ///
    /// # Examples
    /// ```rust
    /// use imgly_maskcomp::{RemovalSettings, BackgroundColor};
    ///
    /// let settings = RemovalSettings::builder()
    ///     .threshold(0.4)
    ///     .softness(0.1)
    ///     .cleanup(false)
    ///     .background_color(BackgroundColor::white())
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(settings.threshold, 0.4);
    /// ```
    #[must_use]
    pub fn builder() -> RemovalSettingsBuilder {
        RemovalSettingsBuilder::default()
    }

    /// Validate all settings values
    ///
    /// # Errors
    /// - Threshold outside 0.05-0.95
    /// - Softness outside 0-1
    /// - Edge enhancement outside 0-1
    pub fn validate(&self) -> Result<()> {
        let (min, max) = Self::THRESHOLD_RANGE;
        if !self.threshold.is_finite() || self.threshold < min || self.threshold > max {
            return Err(BgRemovalError::config_value_error(
                "threshold",
                self.threshold,
                "0.05-0.95",
                Some(0.35),
            ));
        }

        NumericValidator::validate_unit_interval(self.softness, "softness")?;
        NumericValidator::validate_unit_interval(self.edge_enhancement, "edge enhancement")?;

        Ok(())
    }

    /// Parse settings from a JSON document, filling missing fields with defaults
    ///
    /// # Errors
    /// - Malformed JSON or unknown model / color strings
    /// - Values failing [`RemovalSettings::validate`]
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| BgRemovalError::invalid_config(format!("Invalid settings JSON: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize settings to JSON
    ///
    /// # Errors
    /// - Serialization failure
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| BgRemovalError::invalid_config(format!("Cannot serialize settings: {}", e)))
    }
}

/// Builder for `RemovalSettings`
#[derive(Debug, Default)]
pub struct RemovalSettingsBuilder {
    settings: RemovalSettings,
}

impl RemovalSettingsBuilder {
    /// Set the segmentation model
    #[must_use]
    pub fn model(mut self, model: ModelType) -> Self {
        self.settings.model = model;
        self
    }

    /// Set the threshold
    #[must_use]
    pub fn threshold(mut self, threshold: f32) -> Self {
        self.settings.threshold = threshold;
        self
    }

    /// Set the softness
    #[must_use]
    pub fn softness(mut self, softness: f32) -> Self {
        self.settings.softness = softness;
        self
    }

    /// Set the edge enhancement strength
    #[must_use]
    pub fn edge_enhancement(mut self, strength: f32) -> Self {
        self.settings.edge_enhancement = strength;
        self
    }

    /// Enable or disable isolated pixel cleanup
    #[must_use]
    pub fn cleanup(mut self, cleanup: bool) -> Self {
        self.settings.cleanup = cleanup;
        self
    }

    /// Set the background fill
    #[must_use]
    pub fn background_color(mut self, color: BackgroundColor) -> Self {
        self.settings.background_color = color;
        self
    }

    #[must_use]
    pub fn preserve_details(mut self, enabled: bool) -> Self {
        self.settings.preserve_details = enabled;
        self
    }

    #[must_use]
    pub fn remove_shades(mut self, enabled: bool) -> Self {
        self.settings.remove_shades = enabled;
        self
    }

    #[must_use]
    pub fn finetune_mode(mut self, enabled: bool) -> Self {
        self.settings.finetune_mode = enabled;
        self
    }

    /// Build and validate the settings
    ///
    /// # Errors
    /// - Any value failing [`RemovalSettings::validate`]
    pub fn build(self) -> Result<RemovalSettings> {
        let settings = self.settings;
        settings.validate()?;
        Ok(settings)
    }
}
