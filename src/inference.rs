//! Segmentation backend abstraction and fallback handling
//!
//! The segmentation model itself lives outside this crate. A backend receives
//! the working raster as an encoded image plus a model identifier and returns
//! one or more results, the first of which must carry a mask.

use crate::{
    config::{ModelType, OutputFormat},
    error::{BgRemovalError, Result},
    services::{ImageIOService, OutputFormatHandler, ProcessingStage, ProgressTracker},
    tracing_config::events,
    types::{MaskPolarity, Raster, SegmentationMask},
};
use async_trait::async_trait;
use instant::Instant;
use std::time::Duration;

/// Encoded image handed to a segmentation backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    bytes: Vec<u8>,
    format: OutputFormat,
    width: u32,
    height: u32,
}

impl EncodedImage {
    /// Encode a raster losslessly as PNG
    ///
    /// # Errors
    /// - PNG encoding failures
    pub fn from_raster(raster: &Raster) -> Result<Self> {
        Ok(Self {
            bytes: ImageIOService::encode(raster, OutputFormat::Png, None)?,
            format: OutputFormat::Png,
            width: raster.width(),
            height: raster.height(),
        })
    }

    /// Wrap already encoded bytes
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>, format: OutputFormat, width: u32, height: u32) -> Self {
        Self {
            bytes,
            format,
            width,
            height,
        }
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        OutputFormatHandler::mime_type(self.format)
    }

    /// Dimensions of the encoded raster
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Decode back into a raster
    ///
    /// # Errors
    /// - Decoding failures
    pub fn decode(&self) -> Result<Raster> {
        ImageIOService::decode(&self.bytes)
    }
}

/// One result returned by a segmentation backend
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationOutput {
    /// Class label, if the backend provides one
    pub label: Option<String>,
    /// Confidence score, if the backend provides one
    pub score: Option<f32>,
    /// Mask at the model's native resolution
    pub mask: Option<SegmentationMask>,
    /// Meaning of the mask scores
    pub polarity: MaskPolarity,
}

impl SegmentationOutput {
    /// Result carrying a foreground probability mask
    #[must_use]
    pub fn new(mask: SegmentationMask) -> Self {
        Self {
            label: None,
            score: None,
            mask: Some(mask),
            polarity: MaskPolarity::Foreground,
        }
    }

    /// Result without a mask
    #[must_use]
    pub fn empty() -> Self {
        Self {
            label: None,
            score: None,
            mask: None,
            polarity: MaskPolarity::Foreground,
        }
    }

    #[must_use]
    pub fn with_label<S: Into<String>>(mut self, label: S) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    #[must_use]
    pub fn with_polarity(mut self, polarity: MaskPolarity) -> Self {
        self.polarity = polarity;
        self
    }
}

/// Model access settings passed to every backend call
///
/// Replaces process wide toggles: each processor carries its own copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceConfig {
    /// Whether the backend may load models from local storage
    pub allow_local_models: bool,
    /// Whether the backend may use a browser/disk cache for model files
    pub use_cache: bool,
    /// Model retried once when the requested model fails
    pub fallback_model: ModelType,
    /// Upper bound for one load + segment attempt
    pub timeout: Option<Duration>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            allow_local_models: false,
            use_cache: false,
            fallback_model: ModelType::SegformerB0,
            timeout: None,
        }
    }
}

impl InferenceConfig {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_fallback_model(mut self, model: ModelType) -> Self {
        self.fallback_model = model;
        self
    }

    #[must_use]
    pub fn with_local_models(mut self, allow: bool) -> Self {
        self.allow_local_models = allow;
        self
    }

    #[must_use]
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// - A zero timeout
    pub fn validate(&self) -> Result<()> {
        if self.timeout == Some(Duration::ZERO) {
            return Err(BgRemovalError::invalid_config(
                "Inference timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// External segmentation collaborator
#[async_trait]
pub trait SegmentationBackend: Send + Sync {
    /// Backend name for logs and metadata
    fn name(&self) -> &str;

    /// Make `model` ready for segmentation
    ///
    /// # Errors
    /// - Model unavailable or failed to load
    async fn load_model(&self, model: ModelType, config: &InferenceConfig) -> Result<()>;

    /// Segment an encoded image with `model`
    ///
    /// # Errors
    /// - Inference failures
    async fn segment(&self, image: &EncodedImage, model: ModelType) -> Result<Vec<SegmentationOutput>>;
}

/// Mask obtained from a backend, normalized to foreground strength
#[derive(Debug, Clone)]
pub struct SegmentationRun {
    /// Mask whose scores mean foreground strength
    pub mask: SegmentationMask,
    /// Model that produced the mask
    pub model: ModelType,
    /// Whether the fallback model produced the mask
    pub used_fallback: bool,
    /// Time spent in `load_model`, over all attempts
    pub model_load_ms: u64,
    /// Time spent in `segment`, over all attempts
    pub inference_ms: u64,
}

#[derive(Default)]
struct AttemptTimings {
    model_load_ms: u64,
    inference_ms: u64,
}

/// Runs a backend with a single fallback retry and an optional timeout
pub struct Segmenter<'a> {
    backend: &'a dyn SegmentationBackend,
    config: &'a InferenceConfig,
}

impl<'a> Segmenter<'a> {
    #[must_use]
    pub fn new(backend: &'a dyn SegmentationBackend, config: &'a InferenceConfig) -> Self {
        Self { backend, config }
    }

    /// Obtain a mask for `image` using `model`
    ///
    /// If `model` is not the fallback model and its attempt fails for any
    /// reason (load error, segmentation error, empty or maskless result,
    /// timeout), the call is retried once with the fallback model. The
    /// fallback model itself is never retried.
    ///
    /// # Errors
    /// - The attempt with the fallback model failed
    pub async fn segment(
        &self,
        image: &EncodedImage,
        model: ModelType,
        tracker: &mut ProgressTracker<'_>,
    ) -> Result<SegmentationRun> {
        let mut timings = AttemptTimings::default();

        match self.attempt(image, model, tracker, &mut timings).await {
            Ok(mask) => Ok(Self::finish(mask, model, false, timings)),
            Err(error) if model != self.config.fallback_model => {
                let fallback = self.config.fallback_model;
                events::fallback(model.identifier(), fallback.identifier(), &error);
                tracker.report_stage_with_description(
                    ProcessingStage::ModelLoading,
                    format!("Loading fallback model {}", fallback),
                );

                let mask = self.attempt(image, fallback, tracker, &mut timings).await?;
                Ok(Self::finish(mask, fallback, true, timings))
            },
            Err(error) => Err(error),
        }
    }

    fn finish(
        mask: SegmentationMask,
        model: ModelType,
        used_fallback: bool,
        timings: AttemptTimings,
    ) -> SegmentationRun {
        SegmentationRun {
            mask,
            model,
            used_fallback,
            model_load_ms: timings.model_load_ms,
            inference_ms: timings.inference_ms,
        }
    }

    async fn attempt(
        &self,
        image: &EncodedImage,
        model: ModelType,
        tracker: &mut ProgressTracker<'_>,
        timings: &mut AttemptTimings,
    ) -> Result<SegmentationMask> {
        let run = self.load_and_segment(image, model, tracker, timings);

        match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                BgRemovalError::inference_with_model(
                    model.identifier(),
                    "Segmentation",
                    &format!("timed out after {}ms", limit.as_millis()),
                )
            })?,
            None => run.await,
        }
    }

    async fn load_and_segment(
        &self,
        image: &EncodedImage,
        model: ModelType,
        tracker: &mut ProgressTracker<'_>,
        timings: &mut AttemptTimings,
    ) -> Result<SegmentationMask> {
        let load_start = Instant::now();
        self.backend.load_model(model, self.config).await?;
        timings.model_load_ms += load_start.elapsed().as_millis() as u64;
        tracker.report_stage(ProcessingStage::ModelLoading);

        let inference_start = Instant::now();
        let outputs = self.backend.segment(image, model).await?;
        timings.inference_ms += inference_start.elapsed().as_millis() as u64;

        let first = outputs.into_iter().next().ok_or_else(|| {
            BgRemovalError::inference_with_model(
                model.identifier(),
                "Segmentation",
                "backend returned no results",
            )
        })?;

        let polarity = first.polarity;
        let mask = first.mask.ok_or_else(|| {
            BgRemovalError::inference_with_model(
                model.identifier(),
                "Segmentation",
                "result contains no mask",
            )
        })?;

        tracing::debug!(
            backend = self.backend.name(),
            model = %model,
            width = mask.width(),
            height = mask.height(),
            ?polarity,
            "Segmentation mask received"
        );
        tracker.report_stage(ProcessingStage::Inference);

        Ok(mask.with_polarity(polarity))
    }
}
