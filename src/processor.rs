//! Background removal processor
//!
//! `BackgroundRemovalProcessor` orchestrates one request end to end:
//! decode, resize to the working resolution, segmentation through the
//! injected backend, mask enhancement, compositing and (optionally) encoding.
//! It holds no per-request state and can be shared across tasks.

use crate::{
    config::{OutputFormat, RemovalSettings},
    error::{BgRemovalError, Result},
    inference::{EncodedImage, InferenceConfig, SegmentationBackend, Segmenter},
    processing::{Compositor, ImageResizer, MaskEnhancer, PointInfluenceField, DEFAULT_MAX_DIMENSION},
    services::{
        format::DEFAULT_JPEG_QUALITY, ImageIOService, NoOpProgressReporter, OutputFormatHandler,
        ProcessingStage, ProgressReporter, ProgressTracker,
    },
    types::{EnhancedMask, Point, ProcessingMetadata, Raster, RemovalResult, SegmentationMask},
    tracing_config::{events, spans},
    utils::NumericValidator,
};
use futures::future::join_all;
use instant::Instant;
use std::{path::Path, sync::Arc};
use tracing::{debug, info, instrument, Instrument};

/// Largest accepted working resolution bound
const MAX_WORKING_DIMENSION: u32 = 16_384;

/// Processor level configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorConfig {
    /// Bound for the longest side of the working raster
    pub max_dimension: u32,
    /// Model access, fallback and timeout settings
    pub inference: InferenceConfig,
    /// Format used by [`BackgroundRemovalProcessor::encode_result`]
    pub output_format: OutputFormat,
    /// JPEG quality in `[0, 1]`
    pub jpeg_quality: f32,
    /// Log progress through the console reporter when no reporter is given
    pub verbose_progress: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            inference: InferenceConfig::default(),
            output_format: OutputFormat::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            verbose_progress: false,
        }
    }
}

impl ProcessorConfig {
    /// Create a new processor configuration builder
    #[must_use]
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder::new()
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// - `max_dimension` outside `1..=16384`
    /// - JPEG quality outside `[0, 1]`
    /// - Invalid inference settings
    pub fn validate(&self) -> Result<()> {
        NumericValidator::validate_range(
            self.max_dimension,
            1,
            MAX_WORKING_DIMENSION,
            "max dimension",
        )?;
        NumericValidator::validate_unit_interval(self.jpeg_quality, "JPEG quality")?;
        self.inference.validate()
    }
}

/// Builder for `ProcessorConfig`
#[derive(Debug, Default)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the working resolution bound
    #[must_use]
    pub fn max_dimension(mut self, max_dimension: u32) -> Self {
        self.config.max_dimension = max_dimension;
        self
    }

    /// Replace the inference configuration
    #[must_use]
    pub fn inference_config(mut self, inference: InferenceConfig) -> Self {
        self.config.inference = inference;
        self
    }

    /// Bound each segmentation attempt
    #[must_use]
    pub fn inference_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.inference.timeout = Some(timeout);
        self
    }

    /// Set the default output format
    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Set the JPEG quality in `[0, 1]`
    #[must_use]
    pub fn jpeg_quality(mut self, quality: f32) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    #[must_use]
    pub fn verbose_progress(mut self, verbose: bool) -> Self {
        self.config.verbose_progress = verbose;
        self
    }

    /// Build the processor configuration
    ///
    /// # Errors
    /// - Any value failing [`ProcessorConfig::validate`]
    pub fn build(self) -> Result<ProcessorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// How point hints are combined with segmentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointHintMode {
    /// Build the mask from the points alone, without calling the backend
    #[default]
    PointsOnly,
    /// Blend the points into the backend's mask
    RefineSegmentation,
}

/// Background removal processor
pub struct BackgroundRemovalProcessor {
    config: ProcessorConfig,
    backend: Arc<dyn SegmentationBackend>,
}

impl std::fmt::Debug for BackgroundRemovalProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemovalProcessor")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl BackgroundRemovalProcessor {
    /// Create a processor around a shared backend
    ///
    /// # Errors
    /// - Invalid processor configuration
    pub fn new(config: ProcessorConfig, backend: Arc<dyn SegmentationBackend>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, backend })
    }

    /// Create a processor that owns `backend`
    ///
    /// # Errors
    /// - Invalid processor configuration
    pub fn with_backend<B: SegmentationBackend + 'static>(
        config: ProcessorConfig,
        backend: B,
    ) -> Result<Self> {
        Self::new(config, Arc::new(backend))
    }

    /// Get the processor configuration
    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Name of the injected backend
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    fn default_reporter(&self) -> Box<dyn ProgressReporter> {
        if self.config.verbose_progress {
            Box::new(crate::services::ConsoleProgressReporter::new(true))
        } else {
            Box::new(NoOpProgressReporter)
        }
    }

    /// Decode image bytes and remove their background
    ///
    /// # Examples
    /// ```rust,no_run
    /// use imgly_maskcomp::{BackgroundRemovalProcessor, MockBackend, ProcessorConfig, RemovalSettings};
    ///
    /// # async fn example(image_data: Vec<u8>) -> anyhow::Result<()> {
    /// let processor = BackgroundRemovalProcessor::with_backend(ProcessorConfig::default(), MockBackend::new())?;
    /// let result = processor.process_bytes(&image_data, &RemovalSettings::default()).await?;
    /// let png = result.to_bytes(imgly_maskcomp::OutputFormat::Png, None)?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// - Invalid settings
    /// - Decoding, segmentation or compositing failures
    pub async fn process_bytes(&self, bytes: &[u8], settings: &RemovalSettings) -> Result<RemovalResult> {
        let reporter = self.default_reporter();
        self.process_bytes_with_progress(bytes, settings, reporter.as_ref())
            .await
    }

    /// Decode image bytes and remove their background, reporting progress
    ///
    /// # Errors
    /// - Invalid settings
    /// - Decoding, segmentation or compositing failures
    #[instrument(skip(self, bytes, settings, reporter), fields(input_bytes = bytes.len(), model = %settings.model))]
    pub async fn process_bytes_with_progress(
        &self,
        bytes: &[u8],
        settings: &RemovalSettings,
        reporter: &dyn ProgressReporter,
    ) -> Result<RemovalResult> {
        let total_start = Instant::now();
        let mut tracker = ProgressTracker::new(reporter);

        let outcome = async {
            settings.validate()?;

            let decode_start = Instant::now();
            let raster = ImageIOService::decode_async(bytes.to_vec()).await?;
            let decode_ms = decode_start.elapsed().as_millis() as u64;
            tracker.report_stage(ProcessingStage::ImageLoading);

            let mut metadata = ProcessingMetadata::new(raster.dimensions());
            metadata.timings.image_decode_ms = decode_ms;
            self.execute(&raster, settings, None, &mut tracker, metadata)
                .await
        }
        .await;

        self.complete(outcome, &mut tracker, total_start)
    }

    /// Load an image file and remove its background
    ///
    /// # Errors
    /// - File read failures
    /// - Decoding, segmentation or compositing failures
    pub async fn process_file<P: AsRef<Path>>(
        &self,
        path: P,
        settings: &RemovalSettings,
    ) -> Result<RemovalResult> {
        let path_ref = path.as_ref();
        let bytes = tokio::fs::read(path_ref)
            .await
            .map_err(|e| BgRemovalError::file_io_error("read image file", path_ref, &e))?;
        self.process_bytes(&bytes, settings).await
    }

    /// Remove the background of an already decoded raster
    ///
    /// # Errors
    /// - Invalid settings
    /// - Segmentation or compositing failures
    pub async fn process_raster(&self, raster: &Raster, settings: &RemovalSettings) -> Result<RemovalResult> {
        let reporter = self.default_reporter();
        self.process_raster_with_progress(raster, settings, reporter.as_ref())
            .await
    }

    /// Remove the background of a decoded raster, reporting progress
    ///
    /// # Errors
    /// - Invalid settings
    /// - Segmentation or compositing failures
    #[instrument(
        skip(self, raster, settings, reporter),
        fields(
            dimensions = %format!("{}x{}", raster.width(), raster.height()),
            model = %settings.model
        )
    )]
    pub async fn process_raster_with_progress(
        &self,
        raster: &Raster,
        settings: &RemovalSettings,
        reporter: &dyn ProgressReporter,
    ) -> Result<RemovalResult> {
        let total_start = Instant::now();
        let mut tracker = ProgressTracker::new(reporter);

        let outcome = async {
            settings.validate()?;
            let metadata = ProcessingMetadata::new(raster.dimensions());
            self.execute(raster, settings, None, &mut tracker, metadata)
                .await
        }
        .await;

        self.complete(outcome, &mut tracker, total_start)
    }

    /// Remove the background guided by point hints
    ///
    /// Point coordinates are in working-raster pixels. With
    /// [`PointHintMode::RefineSegmentation`] they are rescaled into the
    /// backend mask's resolution before blending.
    ///
    /// # Errors
    /// - Invalid settings
    /// - Segmentation (when refining) or compositing failures
    #[instrument(
        skip(self, raster, settings, points, reporter),
        fields(
            dimensions = %format!("{}x{}", raster.width(), raster.height()),
            points = points.len()
        )
    )]
    pub async fn process_with_points(
        &self,
        raster: &Raster,
        settings: &RemovalSettings,
        points: &[Point],
        mode: PointHintMode,
        reporter: &dyn ProgressReporter,
    ) -> Result<RemovalResult> {
        let total_start = Instant::now();
        let mut tracker = ProgressTracker::new(reporter);

        let outcome = async {
            settings.validate()?;
            let metadata = ProcessingMetadata::new(raster.dimensions());
            self.execute(raster, settings, Some((points, mode)), &mut tracker, metadata)
                .await
        }
        .await;

        self.complete(outcome, &mut tracker, total_start)
    }

    /// Composite a caller supplied mask onto a raster
    ///
    /// The raster is bounded to the working resolution first; the mask is
    /// enhanced and mapped onto it without calling the backend.
    ///
    /// # Errors
    /// - Invalid settings
    /// - Resize or compositing failures
    pub fn composite_mask(
        &self,
        raster: &Raster,
        mask: &SegmentationMask,
        settings: &RemovalSettings,
    ) -> Result<RemovalResult> {
        settings.validate()?;

        let total_start = Instant::now();
        let mut metadata = ProcessingMetadata::new(raster.dimensions());

        let working = self.resize(raster, &mut metadata)?;
        metadata.mask_dimensions = mask.dimensions();
        let enhanced = Self::enhance(mask, settings, &mut metadata);
        let image = Self::composite(&working, &enhanced, settings, &mut metadata)?;

        metadata.timings.total_ms = total_start.elapsed().as_millis() as u64;
        Ok(RemovalResult::new(image, enhanced, metadata))
    }

    /// Process several encoded images concurrently
    ///
    /// Returns one result per input, in input order. A failing input does not
    /// affect the others.
    pub async fn process_batch<B: AsRef<[u8]>>(
        &self,
        inputs: &[B],
        settings: &RemovalSettings,
    ) -> Vec<Result<RemovalResult>> {
        info!(count = inputs.len(), "Processing batch");
        join_all(
            inputs
                .iter()
                .map(|bytes| self.process_bytes(bytes.as_ref(), settings)),
        )
        .instrument(spans::batch_processing(inputs.len()))
        .await
    }

    /// Encode a result with the configured output format and quality
    ///
    /// # Errors
    /// - Encoding failures
    pub fn encode_result(&self, result: &mut RemovalResult) -> Result<Vec<u8>> {
        let reporter = self.default_reporter();
        self.encode_result_with_progress(result, reporter.as_ref())
    }

    /// Encode a result, reporting the encoding stage
    ///
    /// # Errors
    /// - Encoding failures
    pub fn encode_result_with_progress(
        &self,
        result: &mut RemovalResult,
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<u8>> {
        let mut tracker = ProgressTracker::new(reporter);
        let format = self.config.output_format;
        let has_transparency = result.image.as_image().pixels().any(|p| p[3] < u8::MAX);
        OutputFormatHandler::validate_for_background_removal(format, has_transparency);

        tracker.report_stage(ProcessingStage::Encoding);
        result
            .encode_timed(format, Some(self.config.jpeg_quality))
            .map_err(|error| {
                tracker.report_error(&error.to_string());
                error
            })
    }

    async fn execute(
        &self,
        raster: &Raster,
        settings: &RemovalSettings,
        hints: Option<(&[Point], PointHintMode)>,
        tracker: &mut ProgressTracker<'_>,
        metadata: ProcessingMetadata,
    ) -> Result<RemovalResult> {
        let span = spans::request(&metadata.request_id, self.backend.name(), settings.model.identifier());
        self.run_stages(raster, settings, hints, tracker, metadata)
            .instrument(span)
            .await
    }

    async fn run_stages(
        &self,
        raster: &Raster,
        settings: &RemovalSettings,
        hints: Option<(&[Point], PointHintMode)>,
        tracker: &mut ProgressTracker<'_>,
        mut metadata: ProcessingMetadata,
    ) -> Result<RemovalResult> {
        info!("Starting background removal");

        let working = self.resize(raster, &mut metadata)?;
        tracker.report_stage(ProcessingStage::Resize);

        let mask = match hints {
            Some((points, PointHintMode::PointsOnly)) => {
                let (width, height) = working.dimensions();
                let mask = PointInfluenceField::new().build(width, height, points)?;
                tracker.report_stage(ProcessingStage::Inference);
                mask
            },
            Some((points, PointHintMode::RefineSegmentation)) => {
                let mut mask = self
                    .segment(&working, settings, tracker, &mut metadata)
                    .await?;
                let scaled =
                    PointInfluenceField::scale_points(points, working.dimensions(), mask.dimensions());
                PointInfluenceField::new().apply(&mut mask, &scaled);
                mask
            },
            None => {
                self.segment(&working, settings, tracker, &mut metadata)
                    .await?
            },
        };
        metadata.mask_dimensions = mask.dimensions();

        let enhanced = Self::enhance(&mask, settings, &mut metadata);
        tracker.report_stage(ProcessingStage::MaskGeneration);

        let image = Self::composite(&working, &enhanced, settings, &mut metadata)?;
        tracker.report_stage(ProcessingStage::Compositing);

        Ok(RemovalResult::new(image, enhanced, metadata))
    }

    fn complete(
        &self,
        outcome: Result<RemovalResult>,
        tracker: &mut ProgressTracker<'_>,
        total_start: Instant,
    ) -> Result<RemovalResult> {
        match outcome {
            Ok(mut result) => {
                result.metadata.timings.total_ms = total_start.elapsed().as_millis() as u64;
                tracker.report_stage(ProcessingStage::Completed);
                tracker.report_completion(result.metadata.timings.clone());

                info!(
                    request_id = %result.metadata.request_id,
                    backend = self.backend.name(),
                    used_fallback = result.metadata.used_fallback,
                    timings = %result.timing_summary(),
                    "Background removal completed"
                );
                events::performance_metric("background_removal", result.metadata.timings.total_ms);
                Ok(result)
            },
            Err(error) => {
                events::error_with_context(&error, error.kind());
                tracker.report_error(&error.to_string());
                Err(error)
            },
        }
    }

    fn resize(&self, raster: &Raster, metadata: &mut ProcessingMetadata) -> Result<Raster> {
        let _span = spans::resize(raster.dimensions(), self.config.max_dimension).entered();

        let start = Instant::now();
        let working = ImageResizer::fit_within(raster, self.config.max_dimension)?;
        metadata.timings.resize_ms = start.elapsed().as_millis() as u64;
        metadata.working_dimensions = working.dimensions();
        Ok(working)
    }

    async fn segment(
        &self,
        working: &Raster,
        settings: &RemovalSettings,
        tracker: &mut ProgressTracker<'_>,
        metadata: &mut ProcessingMetadata,
    ) -> Result<SegmentationMask> {
        let image = EncodedImage::from_raster(working)?;
        let segmenter = Segmenter::new(self.backend.as_ref(), &self.config.inference);

        let run = segmenter
            .segment(&image, settings.model, tracker)
            .instrument(spans::inference(
                self.backend.name(),
                settings.model.identifier(),
                working.dimensions(),
            ))
            .await?;

        metadata.model = Some(run.model);
        metadata.used_fallback = run.used_fallback;
        metadata.timings.model_load_ms = run.model_load_ms;
        metadata.timings.inference_ms = run.inference_ms;
        Ok(run.mask)
    }

    fn enhance(
        mask: &SegmentationMask,
        settings: &RemovalSettings,
        metadata: &mut ProcessingMetadata,
    ) -> EnhancedMask {
        let _span = spans::mask_enhancement(mask.dimensions(), settings.cleanup).entered();

        let start = Instant::now();
        let enhanced = MaskEnhancer::new(settings).enhance(mask);
        metadata.timings.enhancement_ms = start.elapsed().as_millis() as u64;

        let statistics = enhanced.as_mask().statistics();
        debug!(
            foreground_ratio = statistics.foreground_ratio,
            mean_score = statistics.mean_score,
            "Mask enhanced"
        );
        metadata.mask_statistics = Some(statistics);
        enhanced
    }

    fn composite(
        working: &Raster,
        mask: &EnhancedMask,
        settings: &RemovalSettings,
        metadata: &mut ProcessingMetadata,
    ) -> Result<Raster> {
        let background = settings.background_color.to_string();
        let _span = spans::compositing(working.dimensions(), &background).entered();

        let start = Instant::now();
        let image = Compositor::new(settings).apply(working, mask)?;
        metadata.timings.compositing_ms = start.elapsed().as_millis() as u64;
        Ok(image)
    }
}
