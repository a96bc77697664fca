#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # IMG.LY Mask Compositing Library
//!
//! Turns a segmentation mask into the alpha channel of a background-removed
//! image. The library owns every step around the model: decoding, bounding
//! the working resolution, handing the image to a pluggable segmentation
//! backend (with a fallback model), enhancing the returned mask, and
//! compositing it onto the image with a transparent or solid background.
//!
//! ## Features
//!
//! - **Pluggable Backends**: any [`SegmentationBackend`] implementation, with a
//!   deterministic [`MockBackend`] for tests
//! - **Fallback Model**: a failed or timed out primary model is retried once
//!   with the fallback model
//! - **Mask Enhancement**: soft threshold, edge push and isolated pixel cleanup
//! - **Point Hints**: foreground/background clicks, alone or blended into the
//!   backend mask
//! - **Format Support**: PNG, JPEG and WebP output
//! - **Progress Reporting**: monotonic stage milestones through a
//!   [`ProgressReporter`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imgly_maskcomp::{
//!     BackgroundRemovalProcessor, MockBackend, OutputFormat, ProcessorConfig, RemovalSettings,
//! };
//!
//! # async fn example(upload: Vec<u8>) -> anyhow::Result<()> {
//! let config = ProcessorConfig::builder()
//!     .max_dimension(1024)
//!     .output_format(OutputFormat::Png)
//!     .build()?;
//! let processor = BackgroundRemovalProcessor::with_backend(config, MockBackend::new())?;
//!
//! let settings = RemovalSettings::builder()
//!     .threshold(0.5)
//!     .softness(0.1)
//!     .build()?;
//! let mut result = processor.process_bytes(&upload, &settings).await?;
//! let png = processor.encode_result(&mut result)?;
//! # let _ = png;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `webp-support` (default): WebP output through the `image` crate
//! - `tracing-json`: JSON formatted tracing output

pub mod backends;
pub mod config;
pub mod error;
pub mod inference;
pub mod processing;
pub mod processor;
pub mod services;
pub mod tracing_config;
pub mod types;
pub mod utils;

use std::sync::Arc;
use tokio::io::AsyncRead;

// Public API exports
pub use backends::MockBackend;
pub use config::{BackgroundColor, ModelType, OutputFormat, RemovalSettings, RemovalSettingsBuilder};
pub use error::{BgRemovalError, Result};
pub use inference::{
    EncodedImage, InferenceConfig, SegmentationBackend, SegmentationOutput, SegmentationRun,
    Segmenter,
};
pub use processing::{Compositor, ImageResizer, MaskEnhancer, PointInfluenceField};
pub use processor::{
    BackgroundRemovalProcessor, PointHintMode, ProcessorConfig, ProcessorConfigBuilder,
};
pub use services::{
    CallbackProgressReporter, ConsoleProgressReporter, ImageIOService, NoOpProgressReporter,
    OutputFormatHandler, ProcessingStage, ProgressReporter, ProgressTracker, ProgressUpdate,
};
pub use tracing_config::{events, init_library_tracing, spans, TracingConfig, TracingFormat};
pub use types::{
    EnhancedMask, MaskPolarity, MaskSamples, MaskStatistics, Point, PointKind, ProcessingMetadata,
    ProcessingTimings, Raster, RemovalResult, SegmentationMask,
};
pub use utils::{ColorParser, NumericValidator};

/// Remove the background from encoded image bytes
///
/// Builds a processor with default [`ProcessorConfig`] around `backend` and
/// runs a single request.
///
/// # Examples
///
/// ```rust,no_run
/// use imgly_maskcomp::{remove_background_from_bytes, MockBackend, OutputFormat, RemovalSettings};
/// use std::sync::Arc;
///
/// # async fn example(upload: Vec<u8>) -> anyhow::Result<()> {
/// let settings = RemovalSettings::default();
/// let result = remove_background_from_bytes(&upload, &settings, Arc::new(MockBackend::new())).await?;
/// let png = result.to_bytes(OutputFormat::Png, None)?;
/// # let _ = png;
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_bytes(
    image_bytes: &[u8],
    settings: &RemovalSettings,
    backend: Arc<dyn SegmentationBackend>,
) -> Result<RemovalResult> {
    let processor = BackgroundRemovalProcessor::new(ProcessorConfig::default(), backend)?;
    processor.process_bytes(image_bytes, settings).await
}

/// Remove the background from an already decoded raster
pub async fn remove_background_from_raster(
    raster: &Raster,
    settings: &RemovalSettings,
    backend: Arc<dyn SegmentationBackend>,
) -> Result<RemovalResult> {
    let processor = BackgroundRemovalProcessor::new(ProcessorConfig::default(), backend)?;
    processor.process_raster(raster, settings).await
}

/// Remove the background from an async reader stream
///
/// The stream is read to the end before decoding.
///
/// ```rust,no_run
/// use imgly_maskcomp::{remove_background_from_reader, MockBackend, RemovalSettings};
/// use std::sync::Arc;
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let file = File::open("input.jpg").await?;
/// let result =
///     remove_background_from_reader(file, &RemovalSettings::default(), Arc::new(MockBackend::new()))
///         .await?;
/// result.save_png("output.png")?;
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_reader<R: AsyncRead + Unpin>(
    reader: R,
    settings: &RemovalSettings,
    backend: Arc<dyn SegmentationBackend>,
) -> Result<RemovalResult> {
    let raster = ImageIOService::load_from_reader(reader).await?;
    remove_background_from_raster(&raster, settings, backend).await
}
