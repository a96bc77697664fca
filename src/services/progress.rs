//! Progress reporting service
//!
//! Separates progress reporting from the pipeline so that callers can plug
//! in their own handling. Reporters are observers only: the tracker keeps
//! the reported percentage monotonic and contains reporter panics, so a
//! misbehaving reporter can never change or abort a run.

use crate::types::ProcessingTimings;
use instant::Instant;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Progress stages during background removal processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Decoding the input bytes
    ImageLoading,
    /// Bounding the raster to the working resolution
    Resize,
    /// Asking the backend to prepare the model
    ModelLoading,
    /// Running segmentation
    Inference,
    /// Normalizing and enhancing the mask
    MaskGeneration,
    /// Mapping the mask to alpha and filling the background
    Compositing,
    /// Encoding the output image
    Encoding,
    /// Processing completed
    Completed,
}

impl ProcessingStage {
    /// Get a human-readable description of the processing stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::ImageLoading => "Loading input image",
            ProcessingStage::Resize => "Resizing image",
            ProcessingStage::ModelLoading => "Loading segmentation model",
            ProcessingStage::Inference => "Running segmentation",
            ProcessingStage::MaskGeneration => "Enhancing segmentation mask",
            ProcessingStage::Compositing => "Removing background",
            ProcessingStage::Encoding => "Encoding output image",
            ProcessingStage::Completed => "Processing completed",
        }
    }

    /// Get the progress milestone for this stage
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            ProcessingStage::ImageLoading => 10,
            ProcessingStage::Resize => 20,
            ProcessingStage::ModelLoading => 40,
            ProcessingStage::Inference => 60,
            ProcessingStage::MaskGeneration => 70,
            ProcessingStage::Compositing => 90,
            ProcessingStage::Encoding => 95,
            ProcessingStage::Completed => 100,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Current processing stage
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable stage description
    pub description: String,
    /// Elapsed time since processing started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    /// Create a new progress update
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self::with_description(stage, stage.description().to_string(), start_time)
    }

    /// Create a progress update with custom description
    #[must_use]
    pub fn with_description(
        stage: ProcessingStage,
        description: String,
        start_time: Instant,
    ) -> Self {
        Self {
            progress: stage.progress_percentage(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
            description,
        }
    }
}

/// Trait for reporting progress during background removal operations
pub trait ProgressReporter: Send + Sync {
    /// Report a progress update
    fn report_progress(&self, update: ProgressUpdate);

    /// Report processing completion with final timings
    fn report_completion(&self, timings: ProcessingTimings) {
        drop(timings);
    }

    /// Report an error during processing
    fn report_error(&self, stage: ProcessingStage, error: &str) {
        let _ = (stage, error);
    }
}

/// No-op progress reporter that discards all progress updates
#[derive(Debug, Default)]
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}
}

/// Console progress reporter that logs progress through the `log` facade
#[derive(Debug)]
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// Create a new console progress reporter
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            log::info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress,
                update.description,
                update.elapsed_ms
            );
        } else {
            log::info!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_completion(&self, timings: ProcessingTimings) {
        log::info!("✅ Background removal completed in {}ms", timings.total_ms);

        if self.verbose {
            log::info!("  📊 {}", timings.summary());
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        log::error!("❌ Error during {}: {}", stage.description(), error);
    }
}

/// Progress reporter forwarding every update to a closure
///
/// # Examples
/// ```rust
/// use imgly_maskcomp::services::{CallbackProgressReporter, ProgressReporter};
///
/// let reporter = CallbackProgressReporter::new(|update| {
///     println!("{}% {}", update.progress, update.description);
/// });
/// # let _ = &reporter as &dyn ProgressReporter;
/// ```
pub struct CallbackProgressReporter<F>
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackProgressReporter<F>
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    #[must_use]
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for CallbackProgressReporter<F>
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    fn report_progress(&self, update: ProgressUpdate) {
        (self.callback)(&update);
    }
}

/// Progress tracker that manages timing and progress reporting for one request
pub struct ProgressTracker<'a> {
    reporter: &'a dyn ProgressReporter,
    start_time: Instant,
    current_stage: Option<ProcessingStage>,
    last_progress: u8,
}

impl<'a> ProgressTracker<'a> {
    /// Create a new progress tracker with the specified reporter
    #[must_use]
    pub fn new(reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: None,
            last_progress: 0,
        }
    }

    /// Report progress for a specific stage
    pub fn report_stage(&mut self, stage: ProcessingStage) {
        self.report_stage_with_description(stage, stage.description().to_string());
    }

    /// Report progress with custom description
    ///
    /// Stages whose milestone lies below an already reported one are
    /// recorded as current but not forwarded.
    pub fn report_stage_with_description(&mut self, stage: ProcessingStage, description: String) {
        self.current_stage = Some(stage);

        let update = ProgressUpdate::with_description(stage, description, self.start_time);
        if update.progress < self.last_progress {
            tracing::trace!(
                stage = ?stage,
                progress = update.progress,
                last = self.last_progress,
                "Skipping non-monotonic progress update"
            );
            return;
        }
        self.last_progress = update.progress;

        let reporter = self.reporter;
        Self::guarded("progress", move || reporter.report_progress(update));
    }

    /// Report completion with final timings
    pub fn report_completion(&self, timings: ProcessingTimings) {
        let reporter = self.reporter;
        Self::guarded("completion", move || reporter.report_completion(timings));
    }

    /// Report an error during processing
    pub fn report_error(&self, error: &str) {
        let stage = self.current_stage.unwrap_or(ProcessingStage::ImageLoading);
        let reporter = self.reporter;
        Self::guarded("error", move || reporter.report_error(stage, error));
    }

    /// Get the elapsed time since tracking started
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Get the current processing stage
    #[must_use]
    pub fn current_stage(&self) -> Option<ProcessingStage> {
        self.current_stage
    }

    /// Highest percentage reported so far
    #[must_use]
    pub fn last_progress(&self) -> u8 {
        self.last_progress
    }

    fn guarded<F: FnOnce()>(kind: &str, report: F) {
        if catch_unwind(AssertUnwindSafe(report)).is_err() {
            tracing::warn!(kind, "Progress reporter panicked; continuing without it");
        }
    }
}
