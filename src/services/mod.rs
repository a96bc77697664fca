//! Service layer
//!
//! Service types that keep infrastructure concerns (codecs, output formats,
//! progress reporting) out of the compositing logic.

pub mod format;
pub mod io;
pub mod progress;

pub use format::OutputFormatHandler;
pub use io::ImageIOService;
pub use progress::{
    CallbackProgressReporter, ConsoleProgressReporter, NoOpProgressReporter, ProcessingStage,
    ProgressReporter, ProgressTracker, ProgressUpdate,
};
