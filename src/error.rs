//! Error types for mask compositing operations

use thiserror::Error;

/// Result type alias for mask compositing operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Error kinds surfaced by the compositing pipeline
///
/// Every stage fails fast and hands the first error to the caller; a failed
/// run never produces a partial raster.
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// The input image could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// No drawing surface could be obtained for a raster
    #[error("Render target error: {0}")]
    RenderTarget(String),

    /// The segmentation mask is unavailable or malformed
    #[error("Inference error: {0}")]
    Inference(String),

    /// The final buffer could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),

    /// Invalid settings or configuration values
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BgRemovalError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new render target error
    pub fn render_target<S: Into<String>>(msg: S) -> Self {
        Self::RenderTarget(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new encode error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Short machine-friendly name of the error kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::RenderTarget(_) => "render_target",
            Self::Inference(_) => "inference",
            Self::Encode(_) => "encode",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Io(_) => "io",
        }
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create inference error with model context
    pub fn inference_with_model(model: &str, operation: &str, error: &str) -> Self {
        Self::Inference(format!(
            "{} failed using model '{}': {}",
            operation, model, error
        ))
    }

    /// Create render target error with stage context
    pub fn stage_error(stage: &str, details: &str, input_info: Option<&str>) -> Self {
        let input_context = match input_info {
            Some(info) => format!(" (input: {})", info),
            None => String::new(),
        };

        Self::RenderTarget(format!(
            "Processing failed at stage '{}'{}: {}",
            stage, input_context, details
        ))
    }
}
