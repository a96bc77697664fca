//! Tracing configuration for structured logging
//!
//! The library only emits spans and events. Applications embedding the
//! pipeline pick a subscriber here, or install their own.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output with colors
    Console,
    /// Compact console output without colors, for CI logs
    Compact,
    /// JSON structured logging for log aggregation
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Tracing configuration builder
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Verbosity level (0 = info, 1 = debug, 2+ = trace)
    pub verbosity: u8,
    /// Output format
    pub format: TracingFormat,
    /// Environment filter directive, overrides `verbosity` when set
    pub env_filter: Option<String>,
    /// Session id logged once after initialization
    pub session_id: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            env_filter: None,
            session_id: None,
        }
    }
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Use a custom filter directive such as `imgly_maskcomp=debug`
    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Map the verbosity level to a filter directive
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Build the environment filter for this configuration
    ///
    /// # Errors
    /// - Invalid filter directive
    pub fn filter(&self) -> anyhow::Result<EnvFilter> {
        let directive = self
            .env_filter
            .as_deref()
            .unwrap_or_else(|| self.verbosity_to_filter());
        Ok(EnvFilter::try_new(directive)?)
    }

    /// Install the configured subscriber as the global default
    ///
    /// # Errors
    /// - Invalid filter directive
    /// - A global subscriber is already installed
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        let registry = Registry::default().with(self.filter()?);

        match self.format {
            TracingFormat::Console => {
                let layer = fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_level(true)
                    .compact();
                registry.with(layer).try_init()?;
            },
            TracingFormat::Compact => {
                let layer = fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_thread_ids(false)
                    .compact();
                registry.with(layer).try_init()?;
            },
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => {
                let layer = fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true);
                registry.with(layer).try_init()?;
            },
        }

        if let Some(session_id) = &self.session_id {
            tracing::info!(session_id = %session_id, "Mask compositing session started");
        }

        Ok(())
    }
}

/// Install a minimal subscriber driven by `RUST_LOG`, unless one is already set
///
/// An already installed subscriber is kept and the call still succeeds.
pub fn init_library_tracing() -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        tracing::debug!("Library tracing initialized");
    }
    Ok(())
}

/// Span helpers for the pipeline stages
pub mod spans {
    use tracing::{Level, Span};

    /// Span covering one request through the pipeline
    pub fn request(request_id: &uuid::Uuid, backend: &str, model: &str) -> Span {
        tracing::span!(
            Level::INFO,
            "request",
            request_id = %request_id,
            backend = %backend,
            model = %model
        )
    }

    pub fn batch_processing(count: usize) -> Span {
        tracing::span!(Level::INFO, "batch_processing", count = count)
    }

    pub fn resize(original: (u32, u32), max_dimension: u32) -> Span {
        tracing::span!(
            Level::DEBUG,
            "resize",
            width = original.0,
            height = original.1,
            max_dimension = max_dimension
        )
    }

    /// Span for model loading plus segmentation, including the fallback attempt
    pub fn inference(backend: &str, model: &str, dimensions: (u32, u32)) -> Span {
        tracing::span!(
            Level::INFO,
            "inference",
            backend = %backend,
            model = %model,
            width = dimensions.0,
            height = dimensions.1
        )
    }

    pub fn mask_enhancement(dimensions: (u32, u32), cleanup: bool) -> Span {
        tracing::span!(
            Level::DEBUG,
            "mask_enhancement",
            width = dimensions.0,
            height = dimensions.1,
            cleanup = cleanup
        )
    }

    pub fn compositing(dimensions: (u32, u32), background: &str) -> Span {
        tracing::span!(
            Level::DEBUG,
            "compositing",
            width = dimensions.0,
            height = dimensions.1,
            background = %background
        )
    }
}

/// Event helpers for recurring log patterns
pub mod events {
    use tracing::{debug, error, warn};

    /// Log an error with the stage it happened in
    pub fn error_with_context(error: &dyn std::error::Error, context: &str) {
        error!(error = %error, context = %context, "Operation failed");
    }

    /// Log a retry with the fallback model
    pub fn fallback(primary: &str, fallback: &str, error: &dyn std::error::Error) {
        warn!(
            primary = %primary,
            fallback = %fallback,
            error = %error,
            "Segmentation failed, retrying with fallback model"
        );
    }

    pub fn performance_metric(operation: &str, duration_ms: u64) {
        debug!(operation = %operation, duration_ms = duration_ms, "Performance metric");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(TracingConfig::new().with_verbosity(0).verbosity_to_filter(), "info");
        assert_eq!(TracingConfig::new().with_verbosity(1).verbosity_to_filter(), "debug");
        assert_eq!(TracingConfig::new().with_verbosity(2).verbosity_to_filter(), "trace");
        assert_eq!(TracingConfig::new().with_verbosity(9).verbosity_to_filter(), "trace");
    }

    #[test]
    fn test_config_builder() {
        let config = TracingConfig::new()
            .with_verbosity(2)
            .with_format(TracingFormat::Compact)
            .with_session_id("session-1");

        assert_eq!(config.verbosity, 2);
        assert_eq!(config.format, TracingFormat::Compact);
        assert_eq!(config.session_id.as_deref(), Some("session-1"));
    }

    #[test]
    fn test_filter_directives() {
        assert!(TracingConfig::new().filter().is_ok());
        assert!(TracingConfig::new()
            .with_env_filter("imgly_maskcomp=debug,warn")
            .filter()
            .is_ok());
    }

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.verbosity, 0);
        assert_eq!(config.format, TracingFormat::Console);
        assert!(config.env_filter.is_none());
        assert!(config.session_id.is_none());
    }
}
