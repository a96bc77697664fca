//! Numeric validation utilities
//!
//! Range checks shared by settings validation and raster construction.

use crate::error::{BgRemovalError, Result};

/// Validator for numeric parameters and conversions
pub struct NumericValidator;

impl NumericValidator {
    /// Validate that a value lies in `[0.0, 1.0]`
    pub fn validate_unit_interval(value: f32, name: &str) -> Result<f32> {
        if !value.is_finite() {
            return Err(BgRemovalError::invalid_config(format!(
                "{} must be finite, got {}",
                name, value
            )));
        }

        if !(0.0..=1.0).contains(&value) {
            return Err(BgRemovalError::config_value_error(name, value, "0-1", None));
        }

        Ok(value)
    }

    /// Validate numeric range (inclusive)
    pub fn validate_range<T>(value: T, min: T, max: T, name: &str) -> Result<T>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if value < min || value > max {
            return Err(BgRemovalError::invalid_config(format!(
                "{} must be between {} and {}, got {}",
                name, min, max, value
            )));
        }
        Ok(value)
    }

    /// Number of elements in a `width x height x channels` buffer
    ///
    /// Zero dimensions and sizes that do not fit in memory are rejected as
    /// render target errors, since no surface can be allocated for them.
    pub fn buffer_len(width: u32, height: u32, channels: usize) -> Result<usize> {
        if width == 0 || height == 0 {
            return Err(BgRemovalError::render_target(format!(
                "Cannot allocate a {}x{} surface",
                width, height
            )));
        }

        usize::try_from(width)
            .ok()
            .zip(usize::try_from(height).ok())
            .and_then(|(w, h)| w.checked_mul(h))
            .and_then(|pixels| pixels.checked_mul(channels))
            .ok_or_else(|| {
                BgRemovalError::render_target(format!(
                    "Surface {}x{} exceeds addressable memory",
                    width, height
                ))
            })
    }
}
