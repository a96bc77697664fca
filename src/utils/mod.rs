//! Utility modules for common operations

pub mod color;
pub mod validation;

// Re-export commonly used items for convenience
pub use color::ColorParser;
pub use validation::NumericValidator;
