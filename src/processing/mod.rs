//! Per-pixel processing stages
//!
//! All stages are synchronous pure functions of their inputs. They never
//! share buffers, so concurrent requests can run them independently.

pub mod composite;
pub mod enhance;
pub mod influence;
pub mod resize;

pub use composite::Compositor;
pub use enhance::MaskEnhancer;
pub use influence::{PointInfluenceField, DEFAULT_INFLUENCE_RADIUS};
pub use resize::{ImageResizer, DEFAULT_MAX_DIMENSION};
