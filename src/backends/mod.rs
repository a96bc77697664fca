//! Segmentation backend implementations
//!
//! Production backends live with the caller and implement
//! [`SegmentationBackend`](crate::inference::SegmentationBackend). This module
//! ships a deterministic mock for tests and debugging runs.

pub mod mock;

pub use self::mock::MockBackend;
