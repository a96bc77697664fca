//! Point hint influence field
//!
//! Blends foreground/background hint points into a mask with a linear
//! radial falloff. Points are applied in input order and later points
//! composite over earlier ones, so overlapping hints are order dependent.

use crate::{
    error::Result,
    types::{Point, SegmentationMask},
};

/// Default influence radius in pixels
pub const DEFAULT_INFLUENCE_RADIUS: u32 = 5;

/// Radial influence field for point hints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointInfluenceField {
    radius: u32,
}

impl Default for PointInfluenceField {
    fn default() -> Self {
        Self::new()
    }
}

impl PointInfluenceField {
    /// Field with the default radius of 5 pixels
    #[must_use]
    pub fn new() -> Self {
        Self::with_radius(DEFAULT_INFLUENCE_RADIUS)
    }

    /// Field with a custom radius; a radius of 0 has no effect
    #[must_use]
    pub fn with_radius(radius: u32) -> Self {
        Self { radius }
    }

    #[must_use]
    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Influence of a point on a pixel at distance `(dx, dy)` from its centre
    #[must_use]
    pub fn influence(&self, dx: i64, dy: i64) -> f32 {
        if self.radius == 0 {
            return 0.0;
        }
        let distance = ((dx * dx + dy * dy) as f64).sqrt();
        (1.0 - distance / f64::from(self.radius)).max(0.0) as f32
    }

    /// Build a mask from points alone, starting from an all-background mask
    ///
    /// # Errors
    /// - Zero dimensions
    pub fn build(&self, width: u32, height: u32, points: &[Point]) -> Result<SegmentationMask> {
        let mut mask = SegmentationMask::filled(width, height, 0.0)?;
        self.apply(&mut mask, points);
        Ok(mask)
    }

    /// Blend `points` into `mask` in order
    ///
    /// Points with a non-finite coordinate, and points whose centre lies
    /// more than `radius` pixels outside the mask, are skipped.
    pub fn apply(&self, mask: &mut SegmentationMask, points: &[Point]) {
        let (width, height) = mask.dimensions();
        let radius = i64::from(self.radius);

        for point in points {
            let Some((centre_x, centre_y)) = self.centre(point, width, height) else {
                tracing::debug!(x = point.x, y = point.y, "Skipping point outside the influence area");
                continue;
            };
            let target = point.kind.target();

            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let influence = self.influence(dx, dy);
                    if influence <= 0.0 {
                        continue;
                    }

                    let (Some(x), Some(y)) = (
                        centre_x.checked_add(dx).and_then(|x| u32::try_from(x).ok()),
                        centre_y.checked_add(dy).and_then(|y| u32::try_from(y).ok()),
                    ) else {
                        continue;
                    };
                    if x >= width || y >= height {
                        continue;
                    }

                    let index = y as usize * width as usize + x as usize;
                    if let Some(value) = mask.scores_mut().get_mut(index) {
                        *value = target * influence + *value * (1.0 - influence);
                    }
                }
            }
        }
    }

    /// Centre pixel of `point`, `None` when it cannot touch a `width x height` mask
    fn centre(&self, point: &Point, width: u32, height: u32) -> Option<(i64, i64)> {
        if !point.x.is_finite() || !point.y.is_finite() {
            return None;
        }

        let radius = f64::from(self.radius);
        let x = f64::from(point.x).floor();
        let y = f64::from(point.y).floor();
        let reachable = |centre: f64, len: u32| centre >= -radius && centre < f64::from(len) + radius;

        // Reachable centres lie within u32 range plus the radius
        (reachable(x, width) && reachable(y, height)).then(|| (x as i64, y as i64))
    }

    /// Rescale points from raster space into a mask of another resolution
    #[must_use]
    pub fn scale_points(points: &[Point], from: (u32, u32), to: (u32, u32)) -> Vec<Point> {
        if from == to || from.0 == 0 || from.1 == 0 {
            return points.to_vec();
        }

        let scale_x = to.0 as f32 / from.0 as f32;
        let scale_y = to.1 as f32 / from.1 as f32;

        points
            .iter()
            .map(|p| Point {
                x: p.x * scale_x,
                y: p.y * scale_y,
                kind: p.kind,
            })
            .collect()
    }
}
