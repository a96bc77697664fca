//! Mask enhancement: soft threshold, edge contrast boost and speckle cleanup
//!
//! Enhancement is a single pass over the raw mask. Edge detection always
//! looks at raw scores, never at already enhanced neighbours, so running
//! the enhancer on its own output is not the same as enhancing harder.

use crate::{
    config::RemovalSettings,
    types::{EnhancedMask, SegmentationMask},
};

/// Raw neighbour difference that marks a pixel as sitting on an edge
const EDGE_DIFFERENCE: f32 = 0.3;

/// Enhanced neighbour difference counted as disagreement during cleanup
const CLEANUP_DIFFERENCE: f32 = 0.5;

/// Disagreeing neighbours (out of 8) needed to flip a pixel
const CLEANUP_MIN_DISAGREEING: usize = 6;

const NEIGHBOUR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Turns raw segmentation scores into final foreground weights
#[derive(Debug, Clone, PartialEq)]
pub struct MaskEnhancer {
    threshold: f32,
    softness: f32,
    edge_enhancement: f32,
    cleanup: bool,
}

impl MaskEnhancer {
    /// Create an enhancer from the numerical settings
    ///
    /// Values are used as given; validate user input with
    /// [`RemovalSettings::validate`] first.
    #[must_use]
    pub fn new(settings: &RemovalSettings) -> Self {
        Self {
            threshold: settings.threshold,
            softness: settings.softness,
            edge_enhancement: settings.edge_enhancement,
            cleanup: settings.cleanup,
        }
    }

    /// Enhance a raw mask whose scores mean foreground strength
    #[must_use]
    pub fn enhance(&self, mask: &SegmentationMask) -> EnhancedMask {
        let width = mask.width();

        let enhanced: Vec<f32> = mask
            .scores()
            .iter()
            .enumerate()
            .map(|(index, &raw)| {
                let value = self.soft_threshold(raw);
                if self.edge_enhancement > 0.0 && value > 0.0 && value < 1.0 {
                    let x = (index % width as usize) as u32;
                    let y = (index / width as usize) as u32;
                    self.enhance_edge(mask, x, y, raw, value)
                } else {
                    value
                }
            })
            .collect();

        let mut enhanced = mask.with_scores(enhanced);
        if self.cleanup {
            enhanced = Self::remove_isolated_pixels(&enhanced);
        }

        EnhancedMask::from_weights(enhanced)
    }

    /// Map a raw score through the soft transition band
    ///
    /// Inside the open band `(threshold - softness, threshold + softness)` the
    /// score is remapped linearly; outside it (and always when softness is
    /// not positive) the decision is hard.
    #[must_use]
    pub fn soft_threshold(&self, raw: f32) -> f32 {
        let low = self.threshold - self.softness;
        let high = self.threshold + self.softness;

        if self.softness > 0.0 && raw > low && raw < high {
            (raw - low) / (2.0 * self.softness)
        } else if raw > self.threshold {
            1.0
        } else {
            0.0
        }
    }

    /// Push an ambiguous value away from the average of its raw neighbours
    fn enhance_edge(&self, mask: &SegmentationMask, x: u32, y: u32, raw: f32, value: f32) -> f32 {
        let neighbours: Vec<f32> = neighbour_values(mask, x, y).collect();
        let on_edge = neighbours
            .iter()
            .any(|n| (n - raw).abs() > EDGE_DIFFERENCE);

        if !on_edge {
            return value;
        }

        let average = neighbours.iter().sum::<f32>() / neighbours.len() as f32;
        let push = self.edge_enhancement * 0.5;

        let pushed = if raw > average {
            value + push
        } else if raw < average {
            value - push
        } else {
            value
        };
        pushed.clamp(0.0, 1.0)
    }

    /// Flip interior pixels that disagree with most of their neighbourhood
    ///
    /// Decisions read from `snapshot` only and are written to a separate
    /// buffer, so the result does not depend on scan order. Masks without
    /// interior pixels are returned unchanged.
    #[must_use]
    pub fn remove_isolated_pixels(snapshot: &SegmentationMask) -> SegmentationMask {
        let (width, height) = snapshot.dimensions();
        if width < 3 || height < 3 {
            return snapshot.clone();
        }

        let mut output = snapshot.scores().to_vec();
        let mut flipped = 0usize;

        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let Some(value) = snapshot.get(x, y) else {
                    continue;
                };

                let disagreeing = neighbour_values(snapshot, x, y)
                    .filter(|n| (n - value).abs() > CLEANUP_DIFFERENCE)
                    .count();

                if disagreeing >= CLEANUP_MIN_DISAGREEING {
                    if let Some(slot) = output.get_mut(y as usize * width as usize + x as usize) {
                        *slot = 1.0 - value;
                        flipped += 1;
                    }
                }
            }
        }

        tracing::trace!(flipped, "Isolated pixel cleanup finished");
        snapshot.with_scores(output)
    }
}

/// In-bounds 8-neighbour scores of `(x, y)`
fn neighbour_values(mask: &SegmentationMask, x: u32, y: u32) -> impl Iterator<Item = f32> + '_ {
    NEIGHBOUR_OFFSETS.iter().filter_map(move |&(dx, dy)| {
        let nx = x.checked_add_signed(dx)?;
        let ny = y.checked_add_signed(dy)?;
        mask.get(nx, ny)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(threshold: f32, softness: f32, edge: f32, cleanup: bool) -> RemovalSettings {
        RemovalSettings {
            threshold,
            softness,
            edge_enhancement: edge,
            cleanup,
            ..RemovalSettings::default()
        }
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_hard_mask_passthrough() {
        let scores = vec![0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let mask = SegmentationMask::new(4, 3, scores).unwrap();

        for (t, s, e) in [(0.35, 0.3, 0.4), (0.5, 0.0, 1.0), (0.05, 0.05, 0.0), (0.95, 0.05, 0.7)] {
            let enhancer = MaskEnhancer::new(&settings(t, s, e, false));
            assert_eq!(enhancer.enhance(&mask).as_mask(), &mask, "t={} s={} e={}", t, s, e);
        }
    }

    #[test]
    fn test_threshold_center_maps_to_half() {
        for (t, s) in [(0.35, 0.3), (0.5, 0.1), (0.2, 0.05)] {
            let enhancer = MaskEnhancer::new(&settings(t, s, 0.0, false));
            assert!(approx(enhancer.soft_threshold(t), 0.5));
        }
    }

    #[test]
    fn test_soft_band_is_linear() {
        let enhancer = MaskEnhancer::new(&settings(0.5, 0.2, 0.0, false));
        assert!(approx(enhancer.soft_threshold(0.4), 0.25));
        assert!(approx(enhancer.soft_threshold(0.6), 0.75));
        // Outside the band the decision is hard
        assert_eq!(enhancer.soft_threshold(0.25), 0.0);
        assert_eq!(enhancer.soft_threshold(0.75), 1.0);
        assert_eq!(enhancer.soft_threshold(0.05), 0.0);
        assert_eq!(enhancer.soft_threshold(0.95), 1.0);
    }

    #[test]
    fn test_zero_softness_is_hard_threshold() {
        let enhancer = MaskEnhancer::new(&settings(0.5, 0.0, 0.0, false));
        assert_eq!(enhancer.soft_threshold(0.5), 0.0);
        assert_eq!(enhancer.soft_threshold(0.500_1), 1.0);
        assert_eq!(enhancer.soft_threshold(0.499), 0.0);
    }

    fn centre_mask(centre: f32, ring: f32) -> SegmentationMask {
        let mut scores = vec![ring; 9];
        scores[4] = centre;
        SegmentationMask::new(3, 3, scores).unwrap()
    }

    #[test]
    fn test_edge_enhancement_pushes_away_from_average() {
        let enhancer = MaskEnhancer::new(&settings(0.35, 0.3, 0.4, false));

        // Ramp value (0.4 - 0.05) / 0.6, pushed by 0.4 * 0.5
        let ramp = 0.35 / 0.6;

        let darker = enhancer.enhance(&centre_mask(0.4, 1.0));
        assert!(approx(darker.get(1, 1).unwrap(), ramp - 0.2));

        let brighter = enhancer.enhance(&centre_mask(0.4, 0.0));
        assert!(approx(brighter.get(1, 1).unwrap(), ramp + 0.2));
    }

    #[test]
    fn test_edge_enhancement_needs_strong_gradient() {
        let enhancer = MaskEnhancer::new(&settings(0.35, 0.3, 1.0, false));
        let mask = centre_mask(0.4, 0.6);
        let enhanced = enhancer.enhance(&mask);
        assert!(approx(enhanced.get(1, 1).unwrap(), 0.35 / 0.6));
    }

    #[test]
    fn test_edge_enhancement_clamps() {
        let enhancer = MaskEnhancer::new(&settings(0.35, 0.3, 1.0, false));
        // Ramp value 0.25 / 0.6 ~= 0.42, pushed down by 0.5
        let enhanced = enhancer.enhance(&centre_mask(0.3, 1.0));
        assert_eq!(enhanced.get(1, 1), Some(0.0));
    }

    #[test]
    fn test_edge_enhancement_uses_in_bounds_neighbours_only() {
        let enhancer = MaskEnhancer::new(&settings(0.35, 0.3, 0.4, false));
        // Corner pixel with three neighbours, all of them strongly foreground
        let mask = SegmentationMask::new(2, 2, vec![0.4, 1.0, 1.0, 1.0]).unwrap();
        let enhanced = enhancer.enhance(&mask);
        assert!(approx(enhanced.get(0, 0).unwrap(), 0.35 / 0.6 - 0.2));
    }

    #[test]
    fn test_cleanup_flips_isolated_pixels() {
        let mut scores = vec![0.0; 25];
        scores[12] = 1.0;
        let mask = SegmentationMask::new(5, 5, scores).unwrap();

        let cleaned = MaskEnhancer::remove_isolated_pixels(&mask);
        assert!(cleaned.scores().iter().all(|&v| v == 0.0));

        let mut scores = vec![1.0; 25];
        scores[12] = 0.0;
        let mask = SegmentationMask::new(5, 5, scores).unwrap();
        let cleaned = MaskEnhancer::remove_isolated_pixels(&mask);
        assert!(cleaned.scores().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_cleanup_skips_border_and_small_masks() {
        let mut scores = vec![0.0; 25];
        scores[0] = 1.0;
        scores[2] = 1.0;
        let mask = SegmentationMask::new(5, 5, scores).unwrap();
        assert_eq!(MaskEnhancer::remove_isolated_pixels(&mask), mask);

        let mask = SegmentationMask::new(2, 5, vec![0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0])
            .unwrap();
        assert_eq!(MaskEnhancer::remove_isolated_pixels(&mask), mask);
    }

    #[test]
    fn test_cleanup_reads_snapshot() {
        // Two adjacent speckles: each has 7 disagreeing neighbours in the
        // snapshot, so both flip regardless of scan order.
        let mut scores = vec![0.0; 16];
        scores[5] = 1.0;
        scores[6] = 1.0;
        let mask = SegmentationMask::new(4, 4, scores).unwrap();

        let cleaned = MaskEnhancer::remove_isolated_pixels(&mask);
        assert!(cleaned.scores().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_cleanup_keeps_small_regions() {
        // A 2x2 block: each pixel has only 5 disagreeing neighbours
        let mut scores = vec![0.0; 36];
        for index in [14, 15, 20, 21] {
            scores[index] = 1.0;
        }
        let mask = SegmentationMask::new(6, 6, scores).unwrap();
        assert_eq!(MaskEnhancer::remove_isolated_pixels(&mask), mask);
    }

    #[test]
    fn test_enhance_runs_cleanup_on_enhanced_values() {
        let mut scores = vec![0.1; 25];
        scores[12] = 0.9;
        let mask = SegmentationMask::new(5, 5, scores).unwrap();

        let enhancer = MaskEnhancer::new(&settings(0.5, 0.0, 0.0, true));
        let enhanced = enhancer.enhance(&mask);
        assert!(enhanced.as_mask().scores().iter().all(|&v| v == 0.0));

        let enhancer = MaskEnhancer::new(&settings(0.5, 0.0, 0.0, false));
        assert_eq!(enhancer.enhance(&mask).get(2, 2), Some(1.0));
    }

    #[test]
    fn test_enhancing_twice_is_stable_for_hard_values() {
        let scores: Vec<f32> = (0..64).map(|i| if (i / 8 + i % 8) % 3 == 0 { 0.9 } else { 0.1 }).collect();
        let mask = SegmentationMask::new(8, 8, scores).unwrap();
        let enhancer = MaskEnhancer::new(&settings(0.5, 0.2, 0.4, false));

        let once = enhancer.enhance(&mask);
        let twice = enhancer.enhance(once.as_mask());
        assert_eq!(once, twice);
    }
}
