//! Binary float-pattern scanner
//!
//! Interprets sliding windows of the buffer as little-endian IEEE-754 float
//! pairs and keeps the windows whose values sit inside a plausible coordinate
//! range (0.1 mm units). Once a plausible pair is found the scanner assumes
//! record-aligned data and steps a full pair at a time; a miss drops it back
//! to byte-stepping. The accepted-point cap and the shared deadline bound the
//! worst case on adversarially large buffers.

use crate::core::config::AnalyzeConfig;
use crate::core::model::{RawStitch, StitchCommand};

use super::{ExtractionStrategy, ScanBudget, StrategyOutcome};

/// Values closer to zero than this are denormal noise, not coordinates
const MIN_MAGNITUDE: f32 = 1e-3;

pub struct FloatPatternScanner;

impl FloatPatternScanner {
    fn plausible(value: f32, bound: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        let a = value.abs();
        a <= bound as f32 && (a == 0.0 || a >= MIN_MAGNITUDE)
    }
}

impl ExtractionStrategy for FloatPatternScanner {
    fn name(&self) -> &'static str {
        "float-pattern scanner"
    }

    fn rank_ceiling(&self) -> f64 {
        0.70
    }

    fn point_cap(&self, config: &AnalyzeConfig) -> usize {
        config.max_coordinate_points
    }

    fn extract(
        &self,
        bytes: &[u8],
        config: &AnalyzeConfig,
        budget: &mut ScanBudget,
    ) -> StrategyOutcome {
        let mut outcome = StrategyOutcome::empty(self.name());
        if bytes.len() < 8 {
            return outcome;
        }

        let bound = config.float_coordinate_bound;
        let mut i = 0usize;
        let mut longest_run = 0usize;
        let mut current_run = 0usize;

        while i + 8 <= bytes.len() {
            if !budget.keep_scanning() {
                break;
            }
            let x = f32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
            let y = f32::from_le_bytes([bytes[i + 4], bytes[i + 5], bytes[i + 6], bytes[i + 7]]);

            if Self::plausible(x, bound) && Self::plausible(y, bound) && (x != 0.0 || y != 0.0) {
                if !budget.try_point() {
                    break;
                }
                outcome.stitches.push(RawStitch::new(
                    f64::from(x) / 10.0,
                    f64::from(y) / 10.0,
                    StitchCommand::Normal,
                    outcome.stitches.len(),
                ));
                current_run += 1;
                longest_run = longest_run.max(current_run);
                i += 8;
            } else {
                current_run = 0;
                i += 1;
            }
        }

        if outcome.stitches.is_empty() {
            return outcome;
        }

        // Trust grows with the longest contiguous record run; scattered
        // single hits are almost certainly coincidental bit patterns.
        let run_factor = (longest_run as f64 / 32.0).min(1.0);
        let bbox_factor = match crate::core::model::BoundingBox::of(&outcome.stitches) {
            Some(bbox) => {
                let w = bbox.width();
                let h = bbox.height();
                if (1.0..=2000.0).contains(&w) && (1.0..=2000.0).contains(&h) {
                    1.0
                } else {
                    0.4
                }
            }
            None => 0.4,
        };
        outcome.confidence = (0.2 + 0.5 * run_factor) * bbox_factor;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn float_pair_buffer(points: &[(f32, f32)]) -> Vec<u8> {
        let mut buf = Vec::new();
        for &(x, y) in points {
            buf.extend_from_slice(&x.to_le_bytes());
            buf.extend_from_slice(&y.to_le_bytes());
        }
        buf
    }

    fn run(bytes: &[u8], cfg: &AnalyzeConfig) -> (StrategyOutcome, ScanBudget) {
        let mut budget =
            ScanBudget::with_timeout(Duration::from_secs(10), cfg.max_coordinate_points);
        let outcome = FloatPatternScanner.extract(bytes, cfg, &mut budget);
        (outcome, budget)
    }

    #[test]
    fn recovers_aligned_float_pairs() {
        let points: Vec<(f32, f32)> = (0..64)
            .map(|i| (i as f32 * 5.0 + 5.0, 100.0 + i as f32))
            .collect();
        let buf = float_pair_buffer(&points);
        let (outcome, _) = run(&buf, &AnalyzeConfig::default());
        assert_eq!(outcome.stitches.len(), 64);
        // 0.1 mm units scale to mm.
        assert!((outcome.stitches[1].x - 1.0).abs() < 1e-6);
        assert!(outcome.confidence > 0.3);
    }

    #[test]
    fn rejects_implausible_values() {
        let buf = float_pair_buffer(&[(f32::NAN, 1.0), (1e30, 2.0), (1e-20, 3.0)]);
        let (outcome, _) = run(&buf, &AnalyzeConfig::default());
        // Misaligned re-reads may still find stray plausible windows, but no
        // aligned record run exists, so trust stays minimal.
        assert!(outcome.confidence < 0.3);
    }

    #[test]
    fn one_point_budget_returns_partial_with_stop() {
        let points: Vec<(f32, f32)> = (0..1000).map(|i| (i as f32, i as f32 + 1.0)).collect();
        let buf = float_pair_buffer(&points);
        let cfg = AnalyzeConfig {
            max_coordinate_points: 1,
            ..Default::default()
        };
        let (outcome, budget) = run(&buf, &cfg);
        assert_eq!(outcome.stitches.len(), 1);
        assert!(budget.stop_reason().is_some());
        assert!(budget
            .truncation_warning("float-pattern scanner")
            .unwrap()
            .contains("partial"));
    }
}
