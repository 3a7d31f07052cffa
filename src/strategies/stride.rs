//! Coordinate-pattern scanner
//!
//! Looks for a repeating fixed-size stitch record hidden in the buffer: for
//! each candidate stride and alignment it walks the buffer as little-endian
//! `i16 x, i16 y[, u16 cmd]` records and keeps the longest contiguous run of
//! records whose coordinates and step sizes stay machine-plausible. The run
//! with the best stride wins, validated by bounding-box plausibility.

use crate::core::config::AnalyzeConfig;
use crate::core::model::{BoundingBox, RawStitch, StitchCommand};

use super::{ExtractionStrategy, ScanBudget, StrategyOutcome};

/// Record layouts tried, in bytes
const CANDIDATE_STRIDES: [usize; 3] = [4, 6, 8];

/// Coordinate plausibility window in 0.1 mm units
const COORD_BOUND: i32 = 32_000;

/// Maximum credible step between consecutive records, 0.1 mm units (50 cm)
const MAX_STEP: i64 = 5_000;

/// Pattern-end command words seen in PXF-style stitch blocks
const END_COMMANDS: [u16; 4] = [0x8003, 0x8013, 0x8023, 0x8033];

struct Run {
    stride: usize,
    stitches: Vec<RawStitch>,
}

pub struct CoordinatePatternScanner;

impl CoordinatePatternScanner {
    fn map_command(cmd: u16) -> StitchCommand {
        if END_COMMANDS.contains(&cmd) {
            StitchCommand::End
        } else {
            match cmd {
                0x0000 => StitchCommand::Normal,
                0x0001..=0x0003 => StitchCommand::Jump,
                _ => StitchCommand::Unknown,
            }
        }
    }

    /// Longest plausible record run for one stride/alignment combination.
    fn best_run(
        bytes: &[u8],
        stride: usize,
        offset: usize,
        budget: &mut ScanBudget,
    ) -> Vec<RawStitch> {
        let mut best: Vec<RawStitch> = Vec::new();
        let mut current: Vec<RawStitch> = Vec::new();
        let mut prev: Option<(i32, i32)> = None;
        let mut pos = offset;

        while pos + stride <= bytes.len() {
            if !budget.keep_scanning() {
                break;
            }
            let x = i32::from(i16::from_le_bytes([bytes[pos], bytes[pos + 1]]));
            let y = i32::from(i16::from_le_bytes([bytes[pos + 2], bytes[pos + 3]]));
            let cmd = if stride >= 6 {
                u16::from_le_bytes([bytes[pos + 4], bytes[pos + 5]])
            } else {
                0
            };

            let step_ok = prev.map_or(true, |(px, py)| {
                (i64::from(x - px).abs() + i64::from(y - py).abs()) <= MAX_STEP
            });

            if x.abs() < COORD_BOUND && y.abs() < COORD_BOUND && step_ok {
                if !budget.try_point() {
                    break;
                }
                current.push(RawStitch::new(
                    f64::from(x) / 10.0,
                    f64::from(y) / 10.0,
                    Self::map_command(cmd),
                    current.len(),
                ));
                prev = Some((x, y));
            } else {
                if current.len() > best.len() {
                    best = std::mem::take(&mut current);
                } else {
                    current.clear();
                }
                prev = None;
            }
            pos += stride;
        }

        if current.len() > best.len() {
            best = current;
        }
        best
    }
}

impl ExtractionStrategy for CoordinatePatternScanner {
    fn name(&self) -> &'static str {
        "coordinate-pattern scanner"
    }

    fn rank_ceiling(&self) -> f64 {
        0.50
    }

    fn point_cap(&self, config: &AnalyzeConfig) -> usize {
        config.max_stitch_analysis_points
    }

    fn extract(
        &self,
        bytes: &[u8],
        _config: &AnalyzeConfig,
        budget: &mut ScanBudget,
    ) -> StrategyOutcome {
        let mut outcome = StrategyOutcome::empty(self.name());
        if bytes.len() < 16 {
            return outcome;
        }

        let mut winner: Option<Run> = None;
        for stride in CANDIDATE_STRIDES {
            for offset in 0..stride.min(4) {
                let run = Self::best_run(bytes, stride, offset, budget);
                if winner.as_ref().map_or(true, |w| run.len() > w.stitches.len()) {
                    winner = Some(Run {
                        stride,
                        stitches: run,
                    });
                }
                if budget.stop_reason().is_some() {
                    break;
                }
            }
        }

        let Some(run) = winner.filter(|r| r.stitches.len() >= 8) else {
            return outcome;
        };

        let total_records = bytes.len() / run.stride;
        let coverage = run.stitches.len() as f64 / total_records.max(1) as f64;
        let bbox_factor = match BoundingBox::of(&run.stitches) {
            Some(bbox)
                if (1.0..=2000.0).contains(&bbox.width())
                    && (1.0..=2000.0).contains(&bbox.height()) =>
            {
                1.0
            }
            _ => 0.4,
        };

        // Reindex after the winning run is chosen; the run may have started
        // mid-buffer.
        outcome.stitches = run
            .stitches
            .into_iter()
            .enumerate()
            .map(|(i, mut s)| {
                s.sequence_index = i;
                s
            })
            .collect();
        outcome.confidence = (0.15 + 0.35 * coverage) * bbox_factor;
        outcome
    }
}
