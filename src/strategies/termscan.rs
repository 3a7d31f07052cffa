//! Embroidery-term string scanner
//!
//! Last-resort metadata recovery for buffers where no coordinate data is
//! recoverable: searches decoded text runs for known embroidery vocabulary
//! (thread color names, stitch-type words, underlay and stabilizer terms) and
//! turns them into inferred color entries and settings.

use crate::core::config::AnalyzeConfig;
use crate::core::model::{ColorEntry, ParameterKey, ParameterValue};

use super::{ascii_text, ExtractionStrategy, ScanBudget, StrategyOutcome};

/// Color names with representative RGB values
const COLOR_TERMS: [(&str, (u8, u8, u8)); 10] = [
    ("red", (220, 20, 20)),
    ("green", (20, 180, 20)),
    ("blue", (20, 20, 220)),
    ("yellow", (230, 230, 30)),
    ("purple", (160, 40, 160)),
    ("cyan", (40, 200, 200)),
    ("orange", (240, 140, 30)),
    ("white", (245, 245, 245)),
    ("black", (15, 15, 15)),
    ("gray", (128, 128, 128)),
];

const STITCH_TYPE_TERMS: [&str; 7] = [
    "running", "satin", "fill", "tatami", "cross stitch", "bean stitch", "zigzag",
];

const STABILIZER_TERMS: [&str; 5] =
    ["tear-away", "cut-away", "wash-away", "heat-away", "sticky"];

pub struct EmbroideryTermScanner;

impl ExtractionStrategy for EmbroideryTermScanner {
    fn name(&self) -> &'static str {
        "embroidery-term scanner"
    }

    fn rank_ceiling(&self) -> f64 {
        0.60
    }

    fn point_cap(&self, config: &AnalyzeConfig) -> usize {
        config.max_coordinate_points
    }

    fn extract(
        &self,
        bytes: &[u8],
        _config: &AnalyzeConfig,
        budget: &mut ScanBudget,
    ) -> StrategyOutcome {
        let mut outcome = StrategyOutcome::empty(self.name());
        let text = ascii_text(bytes).to_ascii_lowercase();
        if text.is_empty() {
            return outcome;
        }

        let mut hits = 0usize;

        for (term, rgb) in COLOR_TERMS {
            if !budget.keep_scanning() {
                break;
            }
            if text.contains(term) && budget.try_point() {
                outcome
                    .colors
                    .push(ColorEntry::inferred(outcome.colors.len(), Some(rgb)));
                hits += 1;
            }
        }

        let mut stitch_types: Vec<&str> = Vec::new();
        for term in STITCH_TYPE_TERMS {
            if text.contains(term) {
                stitch_types.push(term);
                hits += 1;
            }
        }
        if !stitch_types.is_empty() {
            outcome.settings.set(
                ParameterKey::StitchTypes,
                ParameterValue::Text(stitch_types.join(", ")),
            );
        }

        for term in STABILIZER_TERMS {
            if text.contains(term) {
                outcome.settings.set(
                    ParameterKey::StabilizerType,
                    ParameterValue::Text(term.to_string()),
                );
                hits += 1;
                break;
            }
        }

        if hits > 0 {
            // Vocabulary hits are weak evidence; trust rises slowly.
            outcome.confidence = (0.15 + 0.05 * hits as f64).min(self.rank_ceiling());
        }
        outcome
    }
}
