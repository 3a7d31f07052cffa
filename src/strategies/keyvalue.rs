//! Key-value scanner
//!
//! Scans decoded text runs anywhere in the byte stream for
//! `parameter[:=] value` tokens (e.g. `density: 4.2`, `machine_speed=750`).
//! Values are range-validated per parameter so stray numbers in stitch data
//! do not masquerade as settings. Multiple distinct values for one parameter
//! collapse into a min-max range, a strong hint that several patterns share
//! the file.

use regex::Regex;
use std::sync::OnceLock;

use crate::core::config::AnalyzeConfig;
use crate::core::model::{ParameterKey, ParameterValue};

use super::{ascii_text, ExtractionStrategy, ScanBudget, StrategyOutcome};

/// Token name, external key, accepted range
struct NumericToken {
    token: &'static str,
    key: ParameterKey,
    min: f64,
    max: f64,
}

/// Tokens with numeric payloads. Length-valued parameters stay in mm here;
/// the assembler converts them for display.
const NUMERIC_TOKENS: [NumericToken; 6] = [
    NumericToken {
        token: "density",
        key: ParameterKey::RowSpacing,
        min: 0.1,
        max: 20.0,
    },
    NumericToken {
        token: "compensation",
        key: ParameterKey::PullCompensation,
        min: -50.0,
        max: 50.0,
    },
    NumericToken {
        token: "angle",
        key: ParameterKey::FillAngle,
        min: -180.0,
        max: 180.0,
    },
    NumericToken {
        token: "stitch_length",
        key: ParameterKey::StitchLength,
        min: 0.1,
        max: 10.0,
    },
    NumericToken {
        token: "machine_speed",
        key: ParameterKey::MachineSpeed,
        min: 100.0,
        max: 2000.0,
    },
    NumericToken {
        token: "tension",
        key: ParameterKey::ThreadTension,
        min: 0.0,
        max: 100.0,
    },
];

fn numeric_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b([a-z_]+)\s*[:=]\s*(-?\d+(?:\.\d+)?)").expect("static regex")
    })
}

fn underlay_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\bunderlay\s*[:=]\s*(\w+)").expect("static regex"))
}

pub struct KeyValueScanner;

impl ExtractionStrategy for KeyValueScanner {
    fn name(&self) -> &'static str {
        "key-value scanner"
    }

    fn rank_ceiling(&self) -> f64 {
        0.80
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
        let text = ascii_text(bytes);
        if text.is_empty() {
            return outcome;
        }

        let mut matched_keys = 0usize;

        for caps in numeric_pattern().captures_iter(&text) {
            if !budget.keep_scanning() || !budget.try_point() {
                break;
            }
            let token = caps[1].to_ascii_lowercase();
            let Ok(value) = caps[2].parse::<f64>() else {
                continue;
            };
            match NUMERIC_TOKENS
                .iter()
                .find(|t| token == t.token || token.ends_with(t.token))
            {
                Some(spec) if value >= spec.min && value <= spec.max => {
                    if outcome.settings.get(spec.key).is_none() {
                        matched_keys += 1;
                    }
                    outcome.settings.observe_number(spec.key, value);
                }
                Some(_) => {} // token known, value implausible
                None => {
                    // Forward-compatibility side-channel for tokens the
                    // vocabulary does not cover yet.
                    if token.len() >= 4 {
                        outcome
                            .settings
                            .set_extra(token, ParameterValue::Number(value));
                    }
                }
            }
        }

        if let Some(caps) = underlay_pattern().captures(&text) {
            outcome.settings.set(
                ParameterKey::UnderlayType,
                ParameterValue::Text(caps[1].to_string()),
            );
            matched_keys += 1;
        }

        if matched_keys > 0 {
            outcome.confidence = (0.3 + 0.1 * matched_keys as f64).min(self.rank_ceiling());
        }
        outcome
    }
}
