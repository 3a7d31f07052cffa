//! Structured-content parser
//!
//! Highest-trust fallback: looks for embedded metadata blocks that design
//! software leaves in PXF containers: creator markers, software names and
//! version tokens. These blocks are deliberate, human-readable structure, so
//! finding them says much more than any byte-pattern guess.

use regex::Regex;
use std::sync::OnceLock;

use crate::core::config::AnalyzeConfig;
use crate::core::model::{ParameterKey, ParameterValue};

use super::{ascii_text, ExtractionStrategy, ScanBudget, StrategyOutcome};

/// Metadata markers worth capturing context around
const METADATA_MARKERS: [&str; 7] = [
    "Created",
    "Software",
    "Tajima",
    "DG/ML",
    "Version",
    "Author",
    "Description",
];

fn software_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)Tajima\s+DG/ML\s*\S*",
            r"(?i)Tajima\s+\S+",
            r"(?i)DG/ML\s+\S+",
            r"(?i)Pulse\s+\S+",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static regex"))
        .collect()
    })
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"DG(\d+)").expect("static regex"))
}

pub struct StructuredContentParser;

impl ExtractionStrategy for StructuredContentParser {
    fn name(&self) -> &'static str {
        "structured-content parser"
    }

    fn rank_ceiling(&self) -> f64 {
        0.90
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

        let mut hits = 0usize;

        for marker in METADATA_MARKERS {
            if !budget.keep_scanning() {
                break;
            }
            if let Some(pos) = text.find(marker) {
                if !budget.try_point() {
                    break;
                }
                hits += 1;
                // Capture the line around the marker as a raw metadata extra.
                let line_start = text[..pos].rfind('\n').map_or(0, |p| p + 1);
                let line_end = text[pos..].find('\n').map_or(text.len(), |p| pos + p);
                let context = text[line_start..line_end].trim();
                if matches!(marker, "Created" | "Author" | "Description") && !context.is_empty() {
                    outcome.settings.set_extra(
                        marker.to_ascii_lowercase(),
                        ParameterValue::Text(context.to_string()),
                    );
                }
            }
        }

        for pattern in software_patterns() {
            if let Some(m) = pattern.find(&text) {
                outcome.settings.set(
                    ParameterKey::Software,
                    ParameterValue::Text(m.as_str().trim().to_string()),
                );
                hits += 1;
                break;
            }
        }
        if let Some(caps) = version_pattern().captures(&text) {
            outcome.settings.set(
                ParameterKey::SoftwareVersion,
                ParameterValue::Text(format!("DG{}", &caps[1])),
            );
            hits += 1;
        }

        if hits > 0 {
            // Each distinct structured hit raises trust toward the ceiling.
            outcome.confidence = (0.4 + 0.1 * hits as f64).min(self.rank_ceiling());
        }
        outcome
    }
}
