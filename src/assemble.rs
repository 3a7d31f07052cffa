//! Result assembler
//!
//! Folds the pieces of one analysis run (classification, extracted patterns,
//! merged machine settings, accumulated warnings) into the final immutable
//! [`AnalysisRecord`]. Unit conversion happens here and only here: everything
//! upstream works in millimetres, and length-valued settings are converted to
//! the configured unit system on the way out.

use crate::core::config::{AnalyzeConfig, UnitSystem};
use crate::core::model::{
    AnalysisRecord, ExtractionSource, FormatClassification, MachineSettings, ParameterKey,
    ParameterValue, PatternCandidate,
};
use crate::metrics;

/// Settings keys whose numeric payloads are millimetre lengths
const LENGTH_MM_KEYS: [ParameterKey; 3] = [
    ParameterKey::RowSpacing,
    ParameterKey::StitchLength,
    ParameterKey::HoopDimensions,
];

/// Extraction confidence below which the record carries an explicit caveat
const LOW_CONFIDENCE_THRESHOLD: f64 = 0.3;

/// Dimension plausibility window in mm; outside it a warning is attached
const MIN_PLAUSIBLE_EXTENT_MM: f64 = 1.0;
const MAX_PLAUSIBLE_EXTENT_MM: f64 = 1000.0;

/// Everything the orchestrator hands over for final packaging
pub struct Assembly {
    pub classification: FormatClassification,
    pub source: ExtractionSource,
    pub extraction_confidence: f64,
    pub patterns: Vec<PatternCandidate>,
    pub settings: MachineSettings,
    pub warnings: Vec<String>,
}

/// Package an assembly into the final record.
///
/// Computes per-pattern and aggregate metrics, converts length-valued
/// settings into the configured unit, and attaches quality warnings. The
/// record is complete even when extraction recovered nothing: an empty
/// pattern list plus an explanatory warning is the documented shape of total
/// extraction failure.
pub fn assemble(assembly: Assembly, config: &AnalyzeConfig) -> AnalysisRecord {
    let Assembly {
        classification,
        source,
        extraction_confidence,
        patterns,
        mut settings,
        mut warnings,
    } = assembly;

    let per_pattern: Vec<_> = patterns.iter().map(metrics::compute).collect();
    let aggregate_metrics = metrics::aggregate(&per_pattern);

    convert_lengths(&mut settings, config.unit_system);

    if patterns.is_empty() {
        warnings.push(match source {
            ExtractionSource::None => {
                "no stitch data could be extracted; all decoding and scanning strategies were \
                 exhausted"
                    .to_string()
            }
            _ => "no stitch data could be extracted; the record carries recovered settings and \
                  colors only"
                .to_string(),
        });
    }
    if extraction_confidence > 0.0 && extraction_confidence < LOW_CONFIDENCE_THRESHOLD {
        warnings.push(format!(
            "extraction confidence is low ({:.2}); results are best-effort guesses",
            extraction_confidence
        ));
    }
    for (i, pattern) in patterns.iter().enumerate() {
        let Some(bbox) = pattern.bounding_box else {
            continue;
        };
        let extent = bbox.width().max(bbox.height());
        if extent > MAX_PLAUSIBLE_EXTENT_MM || extent < MIN_PLAUSIBLE_EXTENT_MM {
            warnings.push(format!(
                "pattern {} has implausible dimensions ({:.1} × {:.1} mm); coordinates may be \
                 misinterpreted",
                i + 1,
                bbox.width(),
                bbox.height()
            ));
        }
    }

    AnalysisRecord {
        classification,
        source,
        extraction_confidence,
        patterns,
        metrics: per_pattern,
        aggregate_metrics,
        machine_settings: settings,
        warnings,
    }
}

/// Convert millimetre-valued settings entries into the display unit.
fn convert_lengths(settings: &mut MachineSettings, unit: UnitSystem) {
    if unit == UnitSystem::Millimeters {
        return;
    }
    for key in LENGTH_MM_KEYS {
        if let Some(value) = settings.known.get_mut(&key) {
            match value {
                ParameterValue::Number(v) => *v = unit.from_mm(*v),
                ParameterValue::Range { min, max } => {
                    *min = unit.from_mm(*min);
                    *max = unit.from_mm(*max);
                }
                _ => {}
            }
        }
    }
}
