//! Analysis engine
//!
//! The single entry point tying the pipeline together: validate the buffer,
//! sniff the format, try the trusted decoder, demote to the fallback strategy
//! chain when it declines, segment whatever stitch stream came out, and hand
//! everything to the assembler. Failures inside extraction become warnings on
//! the record; only an unusable input buffer is a hard error.

use std::time::{Duration, Instant};

use crate::assemble::{assemble, Assembly};
use crate::core::config::AnalyzeConfig;
use crate::core::error::AnalysisError;
use crate::core::model::{AnalysisRecord, ColorEntry, ExtractionSource, MachineSettings};
use crate::decode::{BuiltinDecoder, TrustedDecoder};
use crate::segment::segment;
use crate::sniff::sniff;
use crate::strategies::{default_chain, run_chain, StrategyOutcome};

/// Confidence assigned to a successful full-fidelity decode
const TRUSTED_CONFIDENCE: f64 = 0.95;

/// Analyze a buffer with the built-in decoder.
pub fn analyze(bytes: &[u8], config: &AnalyzeConfig) -> Result<AnalysisRecord, AnalysisError> {
    analyze_with_decoder(bytes, config, &BuiltinDecoder)
}

/// Analyze a buffer, routing trusted decodes through the given decoder.
///
/// Returns `Err` only for inputs that cannot be analyzed at all (empty or
/// over the size limit). Every other condition (unknown format, corrupt
/// stitch block, exhausted strategies, truncated scans) produces a complete
/// record whose warnings explain what went wrong.
pub fn analyze_with_decoder(
    bytes: &[u8],
    config: &AnalyzeConfig,
    decoder: &dyn TrustedDecoder,
) -> Result<AnalysisRecord, AnalysisError> {
    if bytes.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    if bytes.len() > config.max_file_size_bytes {
        return Err(AnalysisError::InputTooLarge {
            actual: bytes.len(),
            limit: config.max_file_size_bytes,
        });
    }

    let classification = sniff(bytes);
    tracing::info!(
        family = classification.family.as_str(),
        confidence = classification.confidence,
        bytes = bytes.len(),
        "analysis started"
    );

    let deadline = Instant::now() + Duration::from_secs(config.timeout_seconds);
    let mut warnings: Vec<String> = Vec::new();

    if decoder.supports(classification.family) {
        match decoder.decode(bytes, classification.family) {
            Ok(decoded) if !decoded.stitches.is_empty() => {
                tracing::info!(
                    stitches = decoded.stitches.len(),
                    colors = decoded.colors.len(),
                    "trusted decode succeeded"
                );
                let patterns = segment(decoded.stitches, &decoded.colors, config);
                return Ok(assemble(
                    Assembly {
                        classification,
                        source: ExtractionSource::TrustedDecoder,
                        extraction_confidence: TRUSTED_CONFIDENCE,
                        patterns,
                        settings: decoded.settings,
                        warnings,
                    },
                    config,
                ));
            }
            Ok(_) => {
                warnings.push(format!(
                    "{} decoded cleanly but contained no stitches; trying heuristic extraction",
                    classification.family
                ));
            }
            Err(err) => {
                tracing::warn!(error = %err, "trusted decode failed, demoting to fallback chain");
                warnings.push(format!(
                    "{} decode failed ({}); falling back to heuristic extraction",
                    classification.family, err
                ));
            }
        }
    }

    let chain = default_chain();
    let outcomes = run_chain(&chain, bytes, config, deadline);

    // Settings merge across every usable outcome in chain order, so a
    // higher-trust strategy's value wins a key conflict.
    let mut settings = MachineSettings::default();
    for outcome in &outcomes {
        warnings.extend(outcome.warnings.iter().cloned());
        if outcome.is_usable() {
            settings.absorb(outcome.settings.clone());
        }
    }

    let best_stitches = best_outcome(&outcomes, StrategyOutcome::has_stitches);
    let best_usable = best_outcome(&outcomes, StrategyOutcome::is_usable);

    let (source, extraction_confidence, stitches, colors) = match (best_stitches, best_usable) {
        (Some(with_stitches), _) => (
            ExtractionSource::Fallback(with_stitches.strategy.to_string()),
            with_stitches.confidence,
            with_stitches.stitches.clone(),
            pick_colors(with_stitches, &outcomes),
        ),
        (None, Some(usable)) => (
            ExtractionSource::Fallback(usable.strategy.to_string()),
            usable.confidence,
            Vec::new(),
            pick_colors(usable, &outcomes),
        ),
        (None, None) => (ExtractionSource::None, 0.0, Vec::new(), Vec::new()),
    };

    tracing::info!(
        source = ?source,
        confidence = extraction_confidence,
        stitches = stitches.len(),
        "fallback extraction finished"
    );

    let patterns = segment(stitches, &colors, config);
    Ok(assemble(
        Assembly {
            classification,
            source,
            extraction_confidence,
            patterns,
            settings,
            warnings,
        },
        config,
    ))
}

/// Highest-confidence outcome passing the filter. A later outcome replaces
/// the running best only on a strictly higher confidence, so a tie keeps the
/// earlier (higher-trust) strategy in the chain.
fn best_outcome<'a>(
    outcomes: &'a [StrategyOutcome],
    keep: impl Fn(&StrategyOutcome) -> bool,
) -> Option<&'a StrategyOutcome> {
    outcomes
        .iter()
        .filter(|o| keep(o))
        .fold(None, |best: Option<&StrategyOutcome>, o| match best {
            Some(b) if o.confidence > b.confidence => Some(o),
            None => Some(o),
            _ => best,
        })
}

/// The winner's own colors, or the best color set any other outcome found.
fn pick_colors(winner: &StrategyOutcome, outcomes: &[StrategyOutcome]) -> Vec<ColorEntry> {
    if !winner.colors.is_empty() {
        return winner.colors.clone();
    }
    best_outcome(outcomes, |o| !o.colors.is_empty())
        .map(|o| o.colors.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{FormatFamily, RawStitch, StitchCommand};
    use crate::decode::dst::test_support::build_file;

    #[test]
    fn empty_input_is_a_hard_error() {
        let err = analyze(&[], &AnalyzeConfig::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyInput));
    }

    #[test]
    fn oversized_input_is_a_hard_error() {
        let config = AnalyzeConfig {
            max_file_size_bytes: 8,
            ..Default::default()
        };
        let err = analyze(&[0u8; 9], &config).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InputTooLarge {
                actual: 9,
                limit: 8
            }
        ));
    }

    #[test]
    fn dst_file_goes_through_the_trusted_decoder() {
        let bytes = build_file(
            3,
            1,
            &[
                (10, 0, 0x00),
                (10, 0, 0x00),
                (0, 10, 0x00),
                (0, 0, 0xC0),
                (0, 0, 0xF0),
            ],
        );
        let record = analyze(&bytes, &AnalyzeConfig::default()).unwrap();
        assert_eq!(record.classification.family, FormatFamily::Dst);
        assert_eq!(record.source, ExtractionSource::TrustedDecoder);
        assert_eq!(record.patterns.len(), 1);
        // Normal stitches only; the color change and end marker count apart.
        assert_eq!(record.aggregate_metrics.totals.stitch_count, 3);
        assert_eq!(record.aggregate_metrics.totals.color_change_count, 1);
    }

    #[test]
    fn corrupt_dst_demotes_to_fallback_with_a_warning() {
        // Valid label header, stitch block of records with the mandatory
        // control bits cleared.
        let mut bytes = build_file(10, 0, &[]);
        bytes.extend_from_slice(&[0u8; 30]);
        let record = analyze(&bytes, &AnalyzeConfig::default()).unwrap();
        assert_ne!(record.source, ExtractionSource::TrustedDecoder);
        assert!(record
            .warnings
            .iter()
            .any(|w| w.contains("falling back")));
    }

    #[test]
    fn unknown_buffer_with_settings_text_yields_a_settings_only_record() {
        let bytes = b"opaque export density: 4.0 machine_speed=750".to_vec();
        let record = analyze(&bytes, &AnalyzeConfig::default()).unwrap();
        assert!(matches!(record.source, ExtractionSource::Fallback(_)));
        assert!(record.patterns.is_empty());
        assert!(!record.machine_settings.is_empty());
        assert!(record.extraction_confidence > 0.0);
        // Settings alone never imply stitch data; the record must say so.
        assert!(record
            .warnings
            .iter()
            .any(|w| w.contains("no stitch data")));
    }

    #[test]
    fn pure_noise_keeps_the_empty_patterns_contract() {
        // Bytes with no text runs, no plausible coordinates, no sections.
        let bytes: Vec<u8> = (0..64u32)
            .flat_map(|i| [0xFFu8, 0xFE, (i % 3) as u8, 0x01])
            .collect();
        let record = analyze(&bytes, &AnalyzeConfig::default()).unwrap();
        // Empty patterns and the missing-stitch-data warning travel together,
        // whichever way the scanners read the noise.
        assert_eq!(
            record.patterns.is_empty(),
            record.warnings.iter().any(|w| w.contains("no stitch data"))
        );
        assert!(record.extraction_confidence <= 0.6);
    }

    #[test]
    fn confidence_ties_keep_the_earlier_strategy() {
        let stitch = RawStitch::new(0.0, 0.0, StitchCommand::Normal, 0);
        let mut first = StrategyOutcome::empty("structured content parser");
        first.confidence = 0.5;
        first.stitches = vec![stitch];
        let mut second = StrategyOutcome::empty("coordinate pattern scanner");
        second.confidence = 0.5;
        second.stitches = vec![stitch];
        let outcomes = vec![first, second];
        let best = best_outcome(&outcomes, StrategyOutcome::has_stitches).unwrap();
        assert_eq!(best.strategy, "structured content parser");
    }

    #[test]
    fn strictly_higher_confidence_still_wins_from_behind() {
        let stitch = RawStitch::new(0.0, 0.0, StitchCommand::Normal, 0);
        let mut first = StrategyOutcome::empty("key-value scanner");
        first.confidence = 0.3;
        first.stitches = vec![stitch];
        let mut second = StrategyOutcome::empty("PMLPXF section scanner");
        second.confidence = 0.4;
        second.stitches = vec![stitch];
        let outcomes = vec![first, second];
        let best = best_outcome(&outcomes, StrategyOutcome::has_stitches).unwrap();
        assert_eq!(best.strategy, "PMLPXF section scanner");
    }

    #[test]
    fn analysis_is_deterministic() {
        let bytes = build_file(2, 0, &[(5, 5, 0x00), (5, -5, 0x00), (0, 0, 0xF0)]);
        let a = analyze(&bytes, &AnalyzeConfig::default()).unwrap();
        let b = analyze(&bytes, &AnalyzeConfig::default()).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn end_markers_split_a_decoded_stream() {
        let mut records = Vec::new();
        for _ in 0..30 {
            records.push((5, 0, 0x00));
        }
        records.push((0, 0, 0xF0));
        let bytes = build_file(30, 0, &records);
        let record = analyze(&bytes, &AnalyzeConfig::default()).unwrap();
        assert_eq!(record.patterns.len(), 1);
        assert!(record.patterns[0]
            .stitches
            .iter()
            .any(|s| s.command == StitchCommand::End));
    }
}
