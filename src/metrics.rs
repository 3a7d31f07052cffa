//! Metrics engine
//!
//! Pure functions from a segmented pattern to its technical specification.
//! All calibration constants live here and the computation is deterministic:
//! identical input always produces identical metrics.

use crate::core::model::{
    AggregateMetrics, MetricRange, PatternCandidate, StitchCommand, TechnicalMetrics,
};

/// Seconds per normal stitch at the 800 st/min calibration rate
const SECONDS_PER_STITCH: f64 = 0.075;
/// Jumps move the frame without sewing and cost a bit more
const SECONDS_PER_JUMP: f64 = 0.12;
/// A color change stops the machine for a thread swap
const SECONDS_PER_COLOR_CHANGE: f64 = 30.0;
const SECONDS_PER_TRIM: f64 = 10.0;
const SECONDS_PER_STOP: f64 = 5.0;

/// Complexity calibration: stitch counts for the simple/medium/complex bands
const COMPLEXITY_STITCH_SCALE: f64 = 15_000.0;
const COMPLEXITY_COLOR_SCALE: f64 = 10.0;
const COMPLEXITY_DENSITY_SCALE: f64 = 300.0;

/// Compute the technical specification for one pattern.
pub fn compute(pattern: &PatternCandidate) -> TechnicalMetrics {
    let mut m = TechnicalMetrics::default();

    let mut sewn_length_mm = 0.0;
    let mut sewn_segments = 0usize;
    let mut prev_normal: Option<(f64, f64)> = None;
    let mut prev: Option<(f64, f64)> = None;

    for s in &pattern.stitches {
        match s.command {
            StitchCommand::Normal => {
                m.stitch_count += 1;
                if let Some((px, py)) = prev_normal {
                    let d = ((s.x - px).powi(2) + (s.y - py).powi(2)).sqrt();
                    sewn_length_mm += d;
                    sewn_segments += 1;
                }
                prev_normal = Some((s.x, s.y));
            }
            StitchCommand::Jump => {
                m.jump_count += 1;
                if let Some((px, py)) = prev {
                    let d = ((s.x - px).powi(2) + (s.y - py).powi(2)).sqrt();
                    m.max_jump_distance_mm = m.max_jump_distance_mm.max(d);
                }
            }
            StitchCommand::ColorChange => m.color_change_count += 1,
            StitchCommand::Trim => m.trim_count += 1,
            StitchCommand::Stop | StitchCommand::End | StitchCommand::Unknown => {}
        }
        prev = Some((s.x, s.y));
    }

    m.thread_consumption_cm = sewn_length_mm / 10.0;
    if sewn_segments > 0 {
        m.average_stitch_length_mm = sewn_length_mm / sewn_segments as f64;
    }

    if let Some(bbox) = pattern.bounding_box {
        let area = bbox.area_cm2();
        if area > 0.0 {
            m.density_per_cm2 = m.stitch_count as f64 / area;
        }
    }

    m.estimated_time_seconds = m.stitch_count as f64 * SECONDS_PER_STITCH
        + m.jump_count as f64 * SECONDS_PER_JUMP
        + m.color_change_count as f64 * SECONDS_PER_COLOR_CHANGE
        + m.trim_count as f64 * SECONDS_PER_TRIM
        + pattern
            .stitches
            .iter()
            .filter(|s| s.command == StitchCommand::Stop)
            .count() as f64
            * SECONDS_PER_STOP;

    let total_moves = m.stitch_count + m.jump_count;
    if total_moves > 0 {
        m.thread_efficiency = 1.0 - m.jump_count as f64 / total_moves as f64;
    }

    let color_count = pattern.color_entries.len().max(
        // Color changes imply one more thread than changes seen.
        if m.color_change_count > 0 {
            m.color_change_count + 1
        } else {
            0
        },
    );
    m.complexity_score = complexity_score(m.stitch_count, color_count, m.density_per_cm2);

    m
}

/// Weighted composite in [0, 1]: stitch volume dominates, palette size and
/// density refine it.
fn complexity_score(stitch_count: usize, color_count: usize, density: f64) -> f64 {
    let stitch_term = (stitch_count as f64 / COMPLEXITY_STITCH_SCALE).min(1.0);
    let color_term = (color_count as f64 / COMPLEXITY_COLOR_SCALE).min(1.0);
    let density_term = (density / COMPLEXITY_DENSITY_SCALE).min(1.0);
    0.5 * stitch_term + 0.3 * color_term + 0.2 * density_term
}

/// Human-readable density band, calibrated in stitches per cm².
pub fn density_band(density_per_cm2: f64) -> &'static str {
    match density_per_cm2 {
        d if d < 10.0 => "very low",
        d if d < 50.0 => "low",
        d if d < 200.0 => "medium",
        d if d < 500.0 => "high",
        _ => "very high",
    }
}

/// Combine per-pattern metrics into totals plus min-max spreads.
///
/// Counts and lengths sum; density and complexity are recomputed as weighted
/// views rather than averaged, and the ranges expose per-pattern variation
/// instead of hiding it behind a single number.
pub fn aggregate(per_pattern: &[TechnicalMetrics]) -> AggregateMetrics {
    let mut totals = TechnicalMetrics::default();
    for m in per_pattern {
        totals.stitch_count += m.stitch_count;
        totals.jump_count += m.jump_count;
        totals.color_change_count += m.color_change_count;
        totals.trim_count += m.trim_count;
        totals.estimated_time_seconds += m.estimated_time_seconds;
        totals.thread_consumption_cm += m.thread_consumption_cm;
        totals.max_jump_distance_mm = totals.max_jump_distance_mm.max(m.max_jump_distance_mm);
        totals.complexity_score = totals.complexity_score.max(m.complexity_score);
    }
    if !per_pattern.is_empty() {
        let sewn: f64 = per_pattern
            .iter()
            .map(|m| m.average_stitch_length_mm * m.stitch_count.saturating_sub(1) as f64)
            .sum();
        let segments: usize = per_pattern
            .iter()
            .map(|m| m.stitch_count.saturating_sub(1))
            .sum();
        if segments > 0 {
            totals.average_stitch_length_mm = sewn / segments as f64;
        }
        let density_weights: f64 = per_pattern
            .iter()
            .filter(|m| m.density_per_cm2 > 0.0)
            .map(|m| m.stitch_count as f64 / m.density_per_cm2)
            .sum();
        if density_weights > 0.0 {
            // Total stitches over total covered area.
            let dense_stitches: usize = per_pattern
                .iter()
                .filter(|m| m.density_per_cm2 > 0.0)
                .map(|m| m.stitch_count)
                .sum();
            totals.density_per_cm2 = dense_stitches as f64 / density_weights;
        }
        let moves = totals.stitch_count + totals.jump_count;
        if moves > 0 {
            totals.thread_efficiency = 1.0 - totals.jump_count as f64 / moves as f64;
        }
    }

    let spread = per_pattern.len() > 1;
    AggregateMetrics {
        totals,
        density_range: spread
            .then(|| MetricRange::of(per_pattern.iter().map(|m| m.density_per_cm2)))
            .flatten()
            .filter(MetricRange::is_spread),
        stitch_count_range: spread
            .then(|| MetricRange::of(per_pattern.iter().map(|m| m.stitch_count as f64)))
            .flatten()
            .filter(MetricRange::is_spread),
        time_range: spread
            .then(|| MetricRange::of(per_pattern.iter().map(|m| m.estimated_time_seconds)))
            .flatten()
            .filter(MetricRange::is_spread),
    }
}
