//! Pattern segmenter
//!
//! Splits one merged stitch stream into the distinct embroidery patterns it
//! contains. Explicit end-of-pattern markers are the fast path; without them
//! the segmenter falls back to jump-distance boundaries and spatial
//! clustering, then reconciles the two. Segmentations are expressed as sets
//! of segment-start indices over the input stream, so every stitch lands in
//! exactly one candidate; nothing is duplicated or dropped.

use crate::core::config::AnalyzeConfig;
use crate::core::model::{BoundingBox, ColorEntry, PatternCandidate, RawStitch, StitchCommand};

/// Confidence assigned per segmentation method
const CONFIDENCE_END_MARKERS: f64 = 0.95;
const CONFIDENCE_JUMP: f64 = 0.80;
const CONFIDENCE_SPATIAL: f64 = 0.70;
const CONFIDENCE_SINGLE: f64 = 0.90;

/// Split a stitch stream into pattern candidates.
///
/// The returned candidates partition the input: concatenating their stitch
/// slices in order reproduces the stream exactly. Boundary ties (a jump of
/// exactly the threshold) resolve toward merging, so borderline files do not
/// oversegment.
pub fn segment(
    stitches: Vec<RawStitch>,
    colors: &[ColorEntry],
    config: &AnalyzeConfig,
) -> Vec<PatternCandidate> {
    if stitches.is_empty() {
        return Vec::new();
    }

    // Fast path: explicit end-of-pattern markers.
    let marker_starts = boundaries_from_end_markers(&stitches);
    if marker_starts.len() > 1 {
        let starts = merge_fragments(&stitches, marker_starts, config);
        if starts.len() > 1 {
            tracing::debug!(patterns = starts.len(), "segmented on end markers");
            return build_candidates(stitches, &starts, colors, CONFIDENCE_END_MARKERS);
        }
    }

    let jump_starts = merge_fragments(&stitches, boundaries_from_jumps(&stitches, config), config);
    let spatial_starts =
        merge_fragments(&stitches, boundaries_from_clustering(&stitches, config), config);

    // Reconciliation: prefer the segmentation with more complete patterns;
    // fewer, complete patterns beat many fragments.
    let jump_score = completeness(&stitches, &jump_starts, config);
    let spatial_score = completeness(&stitches, &spatial_starts, config);

    let (starts, confidence) = if jump_starts.len() == 1 && spatial_starts.len() == 1 {
        (jump_starts, CONFIDENCE_SINGLE)
    } else if spatial_score > jump_score
        || (spatial_score == jump_score && spatial_starts.len() < jump_starts.len())
    {
        (spatial_starts, CONFIDENCE_SPATIAL)
    } else {
        (jump_starts, CONFIDENCE_JUMP)
    };

    tracing::debug!(patterns = starts.len(), confidence, "segmentation chosen");
    build_candidates(stitches, &starts, colors, confidence)
}

/// Segment-start indices derived from explicit end markers. Always contains 0.
fn boundaries_from_end_markers(stitches: &[RawStitch]) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, s) in stitches.iter().enumerate() {
        if s.command == StitchCommand::End && i + 1 < stitches.len() {
            starts.push(i + 1);
        }
    }
    starts
}

/// Segment-start indices at jumps longer than the configured threshold.
/// A distance of exactly the threshold does not split.
fn boundaries_from_jumps(stitches: &[RawStitch], config: &AnalyzeConfig) -> Vec<usize> {
    let threshold = config.jump_threshold_mm();
    let mut starts = vec![0];
    for i in 1..stitches.len() {
        if stitches[i - 1].distance_to(&stitches[i]) > threshold {
            starts.push(i);
        }
    }
    starts
}

/// Segment-start indices from spatial clustering: a stitch that lands beyond
/// the gap radius of the current cluster's evolving bounding box opens a new
/// cluster.
fn boundaries_from_clustering(stitches: &[RawStitch], config: &AnalyzeConfig) -> Vec<usize> {
    let gap = config.spatial_gap_mm();
    let mut starts = vec![0];
    let first = &stitches[0];
    let mut bbox = BoundingBox {
        min_x: first.x,
        min_y: first.y,
        max_x: first.x,
        max_y: first.y,
    };
    for (i, s) in stitches.iter().enumerate().skip(1) {
        if bbox.distance_to_point(s.x, s.y) > gap {
            starts.push(i);
            bbox = BoundingBox {
                min_x: s.x,
                min_y: s.y,
                max_x: s.x,
                max_y: s.y,
            };
        } else {
            bbox.expand(s.x, s.y);
        }
    }
    starts
}

/// Merge segments shorter than the minimum stitch count into their nearest
/// neighboring segment. Fragments are not patterns.
fn merge_fragments(
    stitches: &[RawStitch],
    mut starts: Vec<usize>,
    config: &AnalyzeConfig,
) -> Vec<usize> {
    let min_count = config.pattern_min_stitch_count;
    loop {
        if starts.len() <= 1 {
            return starts;
        }
        let lens = segment_lengths(stitches.len(), &starts);
        let Some(frag) = lens.iter().position(|&l| l < min_count) else {
            return starts;
        };

        if frag == 0 {
            // Merge forward: drop the boundary after the fragment.
            starts.remove(1);
        } else if frag == starts.len() - 1 {
            starts.remove(frag);
        } else {
            // Interior fragment: merge toward the spatially nearer neighbor.
            let frag_start = starts[frag];
            let frag_end = starts[frag + 1] - 1;
            let prev_last = &stitches[starts[frag] - 1];
            let next_first = &stitches[starts[frag + 1]];
            let to_prev = stitches[frag_start].distance_to(prev_last);
            let to_next = stitches[frag_end].distance_to(next_first);
            if to_prev <= to_next {
                starts.remove(frag);
            } else {
                starts.remove(frag + 1);
            }
        }
    }
}

fn segment_lengths(total: usize, starts: &[usize]) -> Vec<usize> {
    let mut lens = Vec::with_capacity(starts.len());
    for (i, &s) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(total);
        lens.push(end - s);
    }
    lens
}

/// Count of segments meeting the complete-pattern threshold
fn completeness(stitches: &[RawStitch], starts: &[usize], config: &AnalyzeConfig) -> usize {
    segment_lengths(stitches.len(), starts)
        .into_iter()
        .filter(|&l| l >= config.pattern_min_stitch_count)
        .count()
}

fn build_candidates(
    stitches: Vec<RawStitch>,
    starts: &[usize],
    colors: &[ColorEntry],
    confidence: f64,
) -> Vec<PatternCandidate> {
    let mut candidates = Vec::with_capacity(starts.len());
    let mut remaining = stitches;
    // Split back-to-front so each boundary is a single split_off.
    for &start in starts.iter().rev() {
        let tail = remaining.split_off(start);
        candidates.push(PatternCandidate::new(tail, colors.to_vec(), confidence));
    }
    candidates.reverse();
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stitch(x: f64, y: f64, i: usize) -> RawStitch {
        RawStitch::new(x, y, StitchCommand::Normal, i)
    }

    /// Two dense clusters separated by `gap_mm`, `n` stitches each.
    fn two_clusters(n: usize, gap_mm: f64) -> Vec<RawStitch> {
        let mut stitches = Vec::new();
        for i in 0..n {
            stitches.push(stitch((i % 10) as f64, (i / 10) as f64, i));
        }
        for i in 0..n {
            stitches.push(stitch(gap_mm + (i % 10) as f64, (i / 10) as f64, n + i));
        }
        stitches
    }

    #[test]
    fn empty_stream_yields_no_candidates() {
        assert!(segment(Vec::new(), &[], &AnalyzeConfig::default()).is_empty());
    }

    #[test]
    fn single_cluster_is_one_pattern() {
        let cfg = AnalyzeConfig::default();
        let stitches: Vec<_> = (0..100).map(|i| stitch((i % 10) as f64, (i / 10) as f64, i)).collect();
        let patterns = segment(stitches, &[], &cfg);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].stitches.len(), 100);
    }

    #[test]
    fn spatially_separated_clusters_become_two_patterns() {
        let cfg = AnalyzeConfig::default();
        // Gap of 200 mm far exceeds the 50 mm thresholds.
        let stitches = two_clusters(100, 200.0);
        let patterns = segment(stitches, &[], &cfg);
        assert_eq!(patterns.len(), 2);
        for p in &patterns {
            assert!(p.stitches.len() >= cfg.pattern_min_stitch_count);
        }
    }

    #[test]
    fn partition_property_holds() {
        let cfg = AnalyzeConfig::default();
        let stitches = two_clusters(60, 300.0);
        let original = stitches.clone();
        let patterns = segment(stitches, &[], &cfg);
        let reassembled: Vec<RawStitch> = patterns
            .iter()
            .flat_map(|p| p.stitches.iter().copied())
            .collect();
        assert_eq!(reassembled, original);
    }

    #[test]
    fn sequence_indices_increase_within_each_pattern() {
        let cfg = AnalyzeConfig::default();
        let patterns = segment(two_clusters(80, 150.0), &[], &cfg);
        for p in &patterns {
            for pair in p.stitches.windows(2) {
                assert!(pair[0].sequence_index < pair[1].sequence_index);
            }
        }
    }

    #[test]
    fn jump_exactly_at_threshold_merges() {
        let cfg = AnalyzeConfig::default();
        let threshold = cfg.jump_threshold_mm();
        let mut stitches: Vec<_> = (0..50).map(|i| stitch(i as f64 * 0.1, 0.0, i)).collect();
        let last_x = 49.0 * 0.1;
        // Continue exactly threshold away, then cluster there.
        for i in 0..50 {
            stitches.push(stitch(last_x + threshold + i as f64 * 0.0, 0.0, 50 + i));
        }
        let patterns = segment(stitches, &[], &cfg);
        assert_eq!(patterns.len(), 1, "tie at threshold must not split");
    }

    #[test]
    fn end_markers_are_the_fast_path() {
        let cfg = AnalyzeConfig {
            pattern_min_stitch_count: 5,
            ..Default::default()
        };
        let mut stitches = Vec::new();
        for i in 0..30 {
            stitches.push(stitch(i as f64 * 0.1, 0.0, i));
        }
        stitches.push(RawStitch::new(3.0, 0.0, StitchCommand::End, 30));
        // Second pattern occupies the same area: only the marker separates
        // them.
        for i in 0..30 {
            stitches.push(stitch(i as f64 * 0.1, 0.5, 31 + i));
        }
        let patterns = segment(stitches, &[], &cfg);
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].stitches.len(), 31);
        assert_eq!(patterns[1].stitches.len(), 30);
    }

    #[test]
    fn fragments_merge_into_neighbors() {
        let cfg = AnalyzeConfig::default();
        let mut stitches = two_clusters(100, 400.0);
        // A 3-stitch stray far from both clusters must not become a pattern.
        let n = stitches.len();
        for i in 0..3 {
            stitches.push(stitch(1000.0 + i as f64, 1000.0, n + i));
        }
        let patterns = segment(stitches, &[], &cfg);
        assert_eq!(patterns.len(), 2);
        let total: usize = patterns.iter().map(|p| p.stitches.len()).sum();
        assert_eq!(total, n + 3);
    }

    #[test]
    fn colors_are_attached_to_every_candidate() {
        let cfg = AnalyzeConfig::default();
        let colors = vec![ColorEntry::declared(0, (1, 2, 3))];
        let patterns = segment(two_clusters(60, 200.0), &colors, &cfg);
        assert!(patterns.iter().all(|p| p.color_entries == colors));
    }
}
