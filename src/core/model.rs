//! Core data model for one analysis run
//!
//! Everything here is created fresh per analyzed buffer and discarded once the
//! assembler has emitted the final [`AnalysisRecord`]. Nothing is cached across
//! runs.

use std::collections::BTreeMap;

use serde::Serialize;

/// Machine command attached to a stitch record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StitchCommand {
    /// Normal sewing stitch
    Normal,
    /// Non-sewing needle movement
    Jump,
    /// Thread/color change
    ColorChange,
    /// End of pattern
    End,
    /// Thread trim
    Trim,
    /// Machine stop
    Stop,
    /// Command word not recognized by the extractor
    Unknown,
}

impl std::fmt::Display for StitchCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StitchCommand::Normal => write!(f, "normal"),
            StitchCommand::Jump => write!(f, "jump"),
            StitchCommand::ColorChange => write!(f, "color change"),
            StitchCommand::End => write!(f, "end"),
            StitchCommand::Trim => write!(f, "trim"),
            StitchCommand::Stop => write!(f, "stop"),
            StitchCommand::Unknown => write!(f, "unknown"),
        }
    }
}

/// One machine needle operation.
///
/// Coordinates are millimetres in the design's own coordinate frame.
/// `sequence_index` is the position in the original stream and encodes machine
/// execution order; it survives segmentation unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RawStitch {
    pub x: f64,
    pub y: f64,
    pub command: StitchCommand,
    pub sequence_index: usize,
}

impl RawStitch {
    pub fn new(x: f64, y: f64, command: StitchCommand, sequence_index: usize) -> Self {
        Self {
            x,
            y,
            command,
            sequence_index,
        }
    }

    /// Euclidean distance to another stitch, in mm
    pub fn distance_to(&self, other: &RawStitch) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Where a color entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorSource {
    /// Read from a declared color table in the file
    Declared,
    /// Guessed from surrounding content (text vocabulary, RGB-looking bytes)
    Inferred,
}

/// One entry of a pattern's thread palette
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorEntry {
    pub index: usize,
    /// RGB triple when recoverable, absent for placeholder entries
    pub rgb: Option<(u8, u8, u8)>,
    pub source: ColorSource,
}

impl ColorEntry {
    pub fn declared(index: usize, rgb: (u8, u8, u8)) -> Self {
        Self {
            index,
            rgb: Some(rgb),
            source: ColorSource::Declared,
        }
    }

    pub fn inferred(index: usize, rgb: Option<(u8, u8, u8)>) -> Self {
        Self {
            index,
            rgb,
            source: ColorSource::Inferred,
        }
    }

    /// Hex string like `#1A2B3C`, when an RGB value is present
    pub fn hex(&self) -> Option<String> {
        self.rgb
            .map(|(r, g, b)| format!("#{:02X}{:02X}{:02X}", r, g, b))
    }
}

/// Tight axis-aligned enclosure of a set of stitch coordinates, in mm
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Compute the tight enclosure of the given stitches.
    ///
    /// Returns `None` for an empty slice; a bounding box of nothing is not a
    /// meaningful value.
    pub fn of(stitches: &[RawStitch]) -> Option<Self> {
        let first = stitches.first()?;
        let mut bbox = BoundingBox {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for s in &stitches[1..] {
            bbox.expand(s.x, s.y);
        }
        Some(bbox)
    }

    pub fn expand(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Width in mm
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height in mm
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Area in cm²
    pub fn area_cm2(&self) -> f64 {
        (self.width() / 10.0) * (self.height() / 10.0)
    }

    /// Shortest distance from a point to this box, in mm (0 when inside)
    pub fn distance_to_point(&self, x: f64, y: f64) -> f64 {
        let dx = (self.min_x - x).max(0.0).max(x - self.max_x);
        let dy = (self.min_y - y).max(0.0).max(y - self.max_y);
        (dx * dx + dy * dy).sqrt()
    }
}

/// One segmented embroidery pattern, owned by the segmenter until metrics run
#[derive(Debug, Clone, Serialize)]
pub struct PatternCandidate {
    pub stitches: Vec<RawStitch>,
    pub bounding_box: Option<BoundingBox>,
    pub color_entries: Vec<ColorEntry>,
    /// Self-assessed trust in this segmentation, in [0, 1]
    pub confidence: f64,
}

impl PatternCandidate {
    pub fn new(stitches: Vec<RawStitch>, color_entries: Vec<ColorEntry>, confidence: f64) -> Self {
        let bounding_box = BoundingBox::of(&stitches);
        Self {
            stitches,
            bounding_box,
            color_entries,
            confidence,
        }
    }
}

/// Format family recognized by the sniffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatFamily {
    /// Tajima PMLPXF container (PXF family, literal header marker)
    PxfPmlpxf,
    /// Other PXF variants
    PxfGeneric,
    Dst,
    Pes,
    Jef,
    Exp,
    Vp3,
    Hus,
    Xxx,
    Unknown,
}

impl FormatFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatFamily::PxfPmlpxf => "PMLPXF",
            FormatFamily::PxfGeneric => "PXF",
            FormatFamily::Dst => "DST",
            FormatFamily::Pes => "PES",
            FormatFamily::Jef => "JEF",
            FormatFamily::Exp => "EXP",
            FormatFamily::Vp3 => "VP3",
            FormatFamily::Hus => "HUS",
            FormatFamily::Xxx => "XXX",
            FormatFamily::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FormatFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of header inspection
#[derive(Debug, Clone, Serialize)]
pub struct FormatClassification {
    pub family: FormatFamily,
    /// 1.0 for an exact signature match, 0.0 when nothing matched
    pub confidence: f64,
    pub header_bytes_consumed: usize,
    /// Format version token when the header declares one (e.g. PMLPXF "01")
    pub version: Option<String>,
}

impl FormatClassification {
    pub fn unknown() -> Self {
        Self {
            family: FormatFamily::Unknown,
            confidence: 0.0,
            header_bytes_consumed: 0,
            version: None,
        }
    }
}

/// Derived technical specification for one pattern (or an aggregate)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TechnicalMetrics {
    /// Normal sewing stitches only; jumps and control commands tallied apart
    pub stitch_count: usize,
    pub jump_count: usize,
    pub color_change_count: usize,
    pub trim_count: usize,
    /// Stitches per cm² of bounding-box area
    pub density_per_cm2: f64,
    pub estimated_time_seconds: f64,
    pub thread_consumption_cm: f64,
    /// Average sewn segment length in mm
    pub average_stitch_length_mm: f64,
    /// Longest single jump in mm
    pub max_jump_distance_mm: f64,
    /// 1 − jumps/total, higher is better
    pub thread_efficiency: f64,
    /// Composite score in [0, 1]
    pub complexity_score: f64,
}

/// Min-max spread of a metric across several patterns
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricRange {
    pub min: f64,
    pub max: f64,
}

impl MetricRange {
    pub fn of(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut iter = values.into_iter();
        let first = iter.next()?;
        let mut range = MetricRange {
            min: first,
            max: first,
        };
        for v in iter {
            range.min = range.min.min(v);
            range.max = range.max.max(v);
        }
        Some(range)
    }

    pub fn is_spread(&self) -> bool {
        self.max > self.min
    }
}

/// Combined totals plus per-pattern spreads.
///
/// When several patterns with differing characteristics share one file, a
/// single averaged number would be misleading; the ranges keep the spread
/// visible.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateMetrics {
    pub totals: TechnicalMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density_range: Option<MetricRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stitch_count_range: Option<MetricRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<MetricRange>,
}

/// Externally stable machine-parameter key.
///
/// The string forms are a published contract consumed by the presentation
/// layer; renaming any of them is a breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKey {
    RowSpacing,
    FillAngle,
    AutoUnderlay,
    MachineSpeed,
    ThreadTension,
    HoopDimensions,
    PullCompensation,
    StitchLength,
    UnderlayType,
    StitchTypes,
    NeedleCount,
    NeedleSize,
    ThreadWeight,
    FabricType,
    StabilizerType,
    Software,
    SoftwareVersion,
}

impl ParameterKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterKey::RowSpacing => "row_spacing",
            ParameterKey::FillAngle => "fill_angle",
            ParameterKey::AutoUnderlay => "auto_underlay",
            ParameterKey::MachineSpeed => "machine_speed",
            ParameterKey::ThreadTension => "thread_tension",
            ParameterKey::HoopDimensions => "hoop_dimensions",
            ParameterKey::PullCompensation => "pull_compensation",
            ParameterKey::StitchLength => "stitch_length",
            ParameterKey::UnderlayType => "underlay_type",
            ParameterKey::StitchTypes => "stitch_types",
            ParameterKey::NeedleCount => "needle_count",
            ParameterKey::NeedleSize => "needle_size",
            ParameterKey::ThreadWeight => "thread_weight",
            ParameterKey::FabricType => "fabric_type",
            ParameterKey::StabilizerType => "stabilizer_type",
            ParameterKey::Software => "software",
            ParameterKey::SoftwareVersion => "software_version",
        }
    }
}

impl std::fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed machine-parameter value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterValue {
    Number(f64),
    Integer(i64),
    Text(String),
    Toggle(bool),
    /// Distinct values were found across the file, most likely one per
    /// embedded pattern
    Range { min: f64, max: f64 },
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterValue::Number(v) => write!(f, "{:.2}", v),
            ParameterValue::Integer(v) => write!(f, "{}", v),
            ParameterValue::Text(v) => write!(f, "{}", v),
            ParameterValue::Toggle(v) => write!(f, "{}", if *v { "on" } else { "off" }),
            ParameterValue::Range { min, max } => write!(f, "{:.2} – {:.2}", min, max),
        }
    }
}

/// Bounded mapping of recognized machine parameters, with an explicit
/// side-channel for tokens the extractor saw but does not understand.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MachineSettings {
    pub known: BTreeMap<ParameterKey, ParameterValue>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, ParameterValue>,
}

impl MachineSettings {
    pub fn is_empty(&self) -> bool {
        self.known.is_empty() && self.extras.is_empty()
    }

    pub fn set(&mut self, key: ParameterKey, value: ParameterValue) {
        self.known.insert(key, value);
    }

    pub fn set_extra(&mut self, key: impl Into<String>, value: ParameterValue) {
        self.extras.insert(key.into(), value);
    }

    pub fn get(&self, key: ParameterKey) -> Option<&ParameterValue> {
        self.known.get(&key)
    }

    /// Insert a numeric observation, collapsing repeated distinct values for
    /// the same key into a min-max range.
    pub fn observe_number(&mut self, key: ParameterKey, value: f64) {
        let merged = match self.known.get(&key) {
            Some(ParameterValue::Number(prev)) if (prev - value).abs() > f64::EPSILON => {
                ParameterValue::Range {
                    min: prev.min(value),
                    max: prev.max(value),
                }
            }
            Some(ParameterValue::Range { min, max }) => ParameterValue::Range {
                min: min.min(value),
                max: max.max(value),
            },
            Some(other) => other.clone(),
            None => ParameterValue::Number(value),
        };
        self.known.insert(key, merged);
    }

    /// Merge another settings block in, keeping existing entries on conflict.
    pub fn absorb(&mut self, other: MachineSettings) {
        for (k, v) in other.known {
            self.known.entry(k).or_insert(v);
        }
        for (k, v) in other.extras {
            self.extras.entry(k).or_insert(v);
        }
    }
}

/// Which extraction path produced the stitch stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    /// Full-fidelity decoder for a well-specified format
    TrustedDecoder,
    /// Named fallback strategy
    Fallback(String),
    /// Nothing usable was extracted
    None,
}

/// Final, immutable result of one analysis run
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRecord {
    pub classification: FormatClassification,
    pub source: ExtractionSource,
    /// Overall confidence in the stitch extraction, in [0, 1]
    pub extraction_confidence: f64,
    pub patterns: Vec<PatternCandidate>,
    /// Pattern index → metrics, parallel to `patterns`
    pub metrics: Vec<TechnicalMetrics>,
    pub aggregate_metrics: AggregateMetrics,
    pub machine_settings: MachineSettings,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_is_tight() {
        let stitches = vec![
            RawStitch::new(-3.0, 2.0, StitchCommand::Normal, 0),
            RawStitch::new(5.0, -1.0, StitchCommand::Normal, 1),
            RawStitch::new(0.0, 7.5, StitchCommand::Jump, 2),
        ];
        let bbox = BoundingBox::of(&stitches).unwrap();
        assert_eq!(bbox.min_x, -3.0);
        assert_eq!(bbox.max_x, 5.0);
        assert_eq!(bbox.min_y, -1.0);
        assert_eq!(bbox.max_y, 7.5);
        assert!((bbox.width() - 8.0).abs() < 1e-12);
        assert!((bbox.height() - 8.5).abs() < 1e-12);
    }

    #[test]
    fn bounding_box_of_empty_is_none() {
        assert!(BoundingBox::of(&[]).is_none());
    }

    #[test]
    fn bounding_box_point_distance() {
        let bbox = BoundingBox {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 10.0,
            max_y: 10.0,
        };
        assert_eq!(bbox.distance_to_point(5.0, 5.0), 0.0);
        assert_eq!(bbox.distance_to_point(13.0, 14.0), 5.0);
    }

    #[test]
    fn observe_number_collapses_to_range() {
        let mut settings = MachineSettings::default();
        settings.observe_number(ParameterKey::FillAngle, 45.0);
        assert_eq!(
            settings.get(ParameterKey::FillAngle),
            Some(&ParameterValue::Number(45.0))
        );

        settings.observe_number(ParameterKey::FillAngle, 90.0);
        assert_eq!(
            settings.get(ParameterKey::FillAngle),
            Some(&ParameterValue::Range {
                min: 45.0,
                max: 90.0
            })
        );

        settings.observe_number(ParameterKey::FillAngle, 30.0);
        assert_eq!(
            settings.get(ParameterKey::FillAngle),
            Some(&ParameterValue::Range {
                min: 30.0,
                max: 90.0
            })
        );
    }

    #[test]
    fn parameter_keys_are_stable() {
        // External naming contract; see the interface documentation.
        assert_eq!(ParameterKey::RowSpacing.as_str(), "row_spacing");
        assert_eq!(ParameterKey::FillAngle.as_str(), "fill_angle");
        assert_eq!(ParameterKey::AutoUnderlay.as_str(), "auto_underlay");
        assert_eq!(ParameterKey::MachineSpeed.as_str(), "machine_speed");
        assert_eq!(ParameterKey::ThreadTension.as_str(), "thread_tension");
        assert_eq!(ParameterKey::HoopDimensions.as_str(), "hoop_dimensions");
    }

    #[test]
    fn color_entry_hex() {
        let c = ColorEntry::declared(0, (26, 43, 60));
        assert_eq!(c.hex().unwrap(), "#1A2B3C");
        let unknown = ColorEntry::inferred(1, None);
        assert!(unknown.hex().is_none());
    }

    #[test]
    fn metric_range_spread() {
        let r = MetricRange::of([3.0, 1.0, 2.0]).unwrap();
        assert_eq!(r.min, 1.0);
        assert_eq!(r.max, 3.0);
        assert!(r.is_spread());
        assert!(!MetricRange::of([2.0, 2.0]).unwrap().is_spread());
        assert!(MetricRange::of(std::iter::empty()).is_none());
    }
}
