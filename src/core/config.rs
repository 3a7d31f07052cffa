//! Analysis configuration
//!
//! Every tunable lives here and is threaded by value into `analyze`; there is
//! no process-wide state, so concurrent calls with different settings cannot
//! leak into each other. The numeric defaults were calibrated against a corpus
//! of sample files and are starting points, not truths.

use serde::{Deserialize, Serialize};

/// Output unit for lengths and dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    #[value(alias = "cm")]
    Centimeters,
    #[value(alias = "mm")]
    Millimeters,
}

impl UnitSystem {
    /// Convert an internal millimetre value into this unit
    pub fn from_mm(&self, mm: f64) -> f64 {
        match self {
            UnitSystem::Centimeters => mm / 10.0,
            UnitSystem::Millimeters => mm,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            UnitSystem::Centimeters => "cm",
            UnitSystem::Millimeters => "mm",
        }
    }
}

/// Tunables for one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzeConfig {
    /// Hard ceiling on the input buffer; the upload layer enforces its own
    /// limit but the engine re-checks defensively.
    pub max_file_size_bytes: usize,

    /// Wall-clock budget shared by all scanning strategies
    pub timeout_seconds: u64,

    /// Cap on coordinate points accepted by the float-pattern scanner
    pub max_coordinate_points: usize,

    /// Cap on stitch records examined by the stride scanner
    pub max_stitch_analysis_points: usize,

    /// Runs shorter than this merge into a neighboring pattern
    pub pattern_min_stitch_count: usize,

    /// Jump longer than this starts a new pattern candidate
    pub pattern_jump_threshold_cm: f64,

    /// Separation beyond a pattern's bounding box that starts a new cluster
    pub pattern_spatial_gap_cm: f64,

    /// Plausibility window for float-scanned coordinates, in 0.1 mm units
    pub float_coordinate_bound: f64,

    pub unit_system: UnitSystem,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 16 * 1024 * 1024,
            timeout_seconds: 120,
            max_coordinate_points: 30_000,
            max_stitch_analysis_points: 50_000,
            pattern_min_stitch_count: 20,
            pattern_jump_threshold_cm: 5.0,
            pattern_spatial_gap_cm: 5.0,
            float_coordinate_bound: 10_000.0,
            unit_system: UnitSystem::default(),
        }
    }
}

impl AnalyzeConfig {
    /// Jump threshold in internal mm
    pub fn jump_threshold_mm(&self) -> f64 {
        self.pattern_jump_threshold_cm * 10.0
    }

    /// Spatial gap in internal mm
    pub fn spatial_gap_mm(&self) -> f64 {
        self.pattern_spatial_gap_cm * 10.0
    }
}
