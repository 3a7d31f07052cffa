//! Core module - data model, configuration and error types

pub mod config;
pub mod error;
pub mod model;

pub use config::{AnalyzeConfig, UnitSystem};
pub use error::{AnalysisError, DecodeError};
pub use model::{
    AggregateMetrics, AnalysisRecord, BoundingBox, ColorEntry, ColorSource, ExtractionSource,
    FormatClassification, FormatFamily, MachineSettings, MetricRange, ParameterKey,
    ParameterValue, PatternCandidate, RawStitch, StitchCommand, TechnicalMetrics,
};
