//! stitchscope: heuristic analysis of embroidery machine files
//!
//! Extracts stitch data, thread colors and machine settings from embroidery
//! file formats: fully decoded where the format is documented (DST, EXP),
//! best-effort heuristic scanning everywhere else (PXF/PMLPXF and unknown
//! binaries). One call, [`analysis::analyze`], takes a byte buffer plus a
//! configuration and returns a complete [`core::model::AnalysisRecord`].

pub mod analysis;
pub mod assemble;
pub mod cli;
pub mod core;
pub mod decode;
pub mod metrics;
pub mod segment;
pub mod sniff;
pub mod strategies;

pub use analysis::{analyze, analyze_with_decoder};
pub use crate::core::config::AnalyzeConfig;
pub use crate::core::error::AnalysisError;
pub use crate::core::model::AnalysisRecord;
