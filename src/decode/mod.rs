//! Trusted decoder adapter
//!
//! Well-specified formats go through a full-fidelity decoder instead of the
//! heuristic scanners. The [`TrustedDecoder`] trait is the seam: the built-in
//! implementation covers DST completely and EXP minimally, and declines every
//! other family so an external embroidery library can be plugged in by the
//! caller. A declined or corrupt decode never aborts the pipeline; the engine
//! demotes to the fallback chain.

pub mod dst;
pub mod exp;

use crate::core::error::DecodeError;
use crate::core::model::{ColorEntry, FormatFamily, MachineSettings, RawStitch};

/// Normalized output of a full-fidelity decode
#[derive(Debug, Clone, Default)]
pub struct DecodedPattern {
    /// Stitches in machine order, coordinates in mm
    pub stitches: Vec<RawStitch>,
    /// Declared color table (RGB may be absent for formats without one)
    pub colors: Vec<ColorEntry>,
    /// Header-declared parameters (label, declared counts, …)
    pub settings: MachineSettings,
}

/// A fully-conformant decoder for some subset of the format families.
pub trait TrustedDecoder {
    /// Whether this decoder claims the family at all. A `false` here skips
    /// straight to the fallback chain without a warning.
    fn supports(&self, family: FormatFamily) -> bool;

    /// Decode the buffer as the given family.
    ///
    /// `Unsupported` means the family matched but this file's variant did
    /// not; `Corrupt` means the payload is structurally invalid. Both demote
    /// to the fallback chain.
    fn decode(&self, bytes: &[u8], family: FormatFamily) -> Result<DecodedPattern, DecodeError>;
}

/// Built-in decoder: DST in full, EXP minimally.
#[derive(Debug, Default)]
pub struct BuiltinDecoder;

impl TrustedDecoder for BuiltinDecoder {
    fn supports(&self, family: FormatFamily) -> bool {
        matches!(family, FormatFamily::Dst | FormatFamily::Exp)
    }

    fn decode(&self, bytes: &[u8], family: FormatFamily) -> Result<DecodedPattern, DecodeError> {
        match family {
            FormatFamily::Dst => dst::decode(bytes),
            FormatFamily::Exp => exp::decode(bytes),
            other => Err(DecodeError::unsupported(
                other.as_str(),
                "no built-in decoder for this family",
            )),
        }
    }
}
