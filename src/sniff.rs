//! Format sniffer
//!
//! Classifies a byte buffer into a format family by inspecting the leading
//! header bytes. Pure function of the header; an unrecognized format is not an
//! error, it just routes the buffer to the generic fallback scanners.

use crate::core::model::{FormatClassification, FormatFamily};

/// How many leading bytes the sniffer inspects
pub const SNIFF_WINDOW: usize = 64;

/// VP3 magic marker
const VP3_MAGIC: &[u8] = b"%vsm%";

/// HUS magic number, little-endian u32
const HUS_MAGIC: u32 = 0x00F0_5B5C;

/// Classify the format family from the first bytes of the buffer.
///
/// Confidence is 1.0 for an exact signature match and degrades for partial or
/// structural matches. `Unknown` with confidence 0.0 means no family was
/// recognized; the caller proceeds to the fallback strategies regardless.
pub fn sniff(bytes: &[u8]) -> FormatClassification {
    if bytes.is_empty() {
        return FormatClassification::unknown();
    }

    // PMLPXF: literal marker, version digits at offset 6.
    if bytes.starts_with(b"PMLPXF") {
        let version = bytes
            .get(6..8)
            .map(|v| String::from_utf8_lossy(v).into_owned());
        return FormatClassification {
            family: FormatFamily::PxfPmlpxf,
            confidence: 1.0,
            header_bytes_consumed: 8,
            version,
        };
    }

    // Bare PXF prefix: the family matched but the variant is unconstrained.
    if bytes.starts_with(b"PXF") {
        return FormatClassification {
            family: FormatFamily::PxfGeneric,
            confidence: 0.9,
            header_bytes_consumed: 3,
            version: None,
        };
    }

    if bytes.starts_with(b"#PES") {
        let version = bytes
            .get(4..8)
            .map(|v| String::from_utf8_lossy(v).into_owned());
        return FormatClassification {
            family: FormatFamily::Pes,
            confidence: 1.0,
            header_bytes_consumed: 8,
            version,
        };
    }

    if bytes.starts_with(VP3_MAGIC) {
        return FormatClassification {
            family: FormatFamily::Vp3,
            confidence: 1.0,
            header_bytes_consumed: VP3_MAGIC.len(),
            version: None,
        };
    }

    if bytes.len() >= 4 {
        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic == HUS_MAGIC {
            return FormatClassification {
                family: FormatFamily::Hus,
                confidence: 1.0,
                header_bytes_consumed: 4,
                version: None,
            };
        }
    }

    // DST: 512-byte text header starting with the label field.
    if bytes.starts_with(b"LA:") {
        let confidence = if looks_like_dst_header(bytes) { 1.0 } else { 0.6 };
        return FormatClassification {
            family: FormatFamily::Dst,
            confidence,
            header_bytes_consumed: bytes.len().min(512),
            version: None,
        };
    }

    // JEF has no magic; its header starts with a little-endian stitch-data
    // offset followed by version digits and an ASCII timestamp at offset 8.
    if looks_like_jef_header(bytes) {
        return FormatClassification {
            family: FormatFamily::Jef,
            confidence: 0.7,
            header_bytes_consumed: 24,
            version: None,
        };
    }

    // XXX: no signature either; the header block is mostly zero padding with
    // a u32 stitch-byte count at offset 0xFC. Structural guess only.
    if looks_like_xxx_header(bytes) {
        return FormatClassification {
            family: FormatFamily::Xxx,
            confidence: 0.5,
            header_bytes_consumed: 0x100,
            version: None,
        };
    }

    // EXP is headerless 2-byte records; only a weak structural guess is
    // possible from the control-byte pattern.
    if looks_like_exp_stream(bytes) {
        return FormatClassification {
            family: FormatFamily::Exp,
            confidence: 0.4,
            header_bytes_consumed: 0,
            version: None,
        };
    }

    FormatClassification::unknown()
}

/// A well-formed DST header carries its stitch-count and color-count fields
/// in the first 512 bytes.
fn looks_like_dst_header(bytes: &[u8]) -> bool {
    if bytes.len() < 512 {
        return false;
    }
    let header = &bytes[..512];
    contains(header, b"ST:") && contains(header, b"CO:")
}

fn looks_like_jef_header(bytes: &[u8]) -> bool {
    if bytes.len() < 24 {
        return false;
    }
    let offset = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    if offset < 24 || offset > bytes.len() {
        return false;
    }
    // Timestamp field: "yyyymmddHHMMSS" in ASCII digits.
    bytes[8..22].iter().all(|b| b.is_ascii_digit())
}

fn looks_like_xxx_header(bytes: &[u8]) -> bool {
    if bytes.len() < 0x100 {
        return false;
    }
    let declared =
        u32::from_le_bytes([bytes[0xFC], bytes[0xFD], bytes[0xFE], bytes[0xFF]]) as usize;
    let zeros = bytes[0x18..0x7C].iter().filter(|&&b| b == 0).count();
    declared > 0 && declared <= bytes.len() && zeros > 80
}

fn looks_like_exp_stream(bytes: &[u8]) -> bool {
    if bytes.len() < 16 || bytes.len() % 2 != 0 {
        return false;
    }
    // Plausible delta stream: mostly small signed bytes, occasional 0x80
    // control prefix.
    let window = &bytes[..bytes.len().min(SNIFF_WINDOW)];
    let small = window
        .iter()
        .filter(|&&b| (b as i8).unsigned_abs() <= 40 || b == 0x80)
        .count();
    small * 10 >= window.len() * 9
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
