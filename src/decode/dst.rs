//! Tajima DST decoder
//!
//! DST is fully documented: a 512-byte ASCII label header followed by 3-byte
//! stitch records in a ternary delta encoding (units of 0.1 mm). The header
//! carries declared stitch/color counts which are surfaced into the machine
//! settings for cross-checking.

use crate::core::error::DecodeError;
use crate::core::model::{
    ColorEntry, ColorSource, ParameterValue, RawStitch, StitchCommand,
};

use super::DecodedPattern;

/// Fixed DST header length
pub const HEADER_LEN: usize = 512;

pub fn decode(bytes: &[u8]) -> Result<DecodedPattern, DecodeError> {
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::corrupt(
            "DST",
            format!("{} bytes is shorter than the 512-byte header", bytes.len()),
        ));
    }
    let header = &bytes[..HEADER_LEN];
    if !header.starts_with(b"LA:") {
        return Err(DecodeError::unsupported(
            "DST",
            "header does not start with the LA: label field",
        ));
    }

    let mut pattern = DecodedPattern::default();

    if let Some(label) = header_field(header, b"LA:", 16) {
        let label = label.trim();
        if !label.is_empty() {
            pattern
                .settings
                .set_extra("label", ParameterValue::Text(label.to_string()));
        }
    }
    let declared_stitches = header_field(header, b"ST:", 7).and_then(|v| v.trim().parse().ok());
    if let Some(n) = declared_stitches {
        pattern
            .settings
            .set_extra("declared_stitch_count", ParameterValue::Integer(n));
    }
    let declared_colors: Option<i64> =
        header_field(header, b"CO:", 3).and_then(|v| v.trim().parse().ok());

    let mut x = 0i32;
    let mut y = 0i32;
    let mut bad_records = 0usize;
    let mut ended = false;

    for (i, record) in bytes[HEADER_LEN..].chunks_exact(3).enumerate() {
        let (b0, b1, b2) = (record[0], record[1], record[2]);

        // Bits 0 and 1 of the control byte are always set in valid records.
        if b2 & 0b0000_0011 != 0b0000_0011 {
            bad_records += 1;
            continue;
        }

        x += decode_dx(b0, b1, b2);
        y += decode_dy(b0, b1, b2);

        let command = if b2 == 0b1111_0011 {
            ended = true;
            StitchCommand::End
        } else {
            match b2 & 0b1100_0011 {
                0b1100_0011 => StitchCommand::ColorChange,
                0b1000_0011 => StitchCommand::Jump,
                // Sequin mode toggle; the movement is kept, the record is not
                // a sewing stitch.
                0b0100_0011 => StitchCommand::Unknown,
                _ => StitchCommand::Normal,
            }
        };

        pattern.stitches.push(RawStitch::new(
            f64::from(x) / 10.0,
            f64::from(y) / 10.0,
            command,
            i,
        ));
        if ended {
            break;
        }
    }

    // A handful of damaged records is survivable; a stream that is mostly
    // invalid is not a DST stitch block.
    if bad_records > pattern.stitches.len() {
        return Err(DecodeError::corrupt(
            "DST",
            format!("{} invalid records in stitch block", bad_records),
        ));
    }

    if let Some(count) = declared_colors {
        for index in 0..count.max(0) as usize {
            // DST declares thread stops, not RGB values.
            pattern.colors.push(ColorEntry {
                index,
                rgb: None,
                source: ColorSource::Declared,
            });
        }
    }

    Ok(pattern)
}

/// Pull a fixed-width ASCII header field following its 3-byte tag.
fn header_field(header: &[u8], tag: &[u8], width: usize) -> Option<String> {
    let pos = header.windows(tag.len()).position(|w| w == tag)?;
    let start = pos + tag.len();
    let end = (start + width).min(header.len());
    let raw = &header[start..end];
    // Fields are CR-terminated inside their fixed width.
    let cut = raw.iter().position(|&b| b == b'\r').unwrap_or(raw.len());
    Some(String::from_utf8_lossy(&raw[..cut]).into_owned())
}

fn bit(b: u8, pos: u8) -> i32 {
    i32::from((b >> pos) & 1)
}

fn decode_dx(b0: u8, b1: u8, b2: u8) -> i32 {
    let mut x = 0;
    x += bit(b2, 2) * 81;
    x -= bit(b2, 3) * 81;
    x += bit(b1, 2) * 27;
    x -= bit(b1, 3) * 27;
    x += bit(b0, 2) * 9;
    x -= bit(b0, 3) * 9;
    x += bit(b1, 0) * 3;
    x -= bit(b1, 1) * 3;
    x += bit(b0, 0);
    x -= bit(b0, 1);
    x
}

fn decode_dy(b0: u8, b1: u8, b2: u8) -> i32 {
    let mut y = 0;
    y += bit(b2, 5) * 81;
    y -= bit(b2, 4) * 81;
    y += bit(b1, 5) * 27;
    y -= bit(b1, 4) * 27;
    y += bit(b0, 5) * 9;
    y -= bit(b0, 4) * 9;
    y += bit(b1, 7) * 3;
    y -= bit(b1, 6) * 3;
    y += bit(b0, 7);
    y -= bit(b0, 6);
    y
}


#[cfg(test)]
mod tests {
    use super::test_support::{build_file, encode_record};
    use super::*;
    use crate::core::model::StitchCommand;

    #[test]
    fn record_codec_roundtrips() {
        // The encoder mirrors decode_dx/decode_dy; check representative deltas.
        for &(dx, dy) in &[
            (0, 0),
            (1, -1),
            (2, -2),
            (9, 3),
            (-27, 81),
            (121, -121),
            (40, 13),
        ] {
            let [b0, b1, b2] = encode_record(dx, dy, 0x00);
            assert_eq!(decode_dx(b0, b1, b2), dx, "dx for ({dx},{dy})");
            assert_eq!(decode_dy(b0, b1, b2), dy, "dy for ({dx},{dy})");
        }
    }

    #[test]
    fn decodes_minimal_file() {
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
        let pattern = decode(&bytes).unwrap();
        assert_eq!(pattern.stitches.len(), 5);
        let normals = pattern
            .stitches
            .iter()
            .filter(|s| s.command == StitchCommand::Normal)
            .count();
        assert_eq!(normals, 3);
        assert_eq!(pattern.stitches[3].command, StitchCommand::ColorChange);
        assert_eq!(pattern.stitches[4].command, StitchCommand::End);
        assert_eq!(pattern.colors.len(), 1);

        // 0.1 mm units accumulate: 10 + 10 = 20 units = 2.0 mm.
        assert!((pattern.stitches[1].x - 2.0).abs() < 1e-9);
    }

    #[test]
    fn sequence_indices_are_strictly_increasing() {
        let bytes = build_file(4, 0, &[(1, 1, 0x00); 4]);
        let pattern = decode(&bytes).unwrap();
        for pair in pattern.stitches.windows(2) {
            assert!(pair[0].sequence_index < pair[1].sequence_index);
        }
    }

    #[test]
    fn truncated_header_is_corrupt() {
        let err = decode(b"LA:too short").unwrap_err();
        assert!(matches!(err, DecodeError::Corrupt { .. }));
    }

    #[test]
    fn foreign_header_is_unsupported() {
        let mut bytes = vec![b'X'; 600];
        bytes[0] = b'Q';
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::Unsupported { .. }));
    }
}
