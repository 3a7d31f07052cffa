//! Melco EXP decoder
//!
//! EXP is a headerless stream of 2-byte records: either a signed delta pair
//! (units of 0.1 mm) or a control pair prefixed with 0x80. Only the common
//! control codes are handled; a stream using vendor extensions is declined as
//! unsupported rather than mis-read.

use crate::core::error::DecodeError;
use crate::core::model::{RawStitch, StitchCommand};

use super::DecodedPattern;

pub fn decode(bytes: &[u8]) -> Result<DecodedPattern, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::corrupt("EXP", "empty stream"));
    }
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::corrupt(
            "EXP",
            "odd byte count, records are 2 bytes",
        ));
    }

    let mut pattern = DecodedPattern::default();
    let mut x = 0i32;
    let mut y = 0i32;
    let mut index = 0usize;
    let mut pos = 0usize;

    while pos + 1 < bytes.len() {
        let (b0, b1) = (bytes[pos], bytes[pos + 1]);
        pos += 2;

        if b0 != 0x80 {
            x += i32::from(b0 as i8);
            y += i32::from(b1 as i8);
            pattern.stitches.push(RawStitch::new(
                f64::from(x) / 10.0,
                f64::from(y) / 10.0,
                StitchCommand::Normal,
                index,
            ));
            index += 1;
            continue;
        }

        match b1 {
            // Jump: the following pair carries the displacement.
            0x04 | 0x80 => {
                if pos + 1 >= bytes.len() {
                    return Err(DecodeError::corrupt("EXP", "jump record at end of stream"));
                }
                x += i32::from(bytes[pos] as i8);
                y += i32::from(bytes[pos + 1] as i8);
                pos += 2;
                pattern.stitches.push(RawStitch::new(
                    f64::from(x) / 10.0,
                    f64::from(y) / 10.0,
                    StitchCommand::Jump,
                    index,
                ));
                index += 1;
            }
            0x01 => {
                pattern.stitches.push(RawStitch::new(
                    f64::from(x) / 10.0,
                    f64::from(y) / 10.0,
                    StitchCommand::ColorChange,
                    index,
                ));
                index += 1;
            }
            0x02 => {
                pattern.stitches.push(RawStitch::new(
                    f64::from(x) / 10.0,
                    f64::from(y) / 10.0,
                    StitchCommand::Stop,
                    index,
                ));
                index += 1;
            }
            other => {
                return Err(DecodeError::unsupported(
                    "EXP",
                    format!("control code 0x{:02X} not handled", other),
                ));
            }
        }
    }

    Ok(pattern)
}
