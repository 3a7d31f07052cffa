//! Shared test helpers for integration tests
//!
//! Byte-level builders for synthetic embroidery files plus a command helper.

#![allow(dead_code)]

use assert_cmd::cargo;
use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper to get a stitchscope command
pub fn stitchscope() -> Command {
    Command::new(cargo::cargo_bin!("stitchscope"))
}

/// Write bytes into a temp dir and return the file path.
pub fn write_file(tmp: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = tmp.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Encode one DST record carrying the given decoded deltas (0.1 mm units).
/// Control: 0x00 stitch, 0x80 jump, 0xC0 color change, 0xF0 end.
pub fn dst_record(dx: i32, dy: i32, control: u8) -> [u8; 3] {
    let mut b = [0u8, 0u8, control | 0b0000_0011];

    let x_slots: [(i32, (usize, u8), (usize, u8)); 5] = [
        (81, (2, 2), (2, 3)),
        (27, (1, 2), (1, 3)),
        (9, (0, 2), (0, 3)),
        (3, (1, 0), (1, 1)),
        (1, (0, 0), (0, 1)),
    ];
    let y_slots: [(i32, (usize, u8), (usize, u8)); 5] = [
        (81, (2, 5), (2, 4)),
        (27, (1, 5), (1, 4)),
        (9, (0, 5), (0, 4)),
        (3, (1, 7), (1, 6)),
        (1, (0, 7), (0, 6)),
    ];

    let mut encode_axis = |mut d: i32, slots: &[(i32, (usize, u8), (usize, u8)); 5]| {
        for &(mag, plus, minus) in slots {
            if d >= (mag + 1) / 2 {
                b[plus.0] |= 1 << plus.1;
                d -= mag;
            } else if d <= -((mag + 1) / 2) {
                b[minus.0] |= 1 << minus.1;
                d += mag;
            }
        }
        assert_eq!(d, 0, "delta out of single-record range");
    };
    encode_axis(dx, &x_slots);
    // The on-disk y axis is stored negated.
    encode_axis(-dy, &y_slots);
    b
}

/// Build a complete minimal DST file from (dx, dy, control) records.
pub fn dst_file(stitch_count: usize, color_count: usize, records: &[(i32, i32, u8)]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(512 + records.len() * 3);
    buf.extend_from_slice(b"LA:testpattern     \r");
    buf.extend_from_slice(format!("ST:{:07}\r", stitch_count).as_bytes());
    buf.extend_from_slice(format!("CO:{:03}\r", color_count).as_bytes());
    buf.extend_from_slice(b"+X:00010\r-X:00010\r+Y:00010\r-Y:00010\r");
    buf.push(0x1A);
    buf.resize(512, b' ');
    for &(dx, dy, control) in records {
        buf.extend_from_slice(&dst_record(dx, dy, control));
    }
    buf
}

/// Minimal 64-byte PMLPXF header with declared counts and dimensions.
pub fn pmlpxf_header(color_count: u32, stitch_count: u32, width_mm: f64, height_mm: f64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(b"PMLPXF01");
    buf.extend_from_slice(&64u32.to_le_bytes()); // header size
    buf.extend_from_slice(&0u32.to_le_bytes()); // data size
    buf.extend_from_slice(&((width_mm * 100.0) as u32).to_le_bytes());
    buf.extend_from_slice(&((height_mm * 100.0) as u32).to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes()); // x offset
    buf.extend_from_slice(&0u32.to_le_bytes()); // y offset
    buf.extend_from_slice(&color_count.to_le_bytes());
    buf.extend_from_slice(&stitch_count.to_le_bytes());
    buf.extend_from_slice(&0x01u32.to_le_bytes()); // flags: underlay
    buf.resize(64, 0);
    buf
}

/// Append a `CLRS` color table.
pub fn pmlpxf_colors(buf: &mut Vec<u8>, colors: &[(u8, u8, u8)]) {
    buf.extend_from_slice(b"CLRS");
    buf.extend_from_slice(&(colors.len() as u32).to_le_bytes());
    for &(r, g, b) in colors {
        let packed = (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b);
        buf.extend_from_slice(&packed.to_le_bytes());
    }
}

/// Append a `STCH` stitch block of 6-byte `i16 x, i16 y, u16 cmd` records.
pub fn pmlpxf_stitches(buf: &mut Vec<u8>, records: &[(i16, i16, u16)]) {
    buf.extend_from_slice(b"STCH");
    buf.extend_from_slice(&(records.len() as u32).to_le_bytes());
    for &(x, y, cmd) in records {
        buf.extend_from_slice(&x.to_le_bytes());
        buf.extend_from_slice(&y.to_le_bytes());
        buf.extend_from_slice(&cmd.to_le_bytes());
    }
}
