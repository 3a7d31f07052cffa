//! PMLPXF section-structure scanner
//!
//! Specific to the Tajima PMLPXF container: parses the fixed header block
//! (sizes, design dimensions, declared counts, format flags), then walks the
//! marker-tagged sections: color table, stitch block, machine settings and
//! the extended parameter markers. Every declared offset and length is checked
//! against the buffer bounds and a sanity ceiling before it is trusted; a
//! section table that does not hold together is ignored rather than guessed
//! at.

use crate::core::config::AnalyzeConfig;
use crate::core::model::{
    ColorEntry, ParameterKey, ParameterValue, RawStitch, StitchCommand,
};

use super::{ExtractionStrategy, ScanBudget, StrategyOutcome};

/// Sanity ceiling on a declared color-table size
const MAX_COLORS: u32 = 256;

/// Sanity ceiling on a declared stitch count
const MAX_STITCHES: u32 = 1_000_000;

/// End-of-pattern command words in PXF stitch blocks
const END_COMMANDS: [u16; 4] = [0x8003, 0x8013, 0x8023, 0x8033];

fn le_u32(bytes: &[u8], pos: usize) -> Option<u32> {
    let b = bytes.get(pos..pos + 4)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn le_f32(bytes: &[u8], pos: usize) -> Option<f32> {
    let b = bytes.get(pos..pos + 4)?;
    Some(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn le_i16(bytes: &[u8], pos: usize) -> Option<i16> {
    let b = bytes.get(pos..pos + 2)?;
    Some(i16::from_le_bytes([b[0], b[1]]))
}

fn le_u16(bytes: &[u8], pos: usize) -> Option<u16> {
    let b = bytes.get(pos..pos + 2)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return Vec::new();
    }
    haystack
        .windows(needle.len())
        .enumerate()
        .filter_map(|(i, w)| (w == needle).then_some(i))
        .collect()
}

fn map_command(cmd: u16) -> StitchCommand {
    if END_COMMANDS.contains(&cmd) {
        return StitchCommand::End;
    }
    match cmd {
        0x0000 => StitchCommand::Normal,
        0x0001..=0x0003 => StitchCommand::Jump,
        _ => StitchCommand::Unknown,
    }
}

pub struct PmlpxfSectionScanner;

impl PmlpxfSectionScanner {
    fn parse_header(bytes: &[u8], outcome: &mut StrategyOutcome) -> bool {
        if bytes.len() < 64 || !bytes.starts_with(b"PMLPXF") {
            return false;
        }

        // Header size and payload size live right after the signature; both
        // must stay within the file to be believed.
        let header_size = le_u32(bytes, 8).unwrap_or(0) as usize;
        let data_size = le_u32(bytes, 12).unwrap_or(0) as usize;
        if header_size > bytes.len() || data_size > bytes.len() {
            outcome
                .warnings
                .push("PMLPXF header declares sizes beyond the file end".into());
        }

        // Design dimensions at offset 16, hundredths of mm.
        if let (Some(w), Some(h)) = (le_u32(bytes, 16), le_u32(bytes, 20)) {
            let width_mm = f64::from(w) / 100.0;
            let height_mm = f64::from(h) / 100.0;
            if width_mm > 0.0 && width_mm < 5_000.0 && height_mm > 0.0 && height_mm < 5_000.0 {
                outcome
                    .settings
                    .set_extra("design_width", ParameterValue::Number(width_mm));
                outcome
                    .settings
                    .set_extra("design_height", ParameterValue::Number(height_mm));
            }
        }

        if let Some(colors) = le_u32(bytes, 32) {
            if (1..=MAX_COLORS).contains(&colors) {
                outcome
                    .settings
                    .set_extra("declared_color_count", ParameterValue::Integer(colors.into()));
            }
        }
        if let Some(stitches) = le_u32(bytes, 36) {
            if (1..=MAX_STITCHES).contains(&stitches) {
                outcome.settings.set_extra(
                    "declared_stitch_count",
                    ParameterValue::Integer(stitches.into()),
                );
            }
        }
        if let Some(flags) = le_u32(bytes, 40) {
            outcome
                .settings
                .set_extra("has_underlay", ParameterValue::Toggle(flags & 0x01 != 0));
            outcome
                .settings
                .set_extra("has_applique", ParameterValue::Toggle(flags & 0x02 != 0));
            outcome
                .settings
                .set_extra("has_sequins", ParameterValue::Toggle(flags & 0x04 != 0));
        }
        true
    }

    /// `CLRS`/`COLR` marker, u32 count, then one packed RGB u32 per entry.
    fn parse_color_section(bytes: &[u8], outcome: &mut StrategyOutcome) -> bool {
        for marker in [b"CLRS".as_slice(), b"COLR".as_slice()] {
            for pos in find_all(bytes, marker) {
                let Some(count) = le_u32(bytes, pos + 4) else {
                    continue;
                };
                if !(1..=MAX_COLORS).contains(&count) {
                    continue;
                }
                let table_end = pos + 8 + count as usize * 4;
                if table_end > bytes.len() {
                    // Declared length runs past the buffer: not a real table.
                    continue;
                }
                let mut colors = Vec::with_capacity(count as usize);
                for j in 0..count as usize {
                    let raw = le_u32(bytes, pos + 8 + j * 4).unwrap_or(0);
                    let rgb = (
                        ((raw >> 16) & 0xFF) as u8,
                        ((raw >> 8) & 0xFF) as u8,
                        (raw & 0xFF) as u8,
                    );
                    colors.push(ColorEntry::declared(j, rgb));
                }
                outcome.colors = colors;
                return true;
            }
        }
        false
    }

    /// `STCH` marker, u32 count, then 6-byte `i16 x, i16 y, u16 cmd` records.
    fn parse_stitch_section(
        bytes: &[u8],
        budget: &mut ScanBudget,
        outcome: &mut StrategyOutcome,
    ) -> bool {
        for pos in find_all(bytes, b"STCH") {
            let Some(count) = le_u32(bytes, pos + 4) else {
                continue;
            };
            if !(1..=MAX_STITCHES).contains(&count) {
                continue;
            }
            let data_start = pos + 8;
            if data_start >= bytes.len() {
                continue;
            }
            let available = (bytes.len() - data_start) / 6;
            let take = (count as usize).min(available);
            if take == 0 {
                continue;
            }

            let mut stitches = Vec::with_capacity(take.min(4096));
            let mut rejected = 0usize;
            for j in 0..take {
                if !budget.keep_scanning() || !budget.try_point() {
                    break;
                }
                let at = data_start + j * 6;
                let (Some(x), Some(y), Some(cmd)) =
                    (le_i16(bytes, at), le_i16(bytes, at + 2), le_u16(bytes, at + 4))
                else {
                    break;
                };
                if x.unsigned_abs() >= 32_000 || y.unsigned_abs() >= 32_000 {
                    rejected += 1;
                    continue;
                }
                let command = map_command(cmd);
                stitches.push(RawStitch::new(
                    f64::from(x) / 10.0,
                    f64::from(y) / 10.0,
                    command,
                    stitches.len(),
                ));
                if command == StitchCommand::End {
                    break;
                }
            }

            // A section whose records are mostly implausible was a false
            // marker hit.
            if stitches.len() > rejected && stitches.len() >= 4 {
                outcome.stitches = stitches;
                return true;
            }
        }
        false
    }

    /// Machine-setting markers with a u32 value directly after the tag.
    fn parse_machine_settings(bytes: &[u8], outcome: &mut StrategyOutcome) -> usize {
        let mut found = 0usize;
        for (marker, key, lo, hi) in [
            (b"SPEED".as_slice(), ParameterKey::MachineSpeed, 100u32, 2_000u32),
            (b"TENSION".as_slice(), ParameterKey::ThreadTension, 1, 100),
            (b"HOOP".as_slice(), ParameterKey::HoopDimensions, 50, 500),
            (b"NEEDLE".as_slice(), ParameterKey::NeedleCount, 1, 15),
        ] {
            for pos in find_all(bytes, marker) {
                let Some(value) = le_u32(bytes, pos + marker.len()) else {
                    continue;
                };
                if (lo..=hi).contains(&value) {
                    match key {
                        // Hoop size arrives in mm and stays mm internally.
                        ParameterKey::HoopDimensions => {
                            outcome.settings.observe_number(key, f64::from(value));
                        }
                        ParameterKey::NeedleCount => {
                            outcome
                                .settings
                                .set(key, ParameterValue::Integer(value.into()));
                        }
                        _ => outcome.settings.observe_number(key, f64::from(value)),
                    }
                    found += 1;
                    break;
                }
            }
        }
        found
    }

    /// Extended parameter markers with an f32/u32 payload 8 bytes past the
    /// marker start, each range-validated. Distinct repeated values collapse
    /// into min-max ranges (several patterns in one file).
    fn parse_extended_parameters(bytes: &[u8], outcome: &mut StrategyOutcome) -> usize {
        let mut found = 0usize;

        let mut observe_f32 = |marker: &[u8], key: ParameterKey, lo: f64, hi: f64, found: &mut usize| {
            for pos in find_all(bytes, marker) {
                if let Some(v) = le_f32(bytes, pos + 8) {
                    let v = f64::from(v);
                    if v.is_finite() && v >= lo && v <= hi {
                        outcome.settings.observe_number(key, v);
                        *found += 1;
                    }
                }
            }
        };

        observe_f32(b"DENSITY", ParameterKey::RowSpacing, 0.1, 20.0, &mut found);
        observe_f32(
            b"COMPENSATION",
            ParameterKey::PullCompensation,
            -50.0,
            50.0,
            &mut found,
        );
        observe_f32(b"PULL", ParameterKey::PullCompensation, -50.0, 50.0, &mut found);
        observe_f32(b"ANGLE", ParameterKey::FillAngle, -180.0, 180.0, &mut found);
        observe_f32(
            b"STITCH_LENGTH",
            ParameterKey::StitchLength,
            0.1,
            10.0,
            &mut found,
        );
        observe_f32(b"HOOP_SIZE", ParameterKey::HoopDimensions, 50.0, 400.0, &mut found);

        for pos in find_all(bytes, b"AUTO_UNDERLAY") {
            if let Some(v) = le_u32(bytes, pos + 8) {
                if v <= 1 {
                    outcome
                        .settings
                        .set(ParameterKey::AutoUnderlay, ParameterValue::Toggle(v == 1));
                    found += 1;
                }
            }
        }
        for pos in find_all(bytes, b"UNDERLAY") {
            // Skip hits that are the tail of an AUTO_UNDERLAY marker.
            if pos >= 5 && &bytes[pos - 5..pos] == b"AUTO_" {
                continue;
            }
            if let Some(v) = le_u32(bytes, pos + 8) {
                let name = match v {
                    0 => Some("none"),
                    1 => Some("edge run"),
                    2 => Some("zigzag"),
                    3 => Some("tatami"),
                    4 => Some("automatic"),
                    _ => None,
                };
                if let Some(name) = name {
                    outcome
                        .settings
                        .set(ParameterKey::UnderlayType, ParameterValue::Text(name.into()));
                    found += 1;
                    break;
                }
            }
        }
        for marker in [b"STITCH_TYPE".as_slice(), b"FILL_TYPE".as_slice()] {
            for pos in find_all(bytes, marker) {
                if let Some(v) = le_u32(bytes, pos + 8) {
                    let name = match v {
                        1 => Some("running"),
                        2 => Some("satin"),
                        3 => Some("fill"),
                        4 => Some("tatami"),
                        5 => Some("cross stitch"),
                        6 => Some("bean stitch"),
                        _ => None,
                    };
                    if let Some(name) = name {
                        outcome
                            .settings
                            .set(ParameterKey::StitchTypes, ParameterValue::Text(name.into()));
                        found += 1;
                        break;
                    }
                }
            }
        }
        for (marker, key, lo, hi) in [
            (b"THREAD_WEIGHT".as_slice(), ParameterKey::ThreadWeight, 30u32, 120u32),
            (b"NEEDLE_SIZE".as_slice(), ParameterKey::NeedleSize, 60, 120),
        ] {
            for pos in find_all(bytes, marker) {
                if let Some(v) = le_u32(bytes, pos + 8) {
                    if (lo..=hi).contains(&v) {
                        outcome.settings.observe_number(key, f64::from(v));
                        found += 1;
                    }
                }
            }
        }
        for pos in find_all(bytes, b"FABRIC_TYPE") {
            if let Some(v) = le_u32(bytes, pos + 8) {
                let name = match v {
                    1 => Some("cotton"),
                    2 => Some("polyester"),
                    3 => Some("silk"),
                    4 => Some("denim"),
                    5 => Some("leather"),
                    6 => Some("canvas"),
                    7 => Some("fleece"),
                    8 => Some("terry"),
                    _ => None,
                };
                if let Some(name) = name {
                    outcome
                        .settings
                        .set(ParameterKey::FabricType, ParameterValue::Text(name.into()));
                    found += 1;
                    break;
                }
            }
        }
        for pos in find_all(bytes, b"STABILIZER") {
            if let Some(v) = le_u32(bytes, pos + 8) {
                let name = match v {
                    0 => Some("none"),
                    1 => Some("tear-away"),
                    2 => Some("cut-away"),
                    3 => Some("wash-away"),
                    4 => Some("heat-away"),
                    5 => Some("sticky"),
                    _ => None,
                };
                if let Some(name) = name {
                    outcome.settings.set(
                        ParameterKey::StabilizerType,
                        ParameterValue::Text(name.into()),
                    );
                    found += 1;
                    break;
                }
            }
        }
        found
    }
}

impl ExtractionStrategy for PmlpxfSectionScanner {
    fn name(&self) -> &'static str {
        "PMLPXF section scanner"
    }

    fn rank_ceiling(&self) -> f64 {
        0.40
    }

    fn point_cap(&self, config: &AnalyzeConfig) -> usize {
        config.max_stitch_analysis_points
    }

    fn extract(
        &self,
        bytes: &[u8],
        _config: &AnalyzeConfig,
        budget: &mut ScanBudget,
    ) -> StrategyOutcome {
        let mut outcome = StrategyOutcome::empty(self.name());

        if !Self::parse_header(bytes, &mut outcome) {
            return StrategyOutcome::empty(self.name());
        }

        let mut quality = 0.2; // header alone is already PMLPXF-specific
        if Self::parse_stitch_section(bytes, budget, &mut outcome) {
            quality += 0.15;
        }
        if Self::parse_color_section(bytes, &mut outcome) {
            quality += 0.1;
        }
        if Self::parse_machine_settings(bytes, &mut outcome) > 0 {
            quality += 0.05;
        }
        if Self::parse_extended_parameters(bytes, &mut outcome) > 0 {
            quality += 0.05;
        }

        outcome.confidence = quality;
        outcome
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{header, push_color_section, push_stitch_section};
    use super::*;
    use crate::core::model::ColorSource;
    use std::time::Duration;

    fn run(bytes: &[u8]) -> StrategyOutcome {
        let cfg = AnalyzeConfig::default();
        let mut budget =
            ScanBudget::with_timeout(Duration::from_secs(10), cfg.max_stitch_analysis_points);
        PmlpxfSectionScanner.extract(bytes, &cfg, &mut budget)
    }

    #[test]
    fn non_pmlpxf_is_ignored() {
        let outcome = run(b"DSTfile with other content entirely, long enough to scan....");
        assert!(!outcome.is_usable());
        assert_eq!(outcome.confidence, 0.0);
    }

    #[test]
    fn parses_header_fields() {
        let buf = header(3, 500, 120.0, 80.0);
        let outcome = run(&buf);
        assert_eq!(
            outcome.settings.extras.get("declared_color_count"),
            Some(&ParameterValue::Integer(3))
        );
        assert_eq!(
            outcome.settings.extras.get("declared_stitch_count"),
            Some(&ParameterValue::Integer(500))
        );
        assert_eq!(
            outcome.settings.extras.get("design_width"),
            Some(&ParameterValue::Number(120.0))
        );
        assert_eq!(
            outcome.settings.extras.get("has_underlay"),
            Some(&ParameterValue::Toggle(true))
        );
    }

    #[test]
    fn parses_color_and_stitch_sections() {
        let mut buf = header(2, 6, 50.0, 50.0);
        push_color_section(&mut buf, &[(255, 0, 0), (0, 0, 255)]);
        let records: Vec<(i16, i16, u16)> = (0..6).map(|i| (i * 10, i * 5, 0)).collect();
        push_stitch_section(&mut buf, &records);

        let outcome = run(&buf);
        assert_eq!(outcome.colors.len(), 2);
        assert_eq!(outcome.colors[0].rgb, Some((255, 0, 0)));
        assert!(outcome
            .colors
            .iter()
            .all(|c| c.source == ColorSource::Declared));
        assert_eq!(outcome.stitches.len(), 6);
        assert!((outcome.stitches[1].x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn truncated_color_table_is_rejected() {
        let mut buf = header(2, 0, 50.0, 50.0);
        buf.extend_from_slice(b"CLRS");
        buf.extend_from_slice(&200u32.to_le_bytes()); // declares more than fits
        buf.extend_from_slice(&[0u8; 8]);
        let outcome = run(&buf);
        assert!(outcome.colors.is_empty());
    }

    #[test]
    fn machine_settings_markers() {
        let mut buf = header(1, 0, 50.0, 50.0);
        buf.extend_from_slice(b"SPEED");
        buf.extend_from_slice(&750u32.to_le_bytes());
        buf.extend_from_slice(b"TENSION");
        buf.extend_from_slice(&40u32.to_le_bytes());
        let outcome = run(&buf);
        assert_eq!(
            outcome.settings.get(ParameterKey::MachineSpeed),
            Some(&ParameterValue::Number(750.0))
        );
        assert_eq!(
            outcome.settings.get(ParameterKey::ThreadTension),
            Some(&ParameterValue::Number(40.0))
        );
    }

    #[test]
    fn extended_markers_collapse_to_ranges() {
        let mut buf = header(1, 0, 50.0, 50.0);
        for angle in [30.0f32, 60.0f32] {
            buf.extend_from_slice(b"ANGLE");
            buf.extend_from_slice(&[0u8; 3]); // payload sits 8 bytes past the tag
            buf.extend_from_slice(&angle.to_le_bytes());
        }
        let outcome = run(&buf);
        assert_eq!(
            outcome.settings.get(ParameterKey::FillAngle),
            Some(&ParameterValue::Range {
                min: 30.0,
                max: 60.0
            })
        );
    }
}
