//! `stitchscope analyze` command - full analysis of an embroidery file

use console::style;
use miette::Result;
use std::path::PathBuf;
use tabled::{settings::Style, Table, Tabled};

use crate::analysis::analyze;
use crate::cli::output;
use crate::core::config::{AnalyzeConfig, UnitSystem};
use crate::core::model::{AnalysisRecord, ColorEntry, ExtractionSource};
use crate::metrics::density_band;

#[derive(clap::Args, Debug)]
pub struct AnalyzeArgs {
    /// Embroidery file to analyze
    #[arg()]
    pub file: PathBuf,

    /// Emit the full analysis record as JSON instead of the summary
    #[arg(long)]
    pub json: bool,

    /// Unit for lengths and dimensions
    #[arg(long, value_enum, default_value_t = UnitSystem::Centimeters)]
    pub unit: UnitSystem,

    /// Wall-clock budget for the scanning strategies, in seconds
    #[arg(long, env = "STITCHSCOPE_TIMEOUT")]
    pub timeout_seconds: Option<u64>,

    /// Jump distance that starts a new pattern, in cm
    #[arg(long)]
    pub jump_threshold_cm: Option<f64>,

    /// Spatial gap that starts a new cluster, in cm
    #[arg(long)]
    pub spatial_gap_cm: Option<f64>,

    /// Minimum stitches for a standalone pattern
    #[arg(long)]
    pub min_stitches: Option<usize>,
}

/// One row of the per-pattern summary table
#[derive(Tabled)]
struct PatternRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Stitches")]
    stitches: usize,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Colors")]
    colors: String,
    #[tabled(rename = "Density")]
    density: String,
    #[tabled(rename = "Est. time")]
    time: String,
    #[tabled(rename = "Complexity")]
    complexity: String,
}

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let bytes = std::fs::read(&args.file)
        .map_err(|e| miette::miette!("cannot read {}: {}", args.file.display(), e))?;

    let mut config = AnalyzeConfig {
        unit_system: args.unit,
        ..Default::default()
    };
    if let Some(t) = args.timeout_seconds {
        config.timeout_seconds = t;
    }
    if let Some(j) = args.jump_threshold_cm {
        config.pattern_jump_threshold_cm = j;
    }
    if let Some(g) = args.spatial_gap_cm {
        config.pattern_spatial_gap_cm = g;
    }
    if let Some(m) = args.min_stitches {
        config.pattern_min_stitch_count = m;
    }

    let record = analyze(&bytes, &config).map_err(|e| miette::miette!("{}", e))?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&record).map_err(|e| miette::miette!("{}", e))?
        );
        return Ok(());
    }

    print_summary(&args.file, &record, args.unit);
    Ok(())
}

fn print_summary(file: &std::path::Path, record: &AnalysisRecord, unit: UnitSystem) {
    println!(
        "{} {}",
        style("→").blue(),
        style(file.display()).bold()
    );
    println!(
        "  Format:     {} (confidence {:.0}%{})",
        style(record.classification.family).cyan(),
        record.classification.confidence * 100.0,
        record
            .classification
            .version
            .as_deref()
            .map(|v| format!(", version {}", v))
            .unwrap_or_default()
    );
    let source = match &record.source {
        ExtractionSource::TrustedDecoder => "trusted decoder".to_string(),
        ExtractionSource::Fallback(name) => format!("fallback: {}", name),
        ExtractionSource::None => "none".to_string(),
    };
    println!(
        "  Extraction: {} (confidence {:.0}%)",
        source,
        record.extraction_confidence * 100.0
    );
    println!();

    if record.patterns.is_empty() {
        println!("{} no stitch data recovered", style("✗").red());
    } else {
        let rows: Vec<PatternRow> = record
            .patterns
            .iter()
            .zip(&record.metrics)
            .enumerate()
            .map(|(i, (pattern, m))| PatternRow {
                index: i + 1,
                stitches: m.stitch_count,
                size: pattern
                    .bounding_box
                    .map(|b| {
                        format!(
                            "{:.1} × {:.1} {}",
                            unit.from_mm(b.width()),
                            unit.from_mm(b.height()),
                            unit.suffix()
                        )
                    })
                    .unwrap_or_else(|| "-".into()),
                colors: describe_colors(&pattern.color_entries),
                density: format!(
                    "{:.0}/cm² ({})",
                    m.density_per_cm2,
                    density_band(m.density_per_cm2)
                ),
                time: output::duration(m.estimated_time_seconds),
                complexity: format!("{:.2}", m.complexity_score),
            })
            .collect();
        println!("{}", Table::new(rows).with(Style::rounded()));

        if record.patterns.len() > 1 {
            let totals = &record.aggregate_metrics.totals;
            println!();
            println!(
                "  {} {} patterns, {} stitches total, {} thread, est. {}",
                style("Σ").bold(),
                record.patterns.len(),
                totals.stitch_count,
                output::thread(totals.thread_consumption_cm, unit),
                output::duration(totals.estimated_time_seconds)
            );
        }
    }

    if !record.machine_settings.is_empty() {
        println!();
        println!("{}", style("Machine settings").bold());
        for (key, value) in &record.machine_settings.known {
            println!("  {:<18} {}", key.to_string(), value);
        }
        for (key, value) in &record.machine_settings.extras {
            println!("  {:<18} {}", style(key).dim().to_string(), value);
        }
    }

    output::print_warnings(&record.warnings);
}

fn describe_colors(colors: &[ColorEntry]) -> String {
    if colors.is_empty() {
        return "-".into();
    }
    let named: Vec<String> = colors.iter().filter_map(ColorEntry::hex).collect();
    if named.is_empty() {
        format!("{}", colors.len())
    } else {
        format!("{} ({})", colors.len(), named.join(" "))
    }
}
