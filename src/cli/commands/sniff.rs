//! `stitchscope sniff` command - format identification only

use console::style;
use miette::Result;
use std::path::PathBuf;

use crate::core::model::FormatFamily;
use crate::sniff::sniff;

#[derive(clap::Args, Debug)]
pub struct SniffArgs {
    /// File to identify
    #[arg()]
    pub file: PathBuf,

    /// Emit the classification as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: SniffArgs) -> Result<()> {
    let bytes = std::fs::read(&args.file)
        .map_err(|e| miette::miette!("cannot read {}: {}", args.file.display(), e))?;

    let classification = sniff(&bytes);

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&classification).map_err(|e| miette::miette!("{}", e))?
        );
        return Ok(());
    }

    let mark = if classification.family == FormatFamily::Unknown {
        style("?").yellow()
    } else {
        style("✓").green()
    };
    println!(
        "{} {}: {} (confidence {:.0}%{})",
        mark,
        args.file.display(),
        style(classification.family).cyan().bold(),
        classification.confidence * 100.0,
        classification
            .version
            .as_deref()
            .map(|v| format!(", version {}", v))
            .unwrap_or_default()
    );
    Ok(())
}
