//! CLI module - argument parsing and command dispatch

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "stitchscope",
    about = "Heuristic analysis of embroidery machine files",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose diagnostic logging (same as RUST_LOG=stitchscope=debug)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze an embroidery file and report patterns, metrics and settings
    Analyze(commands::analyze::AnalyzeArgs),
    /// Identify the format family of a file without analyzing it
    Sniff(commands::sniff::SniffArgs),
}
