//! Command-line argument definitions.

use std::path::PathBuf;

use clap::Parser;
use pf_core::DateKey;

use crate::commands::report::ExportKind;
use crate::commands::util::parse_date_arg;

/// Pomodoro register interpreter.
///
/// Reads `.pf` files, adds up the pomodoros recorded per subject and per day,
/// and prints a report.
#[derive(Debug, Parser)]
#[command(name = "pomointer", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Only report days strictly after this date (DD/MM/YYYY).
    #[arg(short, long, value_parser = parse_date_arg)]
    pub after: Option<DateKey>,

    /// Only report days strictly before this date (DD/MM/YYYY).
    #[arg(short, long, value_parser = parse_date_arg)]
    pub before: Option<DateKey>,

    /// Only report these subjects (comma-separated).
    #[arg(short, long)]
    pub subjects: Option<String>,

    /// Report format. Defaults to the configured export, then text.
    #[arg(short, long, value_enum)]
    pub export: Option<ExportKind>,

    /// Register files to interpret, in order.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}
