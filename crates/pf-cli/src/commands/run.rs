//! Interpret, merge, filter and report.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use pf_core::{Aggregate, FilterSpec, Interpreter};

use super::report::{ExportKind, ReportData, render};
use super::util::parse_subject_list;
use crate::{Cli, Config};

/// Everything a run needs, resolved from the command line and configuration.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub files: Vec<PathBuf>,
    pub filter: FilterSpec,
    pub export: ExportKind,
}

impl RunRequest {
    /// Resolves the request, rejecting an inverted date range up front.
    pub fn from_cli(cli: &Cli, config: &Config) -> Result<Self> {
        let subjects = cli.subjects.as_deref().and_then(parse_subject_list);
        let filter =
            FilterSpec::new(cli.after, cli.before, subjects).context("invalid date range")?;
        let export = cli.export.or(config.default_export).unwrap_or_default();

        Ok(Self {
            files: cli.files.clone(),
            filter,
            export,
        })
    }
}

/// Interprets every file in order and merges what survives.
///
/// Files rejected by the interpreter are logged and skipped unless the error
/// ends the whole run.
pub fn collect(interpreter: &Interpreter, files: &[PathBuf]) -> Result<Aggregate> {
    let mut aggregate = Aggregate::new().context("failed to allocate aggregation context")?;

    for path in files {
        match interpreter.interpret(path) {
            Ok(parsed) => {
                tracing::debug!(
                    path = %path.display(),
                    date = %parsed.date,
                    registers = parsed.registers.len(),
                    "merging file"
                );
                aggregate
                    .merge(parsed)
                    .with_context(|| format!("failed to merge {}", path.display()))?;
            }
            Err(e) if e.is_fatal_for_run() => {
                return Err(e).with_context(|| format!("failed to interpret {}", path.display()));
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "skipping file");
            }
        }
    }

    Ok(aggregate)
}

/// Runs the full pipeline and writes the rendered report to `writer`.
pub fn execute<W: Write>(request: &RunRequest, config: &Config, writer: &mut W) -> Result<()> {
    let interpreter = Interpreter::new(config.interpret_options());
    let aggregate = collect(&interpreter, &request.files)?;

    let filtered = request
        .filter
        .apply(aggregate.registers())
        .context("failed to filter registers")?;
    let data = ReportData::build(
        &filtered,
        aggregate.durations(),
        config.default_pomodoro_minutes,
    );

    let output = render(&data, request.export)?;
    writer.write_all(output.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Runs the command against stdout.
pub fn run(cli: &Cli, config: &Config) -> Result<()> {
    let request = RunRequest::from_cli(cli, config)?;
    execute(&request, config, &mut std::io::stdout().lock())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn request(args: &[&str], files: &[PathBuf]) -> Result<RunRequest> {
        let mut argv: Vec<String> = std::iter::once("pomointer".to_string())
            .chain(args.iter().map(|arg| (*arg).to_string()))
            .collect();
        argv.extend(files.iter().map(|f| f.display().to_string()));
        RunRequest::from_cli(&Cli::parse_from(argv), &Config::default())
    }

    fn execute_to_string(request: &RunRequest) -> Result<String> {
        let mut out = Vec::new();
        execute(request, &Config::default(), &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_inverted_range_is_rejected_before_reading() {
        let missing = PathBuf::from("/nonexistent/day.pf");
        let err = request(&["-a", "10/01/2026", "-b", "01/01/2026"], &[missing]).unwrap_err();
        assert!(format!("{err:#}").contains("is later than"));
    }

    #[test]
    fn test_export_falls_back_to_config_then_text() {
        let file = PathBuf::from("day.pf");
        let cli = Cli::parse_from(["pomointer", "day.pf"]);

        let config = Config {
            default_export: Some(ExportKind::Html),
            ..Config::default()
        };
        assert_eq!(RunRequest::from_cli(&cli, &config).unwrap().export, ExportKind::Html);
        assert_eq!(request(&[], &[file.clone()]).unwrap().export, ExportKind::Text);
        assert_eq!(request(&["-e", "json"], &[file]).unwrap().export, ExportKind::Json);
    }

    #[test]
    fn test_collect_skips_invalid_files() {
        let temp = TempDir::new().unwrap();
        let good = write(temp.path(), "good.pf", "DATE = 01/02/2026\nMath: **\n");
        let bad = write(temp.path(), "bad.pf", "DATE = 01/02/2026\nthis line is nonsense\n");

        let interpreter = Interpreter::new(Config::default().interpret_options());
        let aggregate = collect(&interpreter, &[bad, good]).unwrap();

        let date = pf_core::DateKey::parse("01/02/2026").unwrap();
        assert_eq!(aggregate.bucket(date).unwrap().get("Math"), Some(&2));
    }

    #[test]
    fn test_collect_fails_on_missing_top_level_file() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.pf");

        let interpreter = Interpreter::new(Config::default().interpret_options());
        let err = collect(&interpreter, &[missing]).unwrap_err();
        assert!(err.to_string().contains("failed to interpret"));
    }

    #[test]
    fn test_execute_merges_filters_and_renders() {
        let temp = TempDir::new().unwrap();
        let first = write(
            temp.path(),
            "first.pf",
            "DATE = 01/02/2026\nPOMO = 25\nM = Math\nM: **\nPhysics: *\n",
        );
        let second = write(temp.path(), "second.pf", "DATE = 01/02/2026\nPOMO = 25\nMath: *\n");
        let third = write(temp.path(), "third.pf", "DATE = 05/02/2026\nMath: ****\n");

        let req = request(&["-b", "03/02/2026", "-s", "Math"], &[first, second, third]).unwrap();
        let output = execute_to_string(&req).unwrap();

        assert_eq!(output, "01/02/2026 -> 🍅 = 25 minutes\n\nMath:\n🍅🍅🍅 -> 75 minutes\n");
    }

    #[test]
    fn test_execute_with_nothing_left_reports_empty() {
        let temp = TempDir::new().unwrap();
        let file = write(temp.path(), "day.pf", "DATE = 01/02/2026\nMath: *\n");

        let req = request(&["-s", "History"], &[file]).unwrap();
        assert_eq!(execute_to_string(&req).unwrap(), "No registers found.\n");
    }
}
