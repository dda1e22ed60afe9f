//! Interpretation of a single `.pf` file.
//!
//! # Pipeline
//!
//! 1. Expand `#include` directives into one line stream.
//! 2. Skip blank and comment lines; classify and parse the rest. Assignments
//!    overwrite earlier values for the same key, registers add up per subject.
//!    The first invalid line aborts the file.
//! 3. Apply the reserved keys: `POMO` (minutes per unit, default 30) and
//!    `DATE` (`DD/MM/YYYY`, default the file's modification day). Malformed
//!    values fall back to the defaults with a warning.
//! 4. Rename register subjects that match an assignment key to the
//!    assignment's value, adding counts together when names collide.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::date::DateKey;
use crate::line::{self, LineKind};
use crate::map::{Map, MapError};
use crate::preprocess::{MAX_INCLUDE_DEPTH, PreprocessError, Preprocessor};

/// Minutes per unit when a file does not set `POMO`.
pub const DEFAULT_POMODORO_MINUTES: u32 = 30;

/// Assignment key overriding the minutes per unit.
pub const POMO_KEY: &str = "POMO";

/// Assignment key overriding the file's date.
pub const DATE_KEY: &str = "DATE";

/// Assignment key -> literal value, for one file.
pub type Assignments = Map<String>;

/// Subject -> accumulated unit count, for one file or one date.
pub type Registers = Map<u32>;

/// Errors that stop a file from being interpreted.
#[derive(Debug, Error)]
pub enum InterpretError {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    /// A line that is neither an assignment nor a register.
    #[error("invalid line at {}:{line}: {content:?}", path.display())]
    InvalidLine {
        path: PathBuf,
        line: usize,
        content: String,
    },

    /// The modification time needed for the default date is unavailable.
    #[error("cannot read modification time of {}: {source}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Map(#[from] MapError),
}

impl InterpretError {
    /// Whether this error should stop the whole run rather than just this
    /// file: the file itself is unreadable, or memory ran out.
    pub const fn is_fatal_for_run(&self) -> bool {
        match self {
            Self::Preprocess(err) => err.is_unreadable_root(),
            Self::Metadata { .. } | Self::Map(_) => true,
            Self::InvalidLine { .. } => false,
        }
    }
}

/// Knobs for interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpretOptions {
    /// Minutes per unit when `POMO` is absent or unusable.
    pub default_duration: u32,
    /// Include nesting limit handed to the preprocessor.
    pub max_include_depth: usize,
}

impl Default for InterpretOptions {
    fn default() -> Self {
        Self {
            default_duration: DEFAULT_POMODORO_MINUTES,
            max_include_depth: MAX_INCLUDE_DEPTH,
        }
    }
}

/// Everything read from one file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub assignments: Assignments,
    pub registers: Registers,
    pub date: DateKey,
    pub duration_minutes: u32,
}

impl fmt::Display for ParsedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "POMOFILE: {}", self.path.display())?;
        writeln!(f, "{}", "-".repeat(46))?;

        let mut assignments: Vec<_> = self.assignments.iter().collect();
        assignments.sort_unstable_by_key(|(key, _)| *key);
        writeln!(f, "Assignments: {{")?;
        for (key, value) in assignments {
            writeln!(f, "  {key:?}: {value:?},")?;
        }
        writeln!(f, "}}")?;

        let mut registers: Vec<_> = self.registers.iter().collect();
        registers.sort_unstable_by_key(|(subject, _)| *subject);
        writeln!(f, "Registers: {{")?;
        for (subject, units) in registers {
            writeln!(f, "  {subject:?}: {units},")?;
        }
        writeln!(f, "}}")?;

        writeln!(f, "Date: {}", self.date)?;
        writeln!(f, "Pomodoro duration: {}", self.duration_minutes)?;
        write!(f, "{}", "-".repeat(46))
    }
}

/// Parses the leading integer of `text` the lenient way: optional sign, then
/// digits. Trailing text is ignored with a warning; no digits or an overflow
/// yields 0 with a warning.
///
/// A 0 here is indistinguishable from a written `0`, so callers that treat 0
/// as "unset" will also ignore corrupt values.
pub fn parse_leading_int(text: &str) -> i64 {
    let trimmed = text.trim_start();
    let unsigned = trimmed.trim_start_matches(['+', '-']);
    let sign_len = trimmed.len() - unsigned.len();
    if sign_len > 1 {
        tracing::warn!(text, "no digits found");
        return 0;
    }
    let digits_len = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    if digits_len == 0 {
        tracing::warn!(text, "no digits found");
        return 0;
    }

    let number = &trimmed[..sign_len + digits_len];
    let rest = &unsigned[digits_len..];
    if !rest.is_empty() {
        tracing::warn!(text, extra = rest, "ignoring characters after number");
    }

    number.parse().unwrap_or_else(|_| {
        tracing::warn!(text, "number out of range");
        0
    })
}

/// Minutes per unit from `POMO`, if it holds a positive integer.
fn pomodoro_override(assignments: &Assignments) -> Option<u32> {
    let raw = assignments.get(POMO_KEY)?;
    let minutes = parse_leading_int(raw);
    match u32::try_from(minutes) {
        Ok(minutes) if minutes > 0 => Some(minutes),
        _ => {
            tracing::warn!(value = %raw, "ignoring unusable POMO value");
            None
        }
    }
}

/// Date from `DATE`, if it holds a valid `DD/MM/YYYY`.
fn date_override(assignments: &Assignments) -> Option<DateKey> {
    let raw = assignments.get(DATE_KEY)?;
    DateKey::parse(raw)
        .inspect_err(|err| tracing::warn!(error = %err, "ignoring unusable DATE value"))
        .ok()
}

fn modification_day(path: &Path) -> Result<DateKey, InterpretError> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map(DateKey::from_system_time)
        .map_err(|source| InterpretError::Metadata {
            path: path.to_path_buf(),
            source,
        })
}

/// Renames every register subject that is also an assignment key to that
/// assignment's value.
///
/// Each original subject is resolved once against the table as it stood
/// before the pass, so the outcome does not depend on iteration order.
/// Assignments with an empty value are not abbreviations. Returns how many
/// subjects were renamed.
pub fn resolve_abbreviations(
    assignments: &Assignments,
    registers: &mut Registers,
) -> Result<usize, MapError> {
    let abbreviated: Vec<(String, String)> = registers
        .keys()
        .filter_map(|subject| {
            assignments
                .get(subject)
                .filter(|full| !full.is_empty())
                .map(|full| (subject.to_string(), full.clone()))
        })
        .collect();

    let mut renamed = Vec::with_capacity(abbreviated.len());
    for (subject, full) in &abbreviated {
        if let Some(units) = registers.remove(subject) {
            renamed.push((full, units));
        }
    }
    for (full, units) in renamed {
        registers.add(full, units)?;
    }

    Ok(abbreviated.len())
}

/// Interprets files with a fixed set of options.
#[derive(Debug, Clone, Copy)]
pub struct Interpreter {
    options: InterpretOptions,
    preprocessor: Preprocessor,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(InterpretOptions::default())
    }
}

impl Interpreter {
    pub fn new(options: InterpretOptions) -> Self {
        Self {
            options,
            preprocessor: Preprocessor::new(options.max_include_depth),
        }
    }

    pub const fn options(&self) -> &InterpretOptions {
        &self.options
    }

    /// Reads, parses and resolves one file.
    pub fn interpret(&self, path: &Path) -> Result<ParsedFile, InterpretError> {
        let expansion = self.preprocessor.expand(path)?;

        let mut assignments = Assignments::new()?;
        let mut registers = Registers::new()?;

        for source in expansion {
            let text = source.text.as_str();
            if line::is_ignorable(text) {
                continue;
            }

            match line::classify(text) {
                LineKind::Assignment => match line::parse_assignment(text) {
                    Ok(assignment) => {
                        assignments.put(&assignment.key, assignment.value)?;
                    }
                    Err(err) => tracing::warn!(
                        path = %source.origin.display(),
                        line = source.number,
                        error = %err,
                        "skipping assignment"
                    ),
                },
                LineKind::Register => match line::parse_register(text) {
                    Ok(register) => {
                        registers.add(&register.subject, register.units)?;
                    }
                    Err(err) => tracing::warn!(
                        path = %source.origin.display(),
                        line = source.number,
                        error = %err,
                        "skipping register"
                    ),
                },
                LineKind::Invalid => {
                    return Err(InterpretError::InvalidLine {
                        path: source.origin.to_path_buf(),
                        line: source.number,
                        content: text.to_string(),
                    });
                }
            }
        }

        let duration_minutes =
            pomodoro_override(&assignments).unwrap_or(self.options.default_duration);
        let date = match date_override(&assignments) {
            Some(date) => date,
            None => modification_day(path)?,
        };

        let renamed = resolve_abbreviations(&assignments, &mut registers)?;
        tracing::debug!(
            path = %path.display(),
            %date,
            duration_minutes,
            subjects = registers.len(),
            renamed,
            "interpreted file"
        );

        Ok(ParsedFile {
            path: path.to_path_buf(),
            assignments,
            registers,
            date,
            duration_minutes,
        })
    }
}

/// Interprets `path` with default options.
pub fn interpret(path: &Path) -> Result<ParsedFile, InterpretError> {
    Interpreter::default().interpret(path)
}
