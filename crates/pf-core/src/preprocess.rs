//! `#include` expansion.
//!
//! A line of the form `#include "path"` (leading whitespace allowed) is
//! replaced by the fully expanded contents of `path`. Relative paths resolve
//! against the directory of the file containing the directive. Every other
//! line passes through untouched, including lines that merely start with
//! `#include` but carry no quoted path; those are ordinary comments.
//!
//! Lines are read as bytes; invalid UTF-8 is replaced with U+FFFD and logged
//! rather than treated as a read failure.
//!
//! Any include that cannot be expanded (missing file, depth limit) aborts the
//! whole expansion. Only nesting depth is tracked: a file that includes itself
//! is stopped by the depth limit rather than detected as a cycle, which keeps
//! diamond-shaped includes legal.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use thiserror::Error;

/// Deepest include nesting accepted; the top-level file is depth 0.
pub const MAX_INCLUDE_DEPTH: usize = 10;

static INCLUDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*#include\s*"([^"]*)""#).unwrap());

/// Include expansion errors.
#[derive(Debug, Error)]
pub enum PreprocessError {
    /// A file could not be opened or read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Expanding `path` would exceed the nesting limit.
    #[error("include depth limit of {limit} reached at {}", path.display())]
    DepthExceeded { path: PathBuf, limit: usize },

    /// An include directive failed to expand.
    #[error("failed to include {} from {}:{line}", target.display(), path.display())]
    Include {
        /// File containing the directive.
        path: PathBuf,
        /// 1-based line of the directive.
        line: usize,
        /// Resolved path that was being included.
        target: PathBuf,
        #[source]
        source: Box<PreprocessError>,
    },
}

impl PreprocessError {
    /// Whether the file handed to the preprocessor itself was unreadable,
    /// as opposed to something it includes.
    pub const fn is_unreadable_root(&self) -> bool {
        matches!(self, Self::Read { .. })
    }
}

/// How a source line was terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTerminator {
    Lf,
    CrLf,
    /// Last line of a file without a trailing newline.
    None,
}

impl LineTerminator {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::None => "",
        }
    }
}

/// One line of expanded output together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// File the line was read from.
    pub origin: Arc<Path>,
    /// 1-based line number within `origin`.
    pub number: usize,
    /// Line text without its terminator.
    pub text: String,
    pub terminator: LineTerminator,
}

/// Flattened line stream for one top-level file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    lines: Vec<SourceLine>,
}

impl Expansion {
    pub fn lines(&self) -> &[SourceLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The expanded text, each line followed by its original terminator.
    pub fn render(&self) -> String {
        let mut text = String::new();
        for line in &self.lines {
            text.push_str(&line.text);
            text.push_str(line.terminator.as_str());
        }
        text
    }
}

impl IntoIterator for Expansion {
    type Item = SourceLine;
    type IntoIter = std::vec::IntoIter<SourceLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}

/// Expands include directives up to a fixed nesting depth.
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    max_depth: usize,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(MAX_INCLUDE_DEPTH)
    }
}

impl Preprocessor {
    /// Creates a preprocessor; a limit of 0 is raised to 1 so the top-level
    /// file can always be read.
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Expands `path` as a top-level file.
    pub fn expand(&self, path: &Path) -> Result<Expansion, PreprocessError> {
        self.expand_at_depth(path, 0)
    }

    /// Expands `path` as if it were included `depth` levels deep.
    pub fn expand_at_depth(&self, path: &Path, depth: usize) -> Result<Expansion, PreprocessError> {
        let mut lines = Vec::new();
        self.expand_into(path, depth, &mut lines)?;
        Ok(Expansion { lines })
    }

    fn expand_into(
        &self,
        path: &Path,
        depth: usize,
        out: &mut Vec<SourceLine>,
    ) -> Result<(), PreprocessError> {
        if depth >= self.max_depth {
            return Err(PreprocessError::DepthExceeded {
                path: path.to_path_buf(),
                limit: self.max_depth,
            });
        }

        let read_error = |source| PreprocessError::Read {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(read_error)?;
        let mut reader = BufReader::new(file);
        let origin: Arc<Path> = Arc::from(path);
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));

        let mut raw = Vec::new();
        let mut number = 0;
        loop {
            raw.clear();
            if reader.read_until(b'\n', &mut raw).map_err(read_error)? == 0 {
                break;
            }
            number += 1;

            let decoded = String::from_utf8_lossy(&raw);
            if let Cow::Owned(_) = decoded {
                tracing::warn!(
                    path = %path.display(),
                    line = number,
                    "replacing invalid UTF-8 bytes"
                );
            }
            let (text, terminator) = split_terminator(&decoded);

            if let Some(caps) = INCLUDE_RE.captures(text) {
                let target = base_dir.join(&caps[1]);
                tracing::debug!(
                    from = %path.display(),
                    line = number,
                    target = %target.display(),
                    depth = depth + 1,
                    "expanding include"
                );
                self.expand_into(&target, depth + 1, out)
                    .map_err(|source| PreprocessError::Include {
                        path: path.to_path_buf(),
                        line: number,
                        target: target.clone(),
                        source: Box::new(source),
                    })?;
                continue;
            }

            out.push(SourceLine {
                origin: Arc::clone(&origin),
                number,
                text: text.to_string(),
                terminator,
            });
        }

        Ok(())
    }
}

fn split_terminator(raw: &str) -> (&str, LineTerminator) {
    if let Some(text) = raw.strip_suffix("\r\n") {
        (text, LineTerminator::CrLf)
    } else if let Some(text) = raw.strip_suffix('\n') {
        (text, LineTerminator::Lf)
    } else {
        (raw, LineTerminator::None)
    }
}

/// Expands `path` with the default depth limit.
pub fn expand(path: &Path) -> Result<Expansion, PreprocessError> {
    Preprocessor::default().expand(path)
}
