//! Line classification and parsing.
//!
//! Two line shapes carry data:
//!
//! - Assignment: `KEY = VALUE`, exactly one `=` and no `:`.
//! - Register: `SUBJECT: ****`, exactly one `:` and no `=`. Each `*` after the
//!   colon is one unit of work.
//!
//! A separator preceded by a backslash (`\=`, `\:`) is literal text: it is not
//! counted and the backslash is dropped from the parsed value. Blank lines and
//! comments are filtered by the caller with [`is_ignorable`] before a line is
//! classified.

use thiserror::Error;

const ASSIGN: char = '=';
const REGISTER: char = ':';
const UNIT: char = '*';

/// Errors for a single line that was classified but could not be split.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LineError {
    /// The line does not contain exactly one unescaped separator.
    #[error("expected exactly one '{separator}' but found {found}")]
    Malformed { separator: char, found: usize },

    /// The key of an assignment is empty.
    #[error("assignment has an empty key")]
    EmptyKey,

    /// The subject of a register is empty.
    #[error("register has an empty subject")]
    EmptySubject,
}

/// Classification of a non-blank, non-comment line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Assignment,
    Register,
    Invalid,
}

/// A parsed `KEY = VALUE` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub key: String,
    pub value: String,
}

/// A parsed `SUBJECT: ***` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    pub subject: String,
    pub units: u32,
}

/// Whether the line is blank or a `#` comment.
pub fn is_ignorable(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Byte offsets of every unescaped `separator`.
///
/// A backslash escapes the character after it, so `\\=` is an escaped
/// backslash followed by a real separator.
fn separator_offsets(line: &str, separator: char) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut escaped = false;
    for (offset, c) in line.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == separator {
            offsets.push(offset);
        }
    }
    offsets
}

/// Drops the backslash from `\=`, `\:` and `\\`; other backslashes stay.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, '\\' | ASSIGN | REGISTER) {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

/// Classifies a line by its unescaped separators.
pub fn classify(line: &str) -> LineKind {
    let line = line.trim();
    let assigns = separator_offsets(line, ASSIGN).len();
    let registers = separator_offsets(line, REGISTER).len();

    match (assigns, registers) {
        (1, 0) => LineKind::Assignment,
        (0, 1) => LineKind::Register,
        _ => LineKind::Invalid,
    }
}

/// Splits `line` on its single unescaped `separator` into trimmed halves.
fn split_once_unescaped(line: &str, separator: char) -> Result<(String, String), LineError> {
    let offsets = separator_offsets(line, separator);
    let &[offset] = offsets.as_slice() else {
        return Err(LineError::Malformed {
            separator,
            found: offsets.len(),
        });
    };

    let left = unescape(line[..offset].trim());
    let right = unescape(line[offset + separator.len_utf8()..].trim());
    Ok((left, right))
}

/// Parses `KEY = VALUE`, trimming whitespace around both sides.
pub fn parse_assignment(line: &str) -> Result<Assignment, LineError> {
    let (key, value) = split_once_unescaped(line, ASSIGN)?;
    if key.is_empty() {
        return Err(LineError::EmptyKey);
    }
    Ok(Assignment { key, value })
}

/// Parses `SUBJECT: ***`, counting the `*` characters after the colon.
pub fn parse_register(line: &str) -> Result<Register, LineError> {
    let (subject, marks) = split_once_unescaped(line, REGISTER)?;
    if subject.is_empty() {
        return Err(LineError::EmptySubject);
    }
    let units = marks.chars().filter(|&c| c == UNIT).count();
    Ok(Register {
        subject,
        units: u32::try_from(units).unwrap_or(u32::MAX),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_separator_counts() {
        assert_eq!(classify("M = Math"), LineKind::Assignment);
        assert_eq!(classify("  Math: ***  "), LineKind::Register);
        assert_eq!(classify("Math: *** = 3"), LineKind::Invalid);
        assert_eq!(classify("just words"), LineKind::Invalid);
        assert_eq!(classify("A = B = C"), LineKind::Invalid);
        assert_eq!(classify("Math: ** : *"), LineKind::Invalid);
    }

    #[test]
    fn test_escaped_separators_are_not_counted() {
        assert_eq!(classify(r"URL = http\://example.org"), LineKind::Assignment);
        assert_eq!(classify(r"a\=b: **"), LineKind::Register);

        let assignment = parse_assignment(r"URL = http\://example.org").unwrap();
        assert_eq!(assignment.value, "http://example.org");

        let register = parse_register(r"a\=b: **").unwrap();
        assert_eq!(register.subject, "a=b");
        assert_eq!(register.units, 2);
    }

    #[test]
    fn test_escaped_backslash_does_not_escape_separator() {
        assert_eq!(classify(r"a\\=b"), LineKind::Assignment);
        let assignment = parse_assignment(r"a\\=b").unwrap();
        assert_eq!(assignment.key, r"a\");
        assert_eq!(assignment.value, "b");

        assert_eq!(classify(r"C:\\\:drive: *"), LineKind::Invalid);
        let err = parse_register(r"C:\\\:drive: *").unwrap_err();
        assert_eq!(
            err,
            LineError::Malformed {
                separator: ':',
                found: 2
            }
        );

        let register = parse_register(r"dir\\\:sub\x: *").unwrap();
        assert_eq!(register.subject, r"dir\:sub\x");
    }

    #[test]
    fn test_assignment_trims_both_sides() {
        for line in ["POMO=25", "  POMO   =   25  ", "\tPOMO\t=\t25\t"] {
            assert_eq!(
                parse_assignment(line).unwrap(),
                Assignment {
                    key: "POMO".to_string(),
                    value: "25".to_string(),
                },
                "line {line:?}"
            );
        }
    }

    #[test]
    fn test_assignment_keeps_inner_whitespace() {
        let assignment = parse_assignment(" Lin Alg =  Linear  Algebra ").unwrap();
        assert_eq!(assignment.key, "Lin Alg");
        assert_eq!(assignment.value, "Linear  Algebra");
    }

    #[test]
    fn test_assignment_allows_empty_value_but_not_key() {
        assert_eq!(parse_assignment("NOTE =").unwrap().value, "");
        assert_eq!(parse_assignment(" = x"), Err(LineError::EmptyKey));
    }

    #[test]
    fn test_register_counts_only_stars() {
        let register = parse_register("Math: ** * (late) *").unwrap();
        assert_eq!(register.subject, "Math");
        assert_eq!(register.units, 4);

        assert_eq!(parse_register("Math:").unwrap().units, 0);
        assert_eq!(parse_register(": **"), Err(LineError::EmptySubject));
    }

    #[test]
    fn test_malformed_split_is_a_local_error() {
        assert_eq!(
            parse_assignment("A = B = C"),
            Err(LineError::Malformed {
                separator: '=',
                found: 2
            })
        );
        assert_eq!(
            parse_register("no colon"),
            Err(LineError::Malformed {
                separator: ':',
                found: 0
            })
        );
    }

    #[test]
    fn test_ignorable_lines() {
        assert!(is_ignorable(""));
        assert!(is_ignorable("   \t"));
        assert!(is_ignorable("  # Math: ***"));
        assert!(!is_ignorable("Math: *"));
    }
}
