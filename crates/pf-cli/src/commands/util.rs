//! Shared utilities for CLI commands.

use pf_core::DateKey;

/// Parse a `DD/MM/YYYY` command-line date.
pub fn parse_date_arg(s: &str) -> anyhow::Result<DateKey> {
    DateKey::parse(s).map_err(|err| anyhow::anyhow!("{err} (e.g., 15/01/2026)"))
}

/// Split a comma-separated subject list, trimming entries and dropping empty ones.
///
/// Returns `None` when nothing is left.
pub fn parse_subject_list(s: &str) -> Option<Vec<String>> {
    let subjects: Vec<String> = s
        .split(',')
        .map(str::trim)
        .filter(|subject| !subject.is_empty())
        .map(str::to_string)
        .collect();

    if subjects.is_empty() {
        None
    } else {
        Some(subjects)
    }
}
