//! Report rendering.
//!
//! Turns filtered registers into a per-day report and renders it as plain
//! text, a standalone HTML page, or JSON. Days are listed in calendar order
//! and subjects by name; days left without subjects are omitted.

use std::fmt::Write;

use anyhow::Result;
use clap::ValueEnum;
use pf_core::{DateKey, Map, Registers};
use serde::{Deserialize, Serialize};

const TOMATO: &str = "🍅";

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    #[default]
    Text,
    Html,
    Json,
}

/// One subject's total for a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectReport {
    pub name: String,
    pub pomodoros: u32,
    pub minutes: u64,
}

/// Everything recorded for one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayReport {
    pub date: DateKey,
    pub pomodoro_minutes: u32,
    pub subjects: Vec<SubjectReport>,
    pub total_minutes: u64,
}

/// The full report for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportData {
    pub days: Vec<DayReport>,
}

impl ReportData {
    /// Builds the report from date-keyed registers and their unit durations.
    ///
    /// Dates missing from `durations` use `default_minutes`.
    pub fn build(registers: &Map<Registers>, durations: &Map<u32>, default_minutes: u32) -> Self {
        let mut days: Vec<DayReport> = registers
            .iter()
            .filter(|(_, bucket)| !bucket.is_empty())
            .filter_map(|(key, bucket)| {
                let Ok(date) = DateKey::parse(key) else {
                    tracing::warn!(key, "skipping bucket with unparsable date key");
                    return None;
                };
                let pomodoro_minutes = durations.get(key).copied().unwrap_or(default_minutes);

                let mut subjects: Vec<SubjectReport> = bucket
                    .iter()
                    .map(|(name, &pomodoros)| SubjectReport {
                        name: name.to_string(),
                        pomodoros,
                        minutes: u64::from(pomodoros) * u64::from(pomodoro_minutes),
                    })
                    .collect();
                subjects.sort_by(|a, b| a.name.cmp(&b.name));
                let total_minutes = subjects.iter().map(|s| s.minutes).sum();

                Some(DayReport {
                    date,
                    pomodoro_minutes,
                    subjects,
                    total_minutes,
                })
            })
            .collect();

        days.sort_by_key(|day| day.date);
        Self { days }
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Formats the human-readable report.
pub fn format_text(data: &ReportData) -> String {
    let mut output = String::new();

    if data.is_empty() {
        writeln!(output, "No registers found.").unwrap();
        return output;
    }

    for (index, day) in data.days.iter().enumerate() {
        if index > 0 {
            writeln!(output).unwrap();
        }
        writeln!(
            output,
            "{} -> {TOMATO} = {} minutes",
            day.date, day.pomodoro_minutes
        )
        .unwrap();
        writeln!(output).unwrap();
        for subject in &day.subjects {
            let tomatoes = TOMATO.repeat(subject.pomodoros as usize);
            writeln!(output, "{}:", subject.name).unwrap();
            writeln!(output, "{tomatoes} -> {} minutes", subject.minutes).unwrap();
        }
    }

    output
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Formats the report as a standalone HTML page with one table per day.
pub fn format_html(data: &ReportData) -> String {
    let mut output = String::new();

    writeln!(output, "<!DOCTYPE html>").unwrap();
    writeln!(output, "<html lang=\"en\">").unwrap();
    writeln!(output, "<head>").unwrap();
    writeln!(output, "<meta charset=\"utf-8\">").unwrap();
    writeln!(output, "<title>Pomodoro report</title>").unwrap();
    writeln!(
        output,
        "<style>table {{ border-collapse: collapse; margin-bottom: 1em; }} \
         th, td {{ border: 1px solid #999; padding: 4px 8px; }}</style>"
    )
    .unwrap();
    writeln!(output, "</head>").unwrap();
    writeln!(output, "<body>").unwrap();

    for day in &data.days {
        writeln!(output, "<table>").unwrap();
        writeln!(
            output,
            "<caption>{} &mdash; {TOMATO} = {} minutes</caption>",
            day.date, day.pomodoro_minutes
        )
        .unwrap();
        writeln!(
            output,
            "<tr><th>Subject</th><th>Pomodoros</th><th>Minutes</th></tr>"
        )
        .unwrap();
        for subject in &day.subjects {
            writeln!(
                output,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&subject.name),
                subject.pomodoros,
                subject.minutes
            )
            .unwrap();
        }
        writeln!(output, "</table>").unwrap();
    }

    writeln!(output, "</body>").unwrap();
    writeln!(output, "</html>").unwrap();
    output
}

/// Formats the report as pretty-printed JSON.
pub fn format_json(data: &ReportData) -> Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// Renders `data` in the requested format.
pub fn render(data: &ReportData, kind: ExportKind) -> Result<String> {
    match kind {
        ExportKind::Text => Ok(format_text(data)),
        ExportKind::Html => Ok(format_html(data)),
        ExportKind::Json => {
            let mut json = format_json(data)?;
            json.push('\n');
            Ok(json)
        }
    }
}
