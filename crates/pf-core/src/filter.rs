//! Date-range and subject filtering of aggregated registers.
//!
//! Date bounds are exclusive on both ends. The subject allow-list is applied
//! after the date bounds; when the bounds leave no bucket at all, the list is
//! applied to every bucket of the unfiltered collection instead.

use thiserror::Error;

use crate::date::DateKey;
use crate::interpret::Registers;
use crate::map::{Map, MapError};

/// Filter configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("after date {after} is later than before date {before}")]
    InvertedRange { after: DateKey, before: DateKey },
}

/// Which buckets and subjects survive filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    after: Option<DateKey>,
    before: Option<DateKey>,
    subjects: Option<Vec<String>>,
}

impl FilterSpec {
    /// Builds a filter, rejecting an `after` bound later than `before`.
    ///
    /// An empty subject list is treated as no list.
    pub fn new(
        after: Option<DateKey>,
        before: Option<DateKey>,
        subjects: Option<Vec<String>>,
    ) -> Result<Self, FilterError> {
        if let (Some(after), Some(before)) = (after, before) {
            if after > before {
                return Err(FilterError::InvertedRange { after, before });
            }
        }
        Ok(Self {
            after,
            before,
            subjects: subjects.filter(|list| !list.is_empty()),
        })
    }

    pub const fn after(&self) -> Option<DateKey> {
        self.after
    }

    pub const fn before(&self) -> Option<DateKey> {
        self.before
    }

    pub fn subjects(&self) -> Option<&[String]> {
        self.subjects.as_deref()
    }

    /// Whether nothing would be filtered.
    pub const fn is_empty(&self) -> bool {
        self.after.is_none() && self.before.is_none() && self.subjects.is_none()
    }

    const fn has_date_bounds(&self) -> bool {
        self.after.is_some() || self.before.is_some()
    }

    fn date_matches(&self, date: DateKey) -> bool {
        match (self.after, self.before) {
            (None, None) => true,
            (Some(after), None) => date > after,
            (None, Some(before)) => date < before,
            (Some(after), Some(before)) => date > after && date < before,
        }
    }

    fn key_matches(&self, key: &str) -> bool {
        if !self.has_date_bounds() {
            return true;
        }
        match DateKey::parse(key) {
            Ok(date) => self.date_matches(date),
            Err(err) => {
                tracing::warn!(key, error = %err, "dropping bucket with unparsable date key");
                false
            }
        }
    }

    /// Produces the filtered collection; `registers` itself is never modified.
    pub fn apply(&self, registers: &Map<Registers>) -> Result<Map<Registers>, MapError> {
        let mut selected = copy_matching(registers, |key| self.key_matches(key))?;

        if let Some(subjects) = &self.subjects {
            if selected.is_empty() {
                tracing::debug!("date bounds matched nothing; applying subjects to all dates");
                selected = copy_matching(registers, |_| true)?;
            }
            selected.for_each_mut(|_, bucket| {
                bucket.retain(|subject, _| subjects.iter().any(|allowed| allowed == subject));
            });
        }

        tracing::debug!(
            input = registers.len(),
            output = selected.len(),
            "filtered registers"
        );
        Ok(selected)
    }
}

fn copy_matching<F>(registers: &Map<Registers>, mut keep: F) -> Result<Map<Registers>, MapError>
where
    F: FnMut(&str) -> bool,
{
    let mut copy = Map::new()?;
    for (key, bucket) in registers {
        if keep(key) {
            copy.put(key, bucket.clone())?;
        }
    }
    Ok(copy)
}

/// Filters `registers` with `spec`.
pub fn apply(spec: &FilterSpec, registers: &Map<Registers>) -> Result<Map<Registers>, MapError> {
    spec.apply(registers)
}
