//! Cross-file aggregation keyed by date.

use crate::date::DateKey;
use crate::interpret::{ParsedFile, Registers};
use crate::map::{Map, MapError};

/// Registers and unit durations accumulated over a run, one bucket per date.
///
/// Built once per run, fed every interpreted file in order, then handed to
/// filtering and reporting.
#[derive(Debug, Clone)]
pub struct Aggregate {
    registers: Map<Registers>,
    durations: Map<u32>,
}

impl Aggregate {
    pub fn new() -> Result<Self, MapError> {
        Ok(Self {
            registers: Map::new()?,
            durations: Map::new()?,
        })
    }

    /// Folds one file into the bucket for its date.
    ///
    /// The first file for a date becomes the bucket; later files add their
    /// counts subject by subject. The date's unit duration is always taken from
    /// the most recently merged file.
    pub fn merge(&mut self, file: ParsedFile) -> Result<(), MapError> {
        let key = file.date.to_string();

        if let Some(bucket) = self.registers.get_mut(&key) {
            bucket.merge_counts(&file.registers)?;
        } else {
            self.registers.put(&key, file.registers)?;
        }

        if let Some(previous) = self.durations.put(&key, file.duration_minutes)? {
            if previous != file.duration_minutes {
                tracing::debug!(
                    date = %key,
                    previous,
                    current = file.duration_minutes,
                    path = %file.path.display(),
                    "unit duration replaced by later file"
                );
            }
        }

        tracing::debug!(date = %key, path = %file.path.display(), "merged file");
        Ok(())
    }

    /// Date key -> subject counts.
    pub const fn registers(&self) -> &Map<Registers> {
        &self.registers
    }

    /// Date key -> minutes per unit.
    pub const fn durations(&self) -> &Map<u32> {
        &self.durations
    }

    pub fn bucket(&self, date: DateKey) -> Option<&Registers> {
        self.registers.get(&date.to_string())
    }

    pub fn duration(&self, date: DateKey) -> Option<u32> {
        self.durations.get(&date.to_string()).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// Ends the run, returning the two collections.
    pub fn into_parts(self) -> (Map<Registers>, Map<u32>) {
        (self.registers, self.durations)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn file(date: &str, duration: u32, pairs: &[(&str, u32)]) -> ParsedFile {
        let mut registers = Registers::new().unwrap();
        for (subject, units) in pairs {
            registers.put(subject, *units).unwrap();
        }
        ParsedFile {
            path: PathBuf::from(format!("{}.pf", date.replace('/', "-"))),
            assignments: Map::new().unwrap(),
            registers,
            date: DateKey::parse(date).unwrap(),
            duration_minutes: duration,
        }
    }

    fn counts(pairs: &[(&str, u32)]) -> Registers {
        file("01/01/2026", 30, pairs).registers
    }

    #[test]
    fn test_single_file_into_empty_aggregate() {
        let mut aggregate = Aggregate::new().unwrap();
        aggregate.merge(file("01/02/2026", 25, &[("Math", 2)])).unwrap();

        let date = DateKey::parse("01/02/2026").unwrap();
        assert_eq!(aggregate.bucket(date), Some(&counts(&[("Math", 2)])));
        assert_eq!(aggregate.duration(date), Some(25));
        assert_eq!(aggregate.durations().get("01/02/2026"), Some(&25));
    }

    #[test]
    fn test_same_date_sums_per_subject() {
        let mut aggregate = Aggregate::new().unwrap();
        aggregate
            .merge(file("15/01/2026", 30, &[("Math", 3), ("Physics", 2)]))
            .unwrap();
        aggregate
            .merge(file("15/01/2026", 30, &[("Math", 1), ("Chemistry", 4)]))
            .unwrap();

        assert_eq!(aggregate.registers().len(), 1);
        assert_eq!(
            aggregate.registers().get("15/01/2026"),
            Some(&counts(&[("Math", 4), ("Physics", 2), ("Chemistry", 4)]))
        );
    }

    #[test]
    fn test_merge_order_does_not_change_counts() {
        let files = [
            file("15/01/2026", 30, &[("Math", 3), ("Physics", 2)]),
            file("15/01/2026", 30, &[("Math", 1)]),
            file("15/01/2026", 30, &[("Chemistry", 4), ("Physics", 1)]),
            file("16/01/2026", 30, &[("Math", 7)]),
        ];
        let orders: [[usize; 4]; 3] = [[0, 1, 2, 3], [3, 2, 1, 0], [1, 3, 0, 2]];

        let results: Vec<_> = orders
            .iter()
            .map(|order| {
                let mut aggregate = Aggregate::new().unwrap();
                for &index in order {
                    aggregate.merge(files[index].clone()).unwrap();
                }
                aggregate.into_parts().0
            })
            .collect();

        assert_eq!(results[0], results[1]);
        assert_eq!(results[1], results[2]);
        assert_eq!(
            results[0].get("15/01/2026"),
            Some(&counts(&[("Math", 4), ("Physics", 3), ("Chemistry", 4)]))
        );
    }

    #[test]
    fn test_last_file_sets_duration() {
        let mut aggregate = Aggregate::new().unwrap();
        aggregate.merge(file("15/01/2026", 25, &[("Math", 1)])).unwrap();
        aggregate.merge(file("15/01/2026", 50, &[("Math", 1)])).unwrap();

        assert_eq!(
            aggregate.duration(DateKey::parse("15/01/2026").unwrap()),
            Some(50)
        );
    }

    #[test]
    fn test_equivalent_dates_share_a_bucket() {
        let mut aggregate = Aggregate::new().unwrap();
        aggregate.merge(file("1/2/2026", 30, &[("Math", 1)])).unwrap();
        aggregate.merge(file("01/02/26", 30, &[("Math", 1)])).unwrap();

        assert_eq!(aggregate.registers().len(), 1);
        assert_eq!(
            aggregate.registers().get("01/02/2026"),
            Some(&counts(&[("Math", 2)]))
        );
    }
}
