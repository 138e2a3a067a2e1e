//! Date ranges and epoch sequences.
//!
//! The configuration expresses epoch length and stride as compact duration
//! strings (`1y`, `3m`, `14d`); `date_sequence` expands the overall span into
//! the per-epoch ranges that tasks are generated for.

use std::fmt;
use std::str::FromStr;

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    /// Intersection of two ranges, `None` when disjoint.
    pub fn intersect(&self, other: &DateRange) -> Option<DateRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(DateRange { start, end })
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DurationUnit {
    Years,
    Months,
    Days,
}

/// A calendar duration such as `1y`, `3m` or `14d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DurationSpec {
    pub count: u32,
    pub unit: DurationUnit,
}

#[derive(Debug, Error)]
#[error("Invalid duration '{0}': expected a positive count and unit, e.g. '1y', '3m', '14d'")]
pub struct DurationParseError(String);

impl DurationSpec {
    pub fn new(count: u32, unit: DurationUnit) -> Self {
        Self { count, unit }
    }

    /// Advance a date by this duration. Month/year arithmetic clamps to the
    /// end of the month the way chrono does (Jan 31 + 1m = Feb 28/29).
    pub fn add_to(&self, date: NaiveDate) -> NaiveDate {
        match self.unit {
            DurationUnit::Years => date + Months::new(self.count * 12),
            DurationUnit::Months => date + Months::new(self.count),
            DurationUnit::Days => date + Days::new(self.count as u64),
        }
    }
}

impl fmt::Display for DurationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            DurationUnit::Years => 'y',
            DurationUnit::Months => 'm',
            DurationUnit::Days => 'd',
        };
        write!(f, "{}{}", self.count, unit)
    }
}

impl FromStr for DurationSpec {
    type Err = DurationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (count, unit) = trimmed.split_at(trimmed.len().saturating_sub(1));
        let unit = match unit {
            "y" => DurationUnit::Years,
            "m" => DurationUnit::Months,
            "d" => DurationUnit::Days,
            _ => return Err(DurationParseError(s.to_string())),
        };
        let count: u32 = count
            .trim()
            .parse()
            .map_err(|_| DurationParseError(s.to_string()))?;
        if count == 0 {
            return Err(DurationParseError(s.to_string()));
        }
        Ok(Self { count, unit })
    }
}

impl Serialize for DurationSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DurationSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Expand `[start, end]` into epochs of `duration`, stepping by `step`.
///
/// Epochs are emitted while they fit entirely inside the span; a trailing
/// partial epoch is dropped. `step == duration` gives back-to-back epochs,
/// `step < duration` sliding windows.
pub fn date_sequence(
    start: NaiveDate,
    end: NaiveDate,
    duration: DurationSpec,
    step: DurationSpec,
) -> Vec<DateRange> {
    let mut epochs = Vec::new();
    let mut epoch_start = start;
    loop {
        let epoch_end = duration.add_to(epoch_start);
        if epoch_end > end {
            break;
        }
        epochs.push(DateRange::new(epoch_start, epoch_end));
        epoch_start = step.add_to(epoch_start);
    }
    epochs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(
            "1y".parse::<DurationSpec>().unwrap(),
            DurationSpec::new(1, DurationUnit::Years)
        );
        assert_eq!(
            "3m".parse::<DurationSpec>().unwrap(),
            DurationSpec::new(3, DurationUnit::Months)
        );
        assert_eq!(
            "14d".parse::<DurationSpec>().unwrap(),
            DurationSpec::new(14, DurationUnit::Days)
        );
        assert!("".parse::<DurationSpec>().is_err());
        assert!("0m".parse::<DurationSpec>().is_err());
        assert!("1w".parse::<DurationSpec>().is_err());
        assert!("m".parse::<DurationSpec>().is_err());
    }

    #[test]
    fn test_duration_display_roundtrip() {
        for s in ["1y", "3m", "14d"] {
            assert_eq!(s.parse::<DurationSpec>().unwrap().to_string(), s);
        }
    }

    #[test]
    fn test_monthly_sequence() {
        let one_month = "1m".parse().unwrap();
        let epochs = date_sequence(d(2017, 7, 1), d(2018, 7, 1), one_month, one_month);
        assert_eq!(epochs.len(), 12);
        assert_eq!(epochs[0], DateRange::new(d(2017, 7, 1), d(2017, 8, 1)));
        assert_eq!(epochs[11], DateRange::new(d(2018, 6, 1), d(2018, 7, 1)));
    }

    #[test]
    fn test_partial_trailing_epoch_dropped() {
        let epochs = date_sequence(
            d(2017, 1, 1),
            d(2017, 3, 15),
            "1m".parse().unwrap(),
            "1m".parse().unwrap(),
        );
        // Jan and Feb fit; the March epoch would run past the 15th.
        assert_eq!(epochs.len(), 2);
    }

    #[test]
    fn test_sliding_windows() {
        let epochs = date_sequence(
            d(2017, 1, 1),
            d(2017, 6, 1),
            "3m".parse().unwrap(),
            "1m".parse().unwrap(),
        );
        assert_eq!(epochs.len(), 3);
        assert_eq!(epochs[0], DateRange::new(d(2017, 1, 1), d(2017, 4, 1)));
        assert_eq!(epochs[2], DateRange::new(d(2017, 3, 1), d(2017, 6, 1)));
    }

    #[test]
    fn test_empty_when_span_too_short() {
        let epochs = date_sequence(
            d(2017, 1, 1),
            d(2017, 1, 20),
            "1m".parse().unwrap(),
            "1m".parse().unwrap(),
        );
        assert!(epochs.is_empty());
    }

    #[test]
    fn test_range_intersect() {
        let a = DateRange::new(d(2017, 1, 1), d(2017, 6, 1));
        let b = DateRange::new(d(2017, 4, 1), d(2017, 9, 1));
        assert_eq!(
            a.intersect(&b),
            Some(DateRange::new(d(2017, 4, 1), d(2017, 6, 1)))
        );

        let c = DateRange::new(d(2018, 1, 1), d(2018, 2, 1));
        assert_eq!(a.intersect(&c), None);
    }
}
