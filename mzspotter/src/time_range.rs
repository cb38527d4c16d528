use std::{num::ParseFloatError, ops::Range, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A closed interval of retention time, in minutes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time <= self.end
    }

    pub fn is_bounded(&self) -> bool {
        self.end.is_finite()
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: f64::INFINITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimeRangeParseError {
    #[error("Failed to parse time range start {0}")]
    MalformedStart(ParseFloatError),
    #[error("Failed to parse time range end {0}")]
    MalformedEnd(ParseFloatError),
    #[error("The time range start {0} is after its end {1}")]
    Inverted(f64, f64),
}

fn parse_bound(
    token: Option<&str>,
    missing: f64,
    wrap: fn(ParseFloatError) -> TimeRangeParseError,
) -> Result<f64, TimeRangeParseError> {
    match token.map(str::trim) {
        None | Some("") => Ok(missing),
        Some(s) => s.parse().map_err(wrap),
    }
}

impl FromStr for TimeRange {
    type Err = TimeRangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let separator = [' ', ':', '-']
            .into_iter()
            .find(|c| s.contains(*c))
            .unwrap_or(' ');
        let mut tokens = s.splitn(2, separator);
        let start = parse_bound(tokens.next(), 0.0, TimeRangeParseError::MalformedStart)?;
        let end = parse_bound(tokens.next(), f64::INFINITY, TimeRangeParseError::MalformedEnd)?;
        if start > end {
            return Err(TimeRangeParseError::Inverted(start, end));
        }
        Ok(TimeRange { start, end })
    }
}

impl From<Range<f64>> for TimeRange {
    fn from(value: Range<f64>) -> Self {
        Self::new(value.start, value.end)
    }
}

impl From<(f64, f64)> for TimeRange {
    fn from(value: (f64, f64)) -> Self {
        Self::new(value.0, value.1)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_time_fromstr() -> Result<(), TimeRangeParseError> {
        let t: TimeRange = "12.5-".parse()?;
        assert_eq!(t.start, 12.5);
        assert_eq!(t.end, f64::INFINITY);
        assert!(!t.is_bounded());

        let t: TimeRange = "-30".parse()?;
        assert_eq!(t.start, 0.0);
        assert_eq!(t.end, 30.0);

        let t: TimeRange = "2:8.25".parse()?;
        assert_eq!(t, TimeRange::new(2.0, 8.25));
        assert!(t.contains(8.25));
        assert!(!t.contains(8.3));

        let t: TimeRange = "-".parse()?;
        assert_eq!(t, TimeRange::default());
        Ok(())
    }

    #[test]
    fn test_time_fromstr_malformed() {
        assert!(matches!(
            "a-".parse::<TimeRange>(),
            Err(TimeRangeParseError::MalformedStart(_))
        ));
        assert!(matches!(
            "-b".parse::<TimeRange>(),
            Err(TimeRangeParseError::MalformedEnd(_))
        ));
        assert!(matches!(
            "a-b".parse::<TimeRange>(),
            Err(TimeRangeParseError::MalformedStart(_))
        ));
        assert!(matches!(
            "10-5".parse::<TimeRange>(),
            Err(TimeRangeParseError::Inverted(_, _))
        ));
    }
}
