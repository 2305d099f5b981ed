// Relative time expressions and the query time window
use crate::error::{PlotError, Result};
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::str::FromStr;

/// A parsed time expression: `now`, `-<n>m` or `-<n>h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeTime {
    Now,
    MinutesAgo(u32),
    HoursAgo(u32),
}

impl RelativeTime {
    /// Resolve against the given evaluation instant.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        now.checked_sub_signed(self.offset())
            .ok_or_else(|| PlotError::MalformedTime(self.to_string()))
    }

    /// Distance back from the evaluation instant.
    pub fn offset(&self) -> Duration {
        match *self {
            RelativeTime::Now => Duration::zero(),
            RelativeTime::MinutesAgo(n) => Duration::minutes(i64::from(n)),
            RelativeTime::HoursAgo(n) => Duration::hours(i64::from(n)),
        }
    }
}

impl fmt::Display for RelativeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelativeTime::Now => write!(f, "now"),
            RelativeTime::MinutesAgo(n) => write!(f, "-{n}m"),
            RelativeTime::HoursAgo(n) => write!(f, "-{n}h"),
        }
    }
}

impl FromStr for RelativeTime {
    type Err = PlotError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "now" {
            return Ok(RelativeTime::Now);
        }

        let malformed = || PlotError::MalformedTime(s.to_string());
        let body = s.strip_prefix('-').ok_or_else(malformed)?;

        let (magnitude, unit) = match body.char_indices().last() {
            Some((idx, unit)) => (&body[..idx], unit),
            None => return Err(malformed()),
        };

        if magnitude.is_empty() || !magnitude.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let n: u32 = magnitude.parse().map_err(|_| malformed())?;
        if n == 0 {
            return Err(malformed());
        }

        match unit {
            'm' => Ok(RelativeTime::MinutesAgo(n)),
            'h' => Ok(RelativeTime::HoursAgo(n)),
            _ => Err(malformed()),
        }
    }
}

/// Well-formed check that must pass before an expression is resolved.
pub fn time_format_ok(s: &str) -> bool {
    s.parse::<RelativeTime>().is_ok()
}

/// Resolve a time expression against `now`.
pub fn parse_time(s: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    s.parse::<RelativeTime>()?.resolve(now)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Build a window from two absolute instants. They must differ.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start == end {
            return Err(PlotError::InvalidTimeFrame {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// Validate both expressions, then resolve them against the same instant.
    pub fn from_exprs(start: &str, end: &str, now: DateTime<Utc>) -> Result<Self> {
        if !time_format_ok(start) {
            return Err(PlotError::MalformedTime(start.to_string()));
        }
        if !time_format_ok(end) {
            return Err(PlotError::MalformedTime(end.to_string()));
        }

        let invalid = || PlotError::InvalidTimeFrame {
            start: start.to_string(),
            end: end.to_string(),
        };
        if start == end {
            return Err(invalid());
        }

        let window = Self {
            start: parse_time(start, now)?,
            end: parse_time(end, now)?,
        };
        if window.start == window.end {
            return Err(invalid());
        }

        tracing::debug!(start = %window.start, end = %window.end, "resolved time window");
        Ok(window)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn width(&self) -> Duration {
        self.end - self.start
    }
}
