//! Event time intervals.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A closed interval `[start, end]` with an optional end.
///
/// Times are wall-clock (offset-free) as recorded by the source system. An
/// interval without an end is still running, or its end was not recorded.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, NaiveDate};
/// use plantgraph::TimeInterval;
///
/// let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(10, 0, 0).unwrap();
/// let open = TimeInterval::starting_at(start);
///
/// assert!(open.is_open_ended());
/// assert_eq!(open.effective_end(Duration::hours(1)), start + Duration::hours(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeInterval {
    /// Start of the interval (inclusive).
    pub start: NaiveDateTime,

    /// End of the interval (inclusive). None means open-ended.
    pub end: Option<NaiveDateTime>,
}

impl TimeInterval {
    /// Creates an interval.
    ///
    /// Returns `None` if `end` precedes `start`.
    #[must_use]
    pub fn new(start: NaiveDateTime, end: Option<NaiveDateTime>) -> Option<Self> {
        match end {
            Some(end) if end < start => None,
            _ => Some(Self { start, end }),
        }
    }

    /// Creates a bounded interval. Returns `None` if `end` precedes `start`.
    #[must_use]
    pub fn bounded(start: NaiveDateTime, end: NaiveDateTime) -> Option<Self> {
        Self::new(start, Some(end))
    }

    #[must_use]
    pub const fn starting_at(start: NaiveDateTime) -> Self {
        Self { start, end: None }
    }

    pub const fn is_open_ended(&self) -> bool {
        self.end.is_none()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.end.map(|end| end - self.start)
    }

    /// Returns the recorded end, or `start + assumed` when there is none.
    #[must_use]
    pub fn effective_end(&self, assumed: Duration) -> NaiveDateTime {
        self.end.unwrap_or(self.start + assumed)
    }

    /// Returns this interval with an end, inferring one from `assumed` if needed.
    #[must_use]
    pub fn closed_with(&self, assumed: Duration) -> Self {
        Self {
            start: self.start,
            end: Some(self.effective_end(assumed)),
        }
    }

    /// Check if a timestamp falls within `[start - buffer, end + buffer]`.
    ///
    /// An open-ended interval has no upper bound.
    #[must_use]
    pub fn contains_buffered(&self, time: NaiveDateTime, buffer: Duration) -> bool {
        time >= self.start - buffer && self.end.map_or(true, |end| time <= end + buffer)
    }

    /// Check if `other` lies within this interval widened by `buffer`.
    ///
    /// Both intervals must be bounded.
    #[must_use]
    pub fn encloses_buffered(&self, other: &Self, buffer: Duration) -> bool {
        match (self.end, other.end) {
            (Some(end), Some(other_end)) => other.start >= self.start - buffer && other_end <= end + buffer,
            _ => false,
        }
    }

    /// Returns the length of the overlap between two intervals.
    ///
    /// Open-ended intervals extend without bound. Returns `None` when the
    /// intervals do not overlap.
    #[must_use]
    pub fn overlap(&self, other: &Self) -> Option<Duration> {
        let from = self.start.max(other.start);
        let to = match (self.end, other.end) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => return Some(Duration::MAX),
        };
        (to >= from).then(|| to - from)
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.overlap(other).is_some()
    }

    /// Returns the distance between two intervals, zero if they overlap.
    #[must_use]
    pub fn gap(&self, other: &Self) -> Duration {
        if self.overlaps(other) {
            return Duration::zero();
        }
        match (self.end, other.end) {
            (Some(end), _) if end < other.start => other.start - end,
            (_, Some(other_end)) if other_end < self.start => self.start - other_end,
            _ => Duration::zero(),
        }
    }
}

impl std::fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.end {
            Some(end) => write!(f, "[{}, {}]", self.start, end),
            None => write!(f, "[{}, ...)", self.start),
        }
    }
}
