//! Outcome and diagnostics of temporal linking.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Matching strategies, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Equipment interval lies within the buffered line interval.
    StrictContainment,
    /// At least half of the equipment interval overlaps the line interval.
    SignificantOverlap,
    /// Equipment start lies within the buffered line interval.
    StartContainment,
    /// Equipment end (recorded or inferred) lies within the buffered line interval.
    EndContainment,
    /// Disjoint, but closer than half the buffer. Heuristic; opt-in.
    Proximity,
}

impl MatchStrategy {
    pub const ALL: [Self; 5] = [
        Self::StrictContainment,
        Self::SignificantOverlap,
        Self::StartContainment,
        Self::EndContainment,
        Self::Proximity,
    ];
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StrictContainment => "strict containment",
            Self::SignificantOverlap => "significant overlap",
            Self::StartContainment => "start containment",
            Self::EndContainment => "end containment",
            Self::Proximity => "proximity",
        };
        f.write_str(name)
    }
}

/// Why an equipment event found no containing line event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// The grouping context has no line events, or none could be determined.
    NoCandidates,
    /// The nearest line event is further away than the buffer.
    GapTooLarge,
    /// Intervals overlap, but both ends fall outside the buffered line
    /// interval and the overlap is under half the equipment duration.
    OutsideRange,
    Other,
}

/// A structured entry for one unmatched equipment event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkFailure {
    pub event: String,
    pub resource: String,
    pub row: usize,
    pub category: FailureCategory,
    /// Nearest candidate line event, if any candidate existed.
    pub nearest: Option<String>,
    /// Distance to the nearest candidate in seconds (0 when overlapping).
    pub gap_seconds: Option<i64>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl LinkFailure {
    pub fn gap(&self) -> Option<Duration> {
        self.gap_seconds.map(Duration::seconds)
    }
}

/// Distribution of distances to the nearest candidate over failed links.
///
/// Only failures that had a candidate at a non-zero distance count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NearMissStats {
    pub count: usize,
    pub min_gap_seconds: Option<i64>,
    pub max_gap_seconds: Option<i64>,
    pub mean_gap_seconds: Option<f64>,
    /// Near misses that a doubled buffer would have reached.
    pub within_double_buffer: usize,
}

impl NearMissStats {
    #[must_use]
    pub fn from_failures(failures: &[LinkFailure], buffer: Duration) -> Self {
        let gaps: Vec<i64> = failures
            .iter()
            .filter_map(|f| f.gap_seconds)
            .filter(|g| *g > 0)
            .collect();
        if gaps.is_empty() {
            return Self::default();
        }
        let limit = (buffer * 2).num_seconds();
        #[allow(clippy::cast_precision_loss)]
        let mean = gaps.iter().sum::<i64>() as f64 / gaps.len() as f64;
        Self {
            count: gaps.len(),
            min_gap_seconds: gaps.iter().min().copied(),
            max_gap_seconds: gaps.iter().max().copied(),
            mean_gap_seconds: Some(mean),
            within_double_buffer: gaps.iter().filter(|g| **g <= limit).count(),
        }
    }
}

/// Result of a linking run. Never an error: unmatched events are reported here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkReport {
    pub line_events: usize,
    pub equipment_events: usize,
    pub links_created: usize,
    pub by_strategy: BTreeMap<MatchStrategy, usize>,
    pub failures: Vec<LinkFailure>,
    pub near_miss: NearMissStats,
}

impl LinkReport {
    /// Number of failures per category.
    #[must_use]
    pub fn category_counts(&self) -> BTreeMap<FailureCategory, usize> {
        let mut counts = BTreeMap::new();
        for failure in &self.failures {
            *counts.entry(failure.category).or_insert(0) += 1;
        }
        counts
    }

    #[must_use]
    pub fn matched_by(&self, strategy: MatchStrategy) -> usize {
        self.by_strategy.get(&strategy).copied().unwrap_or(0)
    }

    /// Share of equipment events that were linked, in `[0, 1]`.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.equipment_events == 0 {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.links_created as f64 / self.equipment_events as f64;
        rate
    }
}
