//! Per-row and per-run population reports.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::apply::ApplyOutcome;
use crate::error::PopulationError;
use crate::naming::InstanceId;
use crate::temporal::EventContext;

/// Processing state of one row.
///
/// Rows move `Pending → Pass1Applied → Pass2Applied` and end in
/// `Succeeded` or `FailedPartial`. A row whose mandatory context cannot be
/// established goes straight to `Failed` and takes no part in pass 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowState {
    #[default]
    Pending,
    Pass1Applied,
    Pass2Applied,
    /// Every mapping entry applied cleanly.
    Succeeded,
    /// Instances were created, but some entries were skipped.
    FailedPartial,
    Failed,
}

impl RowState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::FailedPartial | Self::Failed)
    }

    /// Returns true if the row contributed to the graph.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Succeeded | Self::FailedPartial)
    }
}

/// What happened to one row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowReport {
    pub index: usize,
    pub state: RowState,
    /// Distinct instances created or reused by the row.
    pub instances: usize,
    pub attributes_applied: usize,
    pub relations_applied: usize,
    /// Skipped entries; none of them failed the row.
    pub issues: Vec<PopulationError>,
    /// Why the row failed, when it did.
    pub error: Option<PopulationError>,
}

impl RowReport {
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self {
            index,
            state: RowState::Pending,
            instances: 0,
            attributes_applied: 0,
            relations_applied: 0,
            issues: Vec::new(),
            error: None,
        }
    }

    pub(crate) fn absorb_attributes(&mut self, outcome: ApplyOutcome) {
        self.attributes_applied += outcome.applied;
        self.issues.extend(outcome.issues);
    }

    pub(crate) fn absorb_relations(&mut self, outcome: ApplyOutcome) {
        self.relations_applied += outcome.applied;
        self.issues.extend(outcome.issues);
    }

    pub(crate) fn fail(&mut self, error: PopulationError) {
        self.state = RowState::Failed;
        self.error = Some(error);
    }

    pub(crate) fn finish(&mut self) {
        if self.state == RowState::Pass2Applied {
            self.state = if self.issues.is_empty() {
                RowState::Succeeded
            } else {
                RowState::FailedPartial
            };
        }
    }
}

/// Outcome of the structural reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuralReport {
    /// Links created per `Type.relation`.
    pub links: BTreeMap<String, usize>,
    /// Sources with values that matched no target.
    pub unmatched: usize,
    pub issues: Vec<PopulationError>,
}

impl StructuralReport {
    #[must_use]
    pub fn total_links(&self) -> usize {
        self.links.values().sum()
    }
}

/// Result of populating a batch of rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulationReport {
    pub rows: Vec<RowReport>,
    /// Rows ending `Succeeded` or `FailedPartial`.
    pub succeeded: usize,
    /// Of `succeeded`, rows ending `FailedPartial`.
    pub partial: usize,
    pub failed: usize,
    /// Instances per entity type they were created as.
    pub created: BTreeMap<String, BTreeSet<InstanceId>>,
    /// Resource class name to its default position, as seen in pass 1.
    pub positions: BTreeMap<String, Option<i64>>,
    /// One entry per event created, in row order.
    pub event_contexts: Vec<EventContext>,
    pub structural: StructuralReport,
    /// Mapping entries skipped because the schema does not define them.
    pub mapping_issues: Vec<PopulationError>,
}

impl PopulationReport {
    pub(crate) fn new(mapping_issues: Vec<PopulationError>) -> Self {
        Self {
            mapping_issues,
            ..Self::default()
        }
    }

    pub(crate) fn track_created(&mut self, entity_type: &str, id: InstanceId) {
        self.created.entry(entity_type.to_string()).or_default().insert(id);
    }

    /// Records a class position. A known position is never replaced by `None`.
    pub(crate) fn track_position(&mut self, class: &str, position: Option<i64>) {
        let slot = self.positions.entry(class.to_string()).or_insert(None);
        if position.is_some() {
            *slot = position;
        }
    }

    pub(crate) fn tally(&mut self) {
        self.succeeded = self.rows.iter().filter(|r| r.state.is_success()).count();
        self.partial = self
            .rows
            .iter()
            .filter(|r| r.state == RowState::FailedPartial)
            .count();
        self.failed = self.rows.iter().filter(|r| r.state == RowState::Failed).count();
    }

    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of distinct instances created as a type.
    #[must_use]
    pub fn created_count(&self, entity_type: &str) -> usize {
        self.created.get(entity_type).map_or(0, BTreeSet::len)
    }

    /// Every skipped entry across all rows.
    pub fn issues(&self) -> impl Iterator<Item = (usize, &PopulationError)> {
        self.rows
            .iter()
            .flat_map(|r| r.issues.iter().map(move |i| (r.index, i)))
    }

    /// Rows that failed, with their error.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &PopulationError)> {
        self.rows
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| (r.index, e)))
    }
}
