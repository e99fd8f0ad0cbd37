//! Temporal reconciliation of event records.
//!
//! Line-level events are coarse-grained; equipment-level events nest inside
//! them in time. The [`TemporalLinker`] attaches each equipment event to the
//! line event of the same grouping context that contains it.

mod interval;
mod linker;
mod report;

use serde::{Deserialize, Serialize};

use crate::naming::InstanceId;

pub use interval::TimeInterval;
pub use linker::{LinkerConfig, TemporalLinker};
pub use report::{FailureCategory, LinkFailure, LinkReport, MatchStrategy, NearMissStats};

/// Whether an event was recorded against a whole line or one machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Line,
    Equipment,
}

/// An event created during population, with what the linker needs to place it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    pub event: InstanceId,
    pub resource: InstanceId,
    pub kind: ResourceKind,
    /// Grouping instance (e.g. the production line) the row belonged to.
    pub grouping: Option<InstanceId>,
    pub interval: TimeInterval,
    /// Source row index.
    pub row: usize,
}
