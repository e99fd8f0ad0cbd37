//! Attaches equipment-level events to the line-level event containing them.

use std::collections::{HashMap, HashSet};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::report::{FailureCategory, LinkFailure, LinkReport, MatchStrategy, NearMissStats};
use super::{EventContext, ResourceKind, TimeInterval};
use crate::error::ConfigError;
use crate::graph::IdentityRegistry;
use crate::naming::InstanceId;

/// Tunables of the temporal linker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    /// Tolerance applied around line event bounds.
    pub buffer_minutes: i64,
    /// Duration assumed for equipment events without a recorded end.
    pub default_duration_minutes: i64,
    /// Enables the proximity fallback, which links events that do not overlap.
    pub enable_proximity: bool,
    /// Relation set on the equipment event (single-valued).
    pub part_of_relation: String,
    /// Relation from a resource to its grouping instance, used when an
    /// event context carries no grouping.
    pub grouping_relation: String,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            buffer_minutes: 5,
            default_duration_minutes: 60,
            enable_proximity: false,
            part_of_relation: "isPartOfLineEvent".to_string(),
            grouping_relation: "isPartOfProductionLine".to_string(),
        }
    }
}

impl LinkerConfig {
    const MAX_BUFFER_MINUTES: i64 = 24 * 60;
    const MAX_DEFAULT_DURATION_MINUTES: i64 = 7 * 24 * 60;

    /// Checks the tunables are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a buffer outside zero to one day,
    /// a default duration outside one minute to one week, or blank relation
    /// names.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if !(0..=Self::MAX_BUFFER_MINUTES).contains(&self.buffer_minutes) {
            return Err(ConfigError::invalid(
                "linker.buffer_minutes",
                format!(
                    "must be between 0 and {} (got {})",
                    Self::MAX_BUFFER_MINUTES,
                    self.buffer_minutes
                ),
            ));
        }
        if !(1..=Self::MAX_DEFAULT_DURATION_MINUTES).contains(&self.default_duration_minutes) {
            return Err(ConfigError::invalid(
                "linker.default_duration_minutes",
                format!(
                    "must be between 1 and {} (got {})",
                    Self::MAX_DEFAULT_DURATION_MINUTES,
                    self.default_duration_minutes
                ),
            ));
        }
        if self.part_of_relation.trim().is_empty() {
            return Err(ConfigError::invalid("linker.part_of_relation", "must not be blank"));
        }
        if self.grouping_relation.trim().is_empty() {
            return Err(ConfigError::invalid("linker.grouping_relation", "must not be blank"));
        }
        Ok(self)
    }

    /// The buffer, clamped to the range [`Self::validate`] accepts.
    #[must_use]
    pub fn buffer(&self) -> Duration {
        Duration::minutes(self.buffer_minutes.clamp(0, Self::MAX_BUFFER_MINUTES))
    }

    /// The default duration, clamped to the range [`Self::validate`] accepts.
    #[must_use]
    pub fn default_duration(&self) -> Duration {
        Duration::minutes(
            self.default_duration_minutes
                .clamp(1, Self::MAX_DEFAULT_DURATION_MINUTES),
        )
    }
}

/// Temporal event linker.
///
/// Strategies are tried in [`MatchStrategy::ALL`] order; within a strategy,
/// candidates are tried by start time then name. The first hit wins.
#[derive(Debug, Clone, Default)]
pub struct TemporalLinker {
    config: LinkerConfig,
}

impl TemporalLinker {
    #[must_use]
    pub const fn new(config: LinkerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &LinkerConfig {
        &self.config
    }

    /// Links every equipment event context to a line event of its grouping.
    pub fn link(&self, registry: &mut IdentityRegistry, contexts: &[EventContext]) -> LinkReport {
        let buffer = self.config.buffer();
        let mut report = LinkReport::default();

        let mut lines_by_group: HashMap<InstanceId, Vec<&EventContext>> = HashMap::new();
        let mut seen_lines = HashSet::new();
        for ctx in contexts.iter().filter(|c| c.kind == ResourceKind::Line) {
            if !seen_lines.insert(ctx.event) {
                continue;
            }
            report.line_events += 1;
            if let Some(group) = self.grouping_of(registry, ctx) {
                lines_by_group.entry(group).or_default().push(ctx);
            }
        }
        for candidates in lines_by_group.values_mut() {
            candidates.sort_by(|a, b| {
                a.interval
                    .start
                    .cmp(&b.interval.start)
                    .then_with(|| registry.name_of(a.event).cmp(&registry.name_of(b.event)))
            });
        }

        info!(
            line_events = report.line_events,
            groups = lines_by_group.len(),
            buffer_minutes = self.config.buffer_minutes,
            proximity = self.config.enable_proximity,
            "Temporal linking started"
        );

        let mut seen_equipment = HashSet::new();
        for ctx in contexts.iter().filter(|c| c.kind == ResourceKind::Equipment) {
            if !seen_equipment.insert(ctx.event) {
                continue;
            }
            report.equipment_events += 1;

            let candidates: &[&EventContext] = self
                .grouping_of(registry, ctx)
                .and_then(|g| lines_by_group.get(&g))
                .map_or(&[], Vec::as_slice);

            match self.find_match(&ctx.interval, candidates) {
                Some((strategy, line)) => {
                    match registry.set_relation(ctx.event, &self.config.part_of_relation, Some(line.event)) {
                        Ok(_) => {
                            debug!(
                                event = %registry.name_of(ctx.event),
                                line_event = %registry.name_of(line.event),
                                strategy = %strategy,
                                "Linked equipment event"
                            );
                            report.links_created += 1;
                            *report.by_strategy.entry(strategy).or_insert(0) += 1;
                        }
                        Err(e) => {
                            warn!(event = %registry.name_of(ctx.event), error = %e, "Failed to set line event relation");
                            report.failures.push(LinkFailure {
                                event: registry.name_of(ctx.event),
                                resource: registry.name_of(ctx.resource),
                                row: ctx.row,
                                category: FailureCategory::Other,
                                nearest: Some(registry.name_of(line.event)),
                                gap_seconds: Some(0),
                                detail: Some(e.to_string()),
                            });
                        }
                    }
                }
                None => {
                    let failure = self.classify(registry, ctx, candidates);
                    warn!(
                        event = %failure.event,
                        row = failure.row,
                        category = ?failure.category,
                        nearest = ?failure.nearest,
                        gap_seconds = ?failure.gap_seconds,
                        "No containing line event"
                    );
                    report.failures.push(failure);
                }
            }
        }

        report.near_miss = NearMissStats::from_failures(&report.failures, buffer);
        info!(
            equipment_events = report.equipment_events,
            links = report.links_created,
            failures = report.failures.len(),
            "Temporal linking finished"
        );
        report
    }

    fn grouping_of(&self, registry: &IdentityRegistry, ctx: &EventContext) -> Option<InstanceId> {
        ctx.grouping.or_else(|| {
            registry
                .get(ctx.resource)?
                .related(&self.config.grouping_relation)
        })
    }

    fn find_match<'c>(
        &self,
        equipment: &TimeInterval,
        candidates: &[&'c EventContext],
    ) -> Option<(MatchStrategy, &'c EventContext)> {
        MatchStrategy::ALL
            .into_iter()
            .filter(|s| *s != MatchStrategy::Proximity || self.config.enable_proximity)
            .find_map(|strategy| {
                candidates
                    .iter()
                    .find(|line| self.matches(strategy, equipment, &line.interval))
                    .map(|line| (strategy, *line))
            })
    }

    fn matches(&self, strategy: MatchStrategy, equipment: &TimeInterval, line: &TimeInterval) -> bool {
        let buffer = self.config.buffer();
        let assumed = self.config.default_duration();
        match strategy {
            MatchStrategy::StrictContainment => line.encloses_buffered(equipment, buffer),
            MatchStrategy::SignificantOverlap => match (equipment.duration(), line.overlap(equipment)) {
                (Some(duration), Some(overlap)) if duration > Duration::zero() => overlap * 2 >= duration,
                _ => false,
            },
            MatchStrategy::StartContainment => line.contains_buffered(equipment.start, buffer),
            MatchStrategy::EndContainment => line.contains_buffered(equipment.effective_end(assumed), buffer),
            MatchStrategy::Proximity => {
                let closed = equipment.closed_with(assumed);
                !line.overlaps(&closed) && line.gap(&closed) <= buffer / 2
            }
        }
    }

    fn classify(&self, registry: &IdentityRegistry, ctx: &EventContext, candidates: &[&EventContext]) -> LinkFailure {
        let closed = ctx.interval.closed_with(self.config.default_duration());
        let nearest = candidates
            .iter()
            .map(|c| (c, c.interval.gap(&closed)))
            .min_by_key(|(_, gap)| *gap);

        let (category, nearest_name, gap_seconds, detail) = match nearest {
            None => {
                let detail = if self.grouping_of(registry, ctx).is_none() {
                    "no grouping context"
                } else {
                    "no line events in grouping context"
                };
                (FailureCategory::NoCandidates, None, None, Some(detail.to_string()))
            }
            Some((line, gap)) => {
                let category = if gap > self.config.buffer() {
                    FailureCategory::GapTooLarge
                } else if gap == Duration::zero() {
                    FailureCategory::OutsideRange
                } else {
                    FailureCategory::Other
                };
                (category, Some(registry.name_of(line.event)), Some(gap.num_seconds()), None)
            }
        };

        LinkFailure {
            event: registry.name_of(ctx.event),
            resource: registry.name_of(ctx.resource),
            row: ctx.row,
            category,
            nearest: nearest_name,
            gap_seconds,
            detail,
        }
    }
}
