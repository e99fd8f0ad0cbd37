//! Equipment sequence builder.
//!
//! Builds two orderings from the class positions tracked during pass 1:
//! a class-level "upstream of" chain, and per grouping context an
//! instance-level "immediately upstream of" chain through every sequenced
//! piece of equipment. Gaps in the data are reported as
//! [`SequenceDiagnostic`]s; nothing here fails.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::graph::{EntityInstance, IdentityRegistry};
use crate::naming::InstanceId;
use crate::value::Value;

/// Positions and schema names used by the sequence builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Class name to position, used unless a context overrides it.
    pub default_positions: BTreeMap<String, i64>,
    /// Context id to a complete replacement of `default_positions`.
    pub context_overrides: BTreeMap<String, BTreeMap<String, i64>>,
    pub equipment_type: String,
    pub class_type: String,
    pub class_key_attribute: String,
    pub class_relation: String,
    pub grouping_relation: String,
    /// Attribute of the grouping instance naming the context in `context_overrides`.
    pub context_id_attribute: String,
    /// Attribute ordering instances of one class within a context.
    pub sort_attribute: String,
    pub class_upstream_relation: String,
    pub instance_upstream_relation: String,
    /// Written on sequenced instances when the schema defines it.
    pub position_attribute: String,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        let default_positions = [
            ("Filler", 1),
            ("Cartoner", 2),
            ("Bundler", 3),
            ("CaseFormer", 4),
            ("CasePacker", 5),
            ("CaseSealer", 6),
            ("Palletizer", 7),
        ]
        .into_iter()
        .map(|(name, pos)| (name.to_string(), pos))
        .collect();
        Self {
            default_positions,
            context_overrides: BTreeMap::new(),
            equipment_type: "Equipment".to_string(),
            class_type: "EquipmentClass".to_string(),
            class_key_attribute: "equipmentClassId".to_string(),
            class_relation: "memberOfClass".to_string(),
            grouping_relation: "isPartOfProductionLine".to_string(),
            context_id_attribute: "lineId".to_string(),
            sort_attribute: "equipmentId".to_string(),
            class_upstream_relation: "classIsUpstreamOf".to_string(),
            instance_upstream_relation: "isImmediatelyUpstreamOf".to_string(),
            position_attribute: "sequencePosition".to_string(),
        }
    }
}

impl SequenceConfig {
    /// Default position of a class, matched case-insensitively.
    #[must_use]
    pub fn position_of(&self, class: &str) -> Option<i64> {
        lookup_ignore_case(&self.default_positions, class)
    }

    /// Known class names, in position order.
    #[must_use]
    pub fn known_classes(&self) -> Vec<&str> {
        let mut known: Vec<(&str, i64)> = self
            .default_positions
            .iter()
            .map(|(name, pos)| (name.as_str(), *pos))
            .collect();
        known.sort_by_key(|(name, pos)| (*pos, *name));
        known.into_iter().map(|(name, _)| name).collect()
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a non-positive position or a
    /// blank relation name.
    pub fn validate(self) -> Result<Self, ConfigError> {
        let tables = std::iter::once(("sequence.default_positions".to_string(), &self.default_positions)).chain(
            self.context_overrides
                .iter()
                .map(|(ctx, table)| (format!("sequence.context_overrides.{ctx}"), table)),
        );
        for (field, table) in tables {
            if let Some((class, pos)) = table.iter().find(|(_, pos)| **pos < 1) {
                return Err(ConfigError::invalid(
                    field,
                    format!("position of '{class}' must be at least 1 (got {pos})"),
                ));
            }
        }
        for (field, value) in [
            ("sequence.class_relation", &self.class_relation),
            ("sequence.grouping_relation", &self.grouping_relation),
            ("sequence.class_upstream_relation", &self.class_upstream_relation),
            ("sequence.instance_upstream_relation", &self.instance_upstream_relation),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(field, "must not be blank"));
            }
        }
        Ok(self)
    }
}

fn lookup_ignore_case(table: &BTreeMap<String, i64>, name: &str) -> Option<i64> {
    table
        .get(name)
        .or_else(|| table.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v))
        .copied()
}

/// A gap found while sequencing. None of these stop the builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SequenceDiagnostic {
    /// A class has no position. `context` is `None` at class level.
    NoSequencePosition {
        entity_type: String,
        context: Option<String>,
    },
    /// A context has equipment but none of its classes has a position.
    NoPositionsInContext { context: String },
    /// A positioned class has no equipment in a context.
    EmptyTypeInContext { context: String, entity_type: String },
    /// Equipment without a grouping context.
    UngroupedInstance { instance: String },
    /// Equipment without a class.
    UnclassifiedInstance { instance: String },
    /// A tracked class has no instance to link.
    MissingClassInstance { entity_type: String },
    /// A class differs only in letter case from a positioned class and was
    /// left out of the context's chain.
    ClassNameCollision {
        context: String,
        entity_type: String,
        positioned_as: String,
    },
    LinkFailed {
        source: String,
        target: String,
        reason: String,
    },
}

/// Outcome of a sequence build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceReport {
    /// Class order used at class level and as the default per context.
    pub class_order: Vec<(String, Option<i64>)>,
    pub class_links: usize,
    pub instance_links: usize,
    pub contexts: usize,
    pub overridden_contexts: usize,
    /// Instances that received a position attribute.
    pub positioned_instances: usize,
    pub diagnostics: Vec<SequenceDiagnostic>,
}

impl SequenceReport {
    /// Diagnostics about missing positions.
    pub fn missing_positions(&self) -> impl Iterator<Item = &SequenceDiagnostic> {
        self.diagnostics.iter().filter(|d| {
            matches!(
                d,
                SequenceDiagnostic::NoSequencePosition { .. } | SequenceDiagnostic::NoPositionsInContext { .. }
            )
        })
    }
}

/// Sorts tracked `(class, position)` pairs: by position, missing last, ties by name.
#[must_use]
pub fn class_order(positions: &BTreeMap<String, Option<i64>>) -> Vec<(String, Option<i64>)> {
    let mut order: Vec<(String, Option<i64>)> = positions.iter().map(|(k, v)| (k.clone(), *v)).collect();
    order.sort_by(|(a_name, a_pos), (b_name, b_pos)| match (a_pos, b_pos) {
        (Some(a), Some(b)) => a.cmp(b).then_with(|| a_name.cmp(b_name)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a_name.cmp(b_name),
    });
    order
}

struct Member {
    id: InstanceId,
    sort_key: String,
    name: String,
    entity_type: String,
}

/// Finds the members of a positioned class: the exact class name, or else
/// the only case-insensitive variant that no other position names exactly.
fn member_class<'m>(
    by_class: &'m BTreeMap<String, Vec<Member>>,
    ordering: &[(String, i64)],
    class: &str,
) -> Option<(&'m str, &'m Vec<Member>)> {
    if let Some((key, list)) = by_class.get_key_value(class) {
        return Some((key.as_str(), list));
    }
    let mut variants = by_class
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case(class) && !ordering.iter().any(|(o, _)| o == *k));
    match (variants.next(), variants.next()) {
        (Some((key, list)), None) => Some((key.as_str(), list)),
        _ => None,
    }
}

struct ContextMembers {
    id: InstanceId,
    context_id: String,
    by_class: BTreeMap<String, Vec<Member>>,
}

/// Equipment sequence builder.
#[derive(Debug, Clone, Default)]
pub struct SequenceBuilder {
    config: SequenceConfig,
}

impl SequenceBuilder {
    #[must_use]
    pub const fn new(config: SequenceConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &SequenceConfig {
        &self.config
    }

    /// Builds class-level and instance-level chains.
    pub fn build(&self, registry: &mut IdentityRegistry, positions: &BTreeMap<String, Option<i64>>) -> SequenceReport {
        let mut report = SequenceReport {
            class_order: class_order(positions),
            ..SequenceReport::default()
        };
        info!(classes = report.class_order.len(), "Building equipment sequences");

        self.link_classes(registry, &mut report);
        self.chain_instances(registry, &mut report);

        info!(
            class_links = report.class_links,
            instance_links = report.instance_links,
            contexts = report.contexts,
            diagnostics = report.diagnostics.len(),
            "Equipment sequences built"
        );
        report
    }

    fn link_classes(&self, registry: &mut IdentityRegistry, report: &mut SequenceReport) {
        let mut previous: Option<InstanceId> = None;
        let order = report.class_order.clone();
        for (class, position) in &order {
            if position.is_none() {
                warn!(class = %class, "Class has no sequence position; ordered last");
                report.diagnostics.push(SequenceDiagnostic::NoSequencePosition {
                    entity_type: class.clone(),
                    context: None,
                });
            }
            let Some(id) = registry.lookup(&self.config.class_type, class) else {
                warn!(class = %class, "Tracked class has no instance");
                report.diagnostics.push(SequenceDiagnostic::MissingClassInstance {
                    entity_type: class.clone(),
                });
                continue;
            };
            if let Some(upstream) = previous {
                if self.link(registry, upstream, &self.config.class_upstream_relation, id, report) {
                    report.class_links += 1;
                }
            }
            previous = Some(id);
        }
    }

    fn chain_instances(&self, registry: &mut IdentityRegistry, report: &mut SequenceReport) {
        let contexts = self.collect_contexts(registry, report);
        let default_order: Vec<(String, i64)> = report
            .class_order
            .iter()
            .filter_map(|(name, pos)| pos.map(|p| (name.clone(), p)))
            .collect();

        for (context, members) in contexts {
            report.contexts += 1;
            let ordering = match self.config.context_overrides.get(&members.context_id) {
                Some(table) => {
                    report.overridden_contexts += 1;
                    debug!(context = %context, "Using context override positions");
                    let tracked = table.iter().map(|(k, v)| (k.clone(), Some(*v))).collect();
                    class_order(&tracked)
                        .into_iter()
                        .filter_map(|(name, pos)| pos.map(|p| (name, p)))
                        .collect()
                }
                None => default_order.clone(),
            };

            let mut sequenced: Vec<&Vec<Member>> = Vec::new();
            let mut positions: Vec<i64> = Vec::new();
            let mut claimed: BTreeSet<&str> = BTreeSet::new();
            for (class, position) in &ordering {
                match member_class(&members.by_class, &ordering, class) {
                    Some((key, list)) => {
                        claimed.insert(key);
                        sequenced.push(list);
                        positions.push(*position);
                    }
                    None if members.by_class.keys().any(|k| k.eq_ignore_ascii_case(class)) => {}
                    None => report.diagnostics.push(SequenceDiagnostic::EmptyTypeInContext {
                        context: context.clone(),
                        entity_type: class.clone(),
                    }),
                }
            }
            for class in members.by_class.keys().filter(|k| !claimed.contains(k.as_str())) {
                let diagnostic = match ordering.iter().find(|(k, _)| k.eq_ignore_ascii_case(class)) {
                    Some((positioned, _)) => {
                        warn!(
                            context = %context,
                            class = %class,
                            positioned = %positioned,
                            "Class name differs only in case; not sequenced"
                        );
                        SequenceDiagnostic::ClassNameCollision {
                            context: context.clone(),
                            entity_type: class.clone(),
                            positioned_as: positioned.clone(),
                        }
                    }
                    None => {
                        warn!(context = %context, class = %class, "Class has no position in context; not sequenced");
                        SequenceDiagnostic::NoSequencePosition {
                            entity_type: class.clone(),
                            context: Some(context.clone()),
                        }
                    }
                };
                report.diagnostics.push(diagnostic);
            }
            if sequenced.is_empty() {
                warn!(context = %context, "No class positions resolvable in context");
                report.diagnostics.push(SequenceDiagnostic::NoPositionsInContext { context: context.clone() });
                continue;
            }

            let mut previous: Option<InstanceId> = None;
            for (list, position) in sequenced.into_iter().zip(positions) {
                for member in list {
                    self.write_position(registry, member, position, report);
                    if let Some(upstream) = previous {
                        if self.link(registry, upstream, &self.config.instance_upstream_relation, member.id, report) {
                            report.instance_links += 1;
                        }
                    }
                    previous = Some(member.id);
                }
            }
            debug!(context = %context, grouping = %registry.name_of(members.id), "Context sequenced");
        }
    }

    fn collect_contexts(
        &self,
        registry: &IdentityRegistry,
        report: &mut SequenceReport,
    ) -> BTreeMap<String, ContextMembers> {
        let mut contexts: BTreeMap<String, ContextMembers> = BTreeMap::new();
        for equipment in registry.instances_of(&self.config.equipment_type) {
            let Some(group) = equipment
                .related(&self.config.grouping_relation)
                .and_then(|g| registry.get(g))
            else {
                report.diagnostics.push(SequenceDiagnostic::UngroupedInstance {
                    instance: equipment.name().to_string(),
                });
                continue;
            };
            let Some(class) = equipment
                .related(&self.config.class_relation)
                .and_then(|c| registry.get(c))
                .map(|c| self.class_name(c))
            else {
                report.diagnostics.push(SequenceDiagnostic::UnclassifiedInstance {
                    instance: equipment.name().to_string(),
                });
                continue;
            };

            let sort_key = equipment
                .attribute(&self.config.sort_attribute)
                .map_or_else(|| equipment.name().to_string(), Value::to_key_string);
            let context_id = group
                .attribute(&self.config.context_id_attribute)
                .map_or_else(|| group.key().base().to_string(), Value::to_key_string);

            contexts
                .entry(group.name().to_string())
                .or_insert_with(|| ContextMembers {
                    id: group.id(),
                    context_id,
                    by_class: BTreeMap::new(),
                })
                .by_class
                .entry(class)
                .or_default()
                .push(Member {
                    id: equipment.id(),
                    sort_key,
                    name: equipment.name().to_string(),
                    entity_type: equipment.entity_type().to_string(),
                });
        }
        for members in contexts.values_mut() {
            for list in members.by_class.values_mut() {
                list.sort_by(|a, b| a.sort_key.cmp(&b.sort_key).then_with(|| a.name.cmp(&b.name)));
            }
        }
        contexts
    }

    fn class_name(&self, class: &EntityInstance) -> String {
        class
            .attribute(&self.config.class_key_attribute)
            .and_then(Value::as_text)
            .map_or_else(|| class.key().base().to_string(), str::to_string)
    }

    fn write_position(&self, registry: &mut IdentityRegistry, member: &Member, position: i64, report: &mut SequenceReport) {
        if registry
            .schema()
            .attribute(&member.entity_type, &self.config.position_attribute)
            .is_none()
        {
            return;
        }
        match registry.set_attribute(member.id, &self.config.position_attribute, Some(Value::Integer(position))) {
            Ok(_) => report.positioned_instances += 1,
            Err(e) => warn!(instance = %member.name, error = %e, "Could not record sequence position"),
        }
    }

    fn link(
        &self,
        registry: &mut IdentityRegistry,
        upstream: InstanceId,
        relation: &str,
        downstream: InstanceId,
        report: &mut SequenceReport,
    ) -> bool {
        match registry.set_relation(upstream, relation, Some(downstream)) {
            Ok(_) => {
                debug!(
                    upstream = %registry.name_of(upstream),
                    relation = %relation,
                    downstream = %registry.name_of(downstream),
                    "Sequence link"
                );
                true
            }
            Err(e) => {
                warn!(upstream = %registry.name_of(upstream), relation = %relation, error = %e, "Sequence link failed");
                report.diagnostics.push(SequenceDiagnostic::LinkFailed {
                    source: registry.name_of(upstream),
                    target: registry.name_of(downstream),
                    reason: e.to_string(),
                });
                false
            }
        }
    }
}
