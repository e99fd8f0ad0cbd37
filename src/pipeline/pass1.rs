//! Pass 1: instance creation and scalar attributes.

use std::iter;

use tracing::{debug, warn};

use super::report::{PopulationReport, RowReport};
use crate::apply::{apply_attributes, RowInstances};
use crate::cast::cast_cell;
use crate::config::PopulationConfig;
use crate::error::PopulationError;
use crate::graph::IdentityRegistry;
use crate::layout::{parse_equipment_class, AuxiliaryEntity};
use crate::naming::{compose_base, InstanceId};
use crate::row::Row;
use crate::schema::SchemaMapping;
use crate::temporal::{EventContext, ResourceKind, TimeInterval};
use crate::value::{Value, ValueKind};

const KEY_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// What pass 1 produced for a row, consumed by pass 2.
#[derive(Debug, Clone, Default)]
pub(super) struct RowWork {
    pub instances: RowInstances,
    pub events: Vec<EventContext>,
}

/// Mutable state threaded through one row.
struct RowScope<'r> {
    row: &'r Row,
    lang: &'r str,
    work: RowWork,
    report: &'r mut RowReport,
    tracking: &'r mut PopulationReport,
}

pub(super) struct Pass1<'a> {
    pub mapping: &'a SchemaMapping,
    pub config: &'a PopulationConfig,
}

impl Pass1<'_> {
    /// Creates the row's instances and applies their attributes.
    ///
    /// # Errors
    ///
    /// Fails only when the mandatory context level cannot be established;
    /// every other problem is recorded on `report` and skipped.
    pub(super) fn run_row(
        &self,
        registry: &mut IdentityRegistry,
        row: &Row,
        report: &mut RowReport,
        tracking: &mut PopulationReport,
    ) -> Result<RowWork, PopulationError> {
        let lang = self.config.language.language_for(row);
        let mut scope = RowScope {
            row,
            lang,
            work: RowWork::default(),
            report,
            tracking,
        };

        let grouping = self.contexts(registry, &mut scope)?;
        let resource = self.resource(registry, grouping, &mut scope);
        for aux in &self.config.layout.auxiliaries {
            self.auxiliary(registry, aux, &mut scope);
        }
        if let Some((resource, kind)) = resource {
            self.event(registry, resource, kind, grouping, &mut scope);
        }

        scope.report.instances = scope.work.instances.len();
        Ok(scope.work)
    }

    fn key_value<'r>(&self, row: &'r Row, entity_type: &str, attribute: &str) -> Option<&'r str> {
        self.mapping
            .column_for(entity_type, attribute)
            .and_then(|column| row.get(column))
    }

    /// Gets or creates an instance, applies its mapped attributes and records it.
    fn instantiate(
        &self,
        registry: &mut IdentityRegistry,
        entity_type: &str,
        base: &str,
        labels: &[&str],
        scope: &mut RowScope<'_>,
    ) -> Result<InstanceId, PopulationError> {
        let id = registry.get_or_create(entity_type, base, labels)?;
        if let Some(mapping) = self.mapping.entity(entity_type) {
            let outcome = apply_attributes(registry, id, mapping, scope.row, scope.lang);
            scope.report.absorb_attributes(outcome);
        }
        scope.work.instances.record(entity_type, id);
        scope.tracking.track_created(entity_type, id);
        Ok(id)
    }

    fn contexts(
        &self,
        registry: &mut IdentityRegistry,
        scope: &mut RowScope<'_>,
    ) -> Result<Option<InstanceId>, PopulationError> {
        let layout = &self.config.layout;
        let mut grouping = None;
        for level in &layout.context {
            let Some(key) = self.key_value(scope.row, &level.entity_type, &level.key_attribute) else {
                if level.mandatory {
                    let reason = match self.mapping.column_for(&level.entity_type, &level.key_attribute) {
                        Some(column) => format!("column '{column}' is blank"),
                        None => format!("attribute '{}' is not mapped to a column", level.key_attribute),
                    };
                    return Err(PopulationError::MissingMandatoryContext {
                        row: scope.row.index(),
                        entity_type: level.entity_type.clone(),
                        reason,
                    });
                }
                debug!(row = scope.row.index(), entity_type = %level.entity_type, "Context level absent; lower levels skipped");
                break;
            };

            match self.instantiate(registry, &level.entity_type, key, &[key], scope) {
                Ok(id) => {
                    if level.entity_type == layout.grouping_type {
                        grouping = Some(id);
                    }
                }
                Err(e) if level.mandatory => return Err(e),
                Err(e) => {
                    warn!(row = scope.row.index(), entity_type = %level.entity_type, error = %e, "Context level skipped");
                    scope.report.issues.push(e);
                    break;
                }
            }
        }
        Ok(grouping)
    }

    fn resource(
        &self,
        registry: &mut IdentityRegistry,
        grouping: Option<InstanceId>,
        scope: &mut RowScope<'_>,
    ) -> Option<(InstanceId, ResourceKind)> {
        let layout = &self.config.layout;
        let res = &layout.resource;

        if res.is_line_kind(scope.row.get(&res.kind_column)) {
            let Some(line) = grouping else {
                warn!(row = scope.row.index(), "Line row without a grouping context; no resource");
                return None;
            };
            scope.work.instances.alias(&layout.resource_key, line);
            return Some((line, ResourceKind::Line));
        }

        let row = scope.row;
        let Some(key) = self.key_value(row, &res.equipment_type, &res.key_attribute) else {
            debug!(row = row.index(), "Row has no equipment identifier");
            return None;
        };
        let name = self.key_value(row, &res.equipment_type, &res.name_attribute);
        let labels: Vec<&str> = name.into_iter().collect();
        let equipment = match self.instantiate(registry, &res.equipment_type, key, &labels, scope) {
            Ok(id) => id,
            Err(e) => {
                warn!(row = row.index(), error = %e, "Equipment skipped");
                scope.report.issues.push(e);
                return None;
            }
        };
        self.classify(registry, name.unwrap_or(key), scope);
        scope.work.instances.alias(&layout.resource_key, equipment);
        Some((equipment, ResourceKind::Equipment))
    }

    /// Creates the equipment's class and tracks its default position.
    fn classify(&self, registry: &mut IdentityRegistry, equipment_name: &str, scope: &mut RowScope<'_>) {
        let res = &self.config.layout.resource;
        let sequence = &self.config.sequence;
        let row = scope.row;

        let class_name = self
            .key_value(row, &res.class_type, &res.class_key_attribute)
            .map(str::to_string)
            .or_else(|| parse_equipment_class(equipment_name, sequence.known_classes()))
            .unwrap_or_else(|| {
                warn!(row = row.index(), equipment = %equipment_name, fallback = %res.fallback_class, "Equipment class undetermined");
                res.fallback_class.clone()
            });

        let class = match self.instantiate(registry, &res.class_type, &class_name, &[class_name.as_str()], scope) {
            Ok(id) => id,
            Err(e) => {
                warn!(row = row.index(), class = %class_name, error = %e, "Equipment class skipped");
                scope.report.issues.push(e);
                return;
            }
        };
        if let Err(e) = registry.set_attribute(class, &res.class_key_attribute, Some(Value::from(class_name.as_str()))) {
            scope.report.issues.push(e);
        }

        let position = sequence.position_of(&class_name);
        let has_position_attribute = registry
            .schema()
            .attribute(&res.class_type, &res.class_position_attribute)
            .is_some();
        if let (Some(position), true) = (position, has_position_attribute) {
            if let Err(e) = registry.set_attribute(class, &res.class_position_attribute, Some(Value::Integer(position))) {
                scope.report.issues.push(e);
            }
        }
        scope.tracking.track_position(&class_name, position);
    }

    fn auxiliary(&self, registry: &mut IdentityRegistry, aux: &AuxiliaryEntity, scope: &mut RowScope<'_>) {
        let row = scope.row;
        let Some((first, rest)) = aux.key_attributes.split_first() else {
            return;
        };
        let primary = self.key_value(row, &aux.entity_type, first).or_else(|| {
            aux.fallback_attribute
                .as_deref()
                .and_then(|a| self.key_value(row, &aux.entity_type, a))
        });
        let Some(primary) = primary else {
            return;
        };
        let parts = iter::once(primary).chain(rest.iter().filter_map(|a| self.key_value(row, &aux.entity_type, a)));
        let Some(base) = compose_base(parts) else {
            return;
        };
        if let Err(e) = self.instantiate(registry, &aux.entity_type, &base, &[], scope) {
            warn!(row = row.index(), entity_type = %aux.entity_type, error = %e, "Auxiliary instance skipped");
            scope.report.issues.push(e);
        }
    }

    fn event(
        &self,
        registry: &mut IdentityRegistry,
        resource: InstanceId,
        kind: ResourceKind,
        grouping: Option<InstanceId>,
        scope: &mut RowScope<'_>,
    ) {
        let layout = &self.config.layout.event;
        let row = scope.row;

        let Some(start) = self.timestamp(&layout.interval_type, &layout.start_attribute, scope) else {
            debug!(row = row.index(), "Row has no start time; no event");
            return;
        };
        let end = self.timestamp(&layout.interval_type, &layout.end_attribute, scope);
        let interval = TimeInterval::new(start, end).unwrap_or_else(|| {
            warn!(row = row.index(), "Event ends before it starts; treated as open-ended");
            TimeInterval::starting_at(start)
        });

        let resource_name = registry.name_of(resource);
        let start_key = start.format(KEY_TIME_FORMAT).to_string();
        let end_key = interval
            .end
            .map_or_else(|| "open".to_string(), |end| end.format(KEY_TIME_FORMAT).to_string());

        let interval_base = format!("{resource_name}_{start_key}_{end_key}");
        if let Err(e) = self.instantiate(registry, &layout.interval_type, &interval_base, &[], scope) {
            warn!(row = row.index(), error = %e, "Time interval skipped");
            scope.report.issues.push(e);
            return;
        }

        let event_base = format!("{resource_name}_{start_key}");
        let event = match self.instantiate(registry, &layout.event_type, &event_base, &[], scope) {
            Ok(id) => id,
            Err(e) => {
                warn!(row = row.index(), error = %e, "Event skipped");
                scope.report.issues.push(e);
                return;
            }
        };
        scope.work.events.push(EventContext {
            event,
            resource,
            kind,
            grouping,
            interval,
            row: row.index(),
        });
    }

    fn timestamp(&self, entity_type: &str, attribute: &str, scope: &mut RowScope<'_>) -> Option<chrono::NaiveDateTime> {
        let raw = self.key_value(scope.row, entity_type, attribute)?;
        match cast_cell(attribute, raw, ValueKind::Timestamp, scope.lang) {
            Ok(value) => value.and_then(|v| v.as_timestamp()),
            Err(e) => {
                scope.report.issues.push(e);
                None
            }
        }
    }
}
