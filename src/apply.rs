//! Attribute and relation applier.
//!
//! Applies mapping entries of one entity type to one instance for one row.
//! Every failure is attributed to the single entry that caused it and
//! collected in an [`ApplyOutcome`]; nothing here aborts the row.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::cast::cast_cell;
use crate::error::PopulationError;
use crate::graph::IdentityRegistry;
use crate::naming::InstanceId;
use crate::row::Row;
use crate::schema::{AttributeMapping, EntityMapping, RelationMapping, RelationSource};

/// Instances created or touched while processing one row.
///
/// Each instance is reachable by a context key (its entity type name, or a
/// role such as `Resource`). Relation mappings with a row-context source
/// resolve their target through these keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowInstances {
    by_key: BTreeMap<String, InstanceId>,
    touched: Vec<(String, InstanceId)>,
}

impl RowInstances {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an instance under the type it was created as.
    pub fn record(&mut self, entity_type: &str, id: InstanceId) {
        self.by_key.insert(entity_type.to_string(), id);
        if !self.touched.iter().any(|(_, t)| *t == id) {
            self.touched.push((entity_type.to_string(), id));
        }
    }

    /// Binds an extra context key (a role) to an already recorded instance.
    pub fn alias(&mut self, key: &str, id: InstanceId) {
        self.by_key.insert(key.to_string(), id);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<InstanceId> {
        self.by_key.get(key).copied()
    }

    /// Touched instances with the type they were recorded as, in creation order.
    pub fn touched(&self) -> impl Iterator<Item = (&str, InstanceId)> {
        self.touched.iter().map(|(t, id)| (t.as_str(), *id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.touched.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.touched.is_empty()
    }
}

/// Result of writing one attribute from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeWrite {
    /// The instance changed.
    Set,
    /// The value was already present.
    Unchanged,
    /// The cell was blank, null-like or unmapped.
    Absent,
    /// The cell could not be cast; the mapping default was written instead.
    Defaulted(PopulationError),
}

/// Accumulated results of applying several mapping entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyOutcome {
    /// Entries that changed the graph.
    pub applied: usize,
    /// Entries that produced nothing.
    pub skipped: usize,
    /// Per-entry problems, including cast failures recovered by a default.
    pub issues: Vec<PopulationError>,
}

impl ApplyOutcome {
    pub fn merge(&mut self, other: Self) {
        self.applied += other.applied;
        self.skipped += other.skipped;
        self.issues.extend(other.issues);
    }

    fn record_attribute(&mut self, result: Result<AttributeWrite, PopulationError>) {
        match result {
            Ok(AttributeWrite::Set) => self.applied += 1,
            Ok(AttributeWrite::Unchanged | AttributeWrite::Absent) => self.skipped += 1,
            Ok(AttributeWrite::Defaulted(issue)) => {
                self.applied += 1;
                self.issues.push(issue);
            }
            Err(issue) => {
                self.skipped += 1;
                self.issues.push(issue);
            }
        }
    }
}

/// Casts the mapped cell and writes it to the instance.
///
/// Derived attributes are [`AttributeWrite::Absent`] here; they are written
/// by the stage that computes them.
///
/// # Errors
///
/// - [`PopulationError::CastFailure`] if the cell cannot be cast and the
///   mapping has no usable default
/// - any error of [`IdentityRegistry::set_attribute`]
pub fn apply_attribute(
    registry: &mut IdentityRegistry,
    id: InstanceId,
    mapping: &AttributeMapping,
    row: &Row,
    lang: &str,
) -> Result<AttributeWrite, PopulationError> {
    let Some(column) = mapping.source_column() else {
        return Ok(AttributeWrite::Absent);
    };
    let Some(raw) = row.get(column) else {
        return Ok(AttributeWrite::Absent);
    };

    let (value, fallback) = match cast_cell(&mapping.attribute, raw, mapping.kind, lang) {
        Ok(value) => (value, None),
        Err(failure) => {
            let Some(default) = mapping.default.as_deref() else {
                warn!(row = row.index(), attribute = %mapping.attribute, error = %failure, "Cast failed; value skipped");
                return Err(failure);
            };
            match cast_cell(&mapping.attribute, default, mapping.kind, lang) {
                Ok(value) => {
                    warn!(row = row.index(), attribute = %mapping.attribute, default = %default, "Cast failed; using default");
                    (value, Some(failure))
                }
                Err(_) => {
                    warn!(row = row.index(), attribute = %mapping.attribute, error = %failure, "Cast failed and default unusable");
                    return Err(failure);
                }
            }
        }
    };

    if value.is_none() {
        return Ok(AttributeWrite::Absent);
    }
    let changed = registry.set_attribute(id, &mapping.attribute, value)?;
    Ok(match (fallback, changed) {
        (Some(issue), _) => AttributeWrite::Defaulted(issue),
        (None, true) => AttributeWrite::Set,
        (None, false) => AttributeWrite::Unchanged,
    })
}

/// Applies every column-driven attribute mapping of a type to one instance.
pub fn apply_attributes(
    registry: &mut IdentityRegistry,
    id: InstanceId,
    mapping: &EntityMapping,
    row: &Row,
    lang: &str,
) -> ApplyOutcome {
    let mut outcome = ApplyOutcome::default();
    for attribute in &mapping.attributes {
        outcome.record_attribute(apply_attribute(registry, id, attribute, row, lang));
    }
    outcome
}

/// Finds the target of a relation mapping for one row.
///
/// Returns `Ok(None)` when the row carries nothing to resolve (blank column,
/// no instance under the context key, or a derived source).
///
/// # Errors
///
/// Returns [`PopulationError::RelationTargetNotFound`] when a column names a
/// key no instance of the target type has.
pub fn resolve_relation(
    registry: &IdentityRegistry,
    mapping: &RelationMapping,
    row: &Row,
    local: &RowInstances,
) -> Result<Option<InstanceId>, PopulationError> {
    match &mapping.source {
        RelationSource::Column(column) => {
            let Some(key) = row.get(column) else {
                return Ok(None);
            };
            registry
                .lookup(&mapping.target_type, key)
                .map(Some)
                .ok_or_else(|| PopulationError::RelationTargetNotFound {
                    relation: mapping.relation.clone(),
                    target_type: mapping.target_type.clone(),
                    target_key: key.to_string(),
                })
        }
        RelationSource::RowContext(key) => Ok(local.get(key)),
        RelationSource::Derived(_) => Ok(None),
    }
}

/// Resolves and sets one relation.
///
/// Returns whether the graph changed.
///
/// # Errors
///
/// Any error of [`resolve_relation`] or [`IdentityRegistry::set_relation`].
pub fn apply_relation(
    registry: &mut IdentityRegistry,
    id: InstanceId,
    mapping: &RelationMapping,
    row: &Row,
    local: &RowInstances,
) -> Result<bool, PopulationError> {
    let Some(target) = resolve_relation(registry, mapping, row, local)? else {
        debug!(row = row.index(), relation = %mapping.relation, "No relation target in row");
        return Ok(false);
    };
    if target == id {
        return Ok(false);
    }
    registry.set_relation(id, &mapping.relation, Some(target))
}

/// Applies every non-derived relation mapping of a type to one instance.
pub fn apply_relations(
    registry: &mut IdentityRegistry,
    id: InstanceId,
    mapping: &EntityMapping,
    row: &Row,
    local: &RowInstances,
) -> ApplyOutcome {
    let mut outcome = ApplyOutcome::default();
    for relation in mapping.relations.iter().filter(|r| !r.is_derived()) {
        match apply_relation(registry, id, relation, row, local) {
            Ok(true) => outcome.applied += 1,
            Ok(false) => outcome.skipped += 1,
            Err(issue) => {
                warn!(
                    row = row.index(),
                    source = %registry.name_of(id),
                    relation = %relation.relation,
                    error = %issue,
                    "Relation skipped"
                );
                outcome.skipped += 1;
                outcome.issues.push(issue);
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::schema::{AttributeMapping, EntityType, RelationDefinition, Schema, SchemaMapping};
    use crate::value::{Value, ValueKind};

    fn registry() -> IdentityRegistry {
        let schema = Schema::builder()
            .entity_type(
                EntityType::new("Plant")
                    .attribute("plantId", ValueKind::String)
                    .attribute("plantName", ValueKind::TaggedString),
            )
            .entity_type(
                EntityType::new("Area")
                    .attribute("areaId", ValueKind::String)
                    .attribute("capacity", ValueKind::Integer)
                    .relation(RelationDefinition::new("locatedInPlant", "Plant"))
                    .relation(RelationDefinition::new("feeds", "Area").multi()),
            )
            .build()
            .unwrap();
        IdentityRegistry::new(Arc::new(schema))
    }

    fn mapping() -> SchemaMapping {
        SchemaMapping::new()
            .attribute("Plant", AttributeMapping::column("plantId", "PLANT_ID", ValueKind::String))
            .attribute("Plant", AttributeMapping::column("plantName", "PLANT_NAME", ValueKind::TaggedString))
            .attribute(
                "Area",
                AttributeMapping::column("capacity", "CAPACITY", ValueKind::Integer).with_default("0"),
            )
            .relation("Area", RelationMapping::row_context("locatedInPlant", "Plant", "Plant"))
            .relation("Area", RelationMapping::column("feeds", "Area", "FEEDS").multi())
    }

    #[test]
    fn test_apply_attributes_with_language() {
        let mut reg = registry();
        let plant = reg.get_or_create("Plant", "P1", &[]).unwrap();
        let row = Row::new(0).with("PLANT_ID", "P1").with("PLANT_NAME", "Planta Uno");
        let mapping = mapping();

        let outcome = apply_attributes(&mut reg, plant, mapping.entity("Plant").unwrap(), &row, "es");
        assert_eq!(outcome.applied, 2);
        assert!(outcome.issues.is_empty());
        let instance = reg.get(plant).unwrap();
        assert_eq!(instance.attribute("plantName"), Some(&Value::tagged("Planta Uno", "es")));

        let again = apply_attributes(&mut reg, plant, mapping.entity("Plant").unwrap(), &row, "es");
        assert_eq!(again.applied, 0);
        assert_eq!(again.skipped, 2);
    }

    #[test]
    fn test_cast_failure_uses_default() {
        let mut reg = registry();
        let area = reg.get_or_create("Area", "A1", &[]).unwrap();
        let row = Row::new(4).with("CAPACITY", "lots");
        let attr = AttributeMapping::column("capacity", "CAPACITY", ValueKind::Integer).with_default("0");

        let write = apply_attribute(&mut reg, area, &attr, &row, "en").unwrap();
        assert!(matches!(write, AttributeWrite::Defaulted(PopulationError::CastFailure { .. })));
        assert_eq!(reg.get(area).unwrap().attribute("capacity"), Some(&Value::Integer(0)));

        let strict = AttributeMapping::column("capacity", "CAPACITY", ValueKind::Integer);
        assert!(apply_attribute(&mut reg, area, &strict, &row, "en").is_err());
    }

    #[test]
    fn test_blank_cell_is_absent() {
        let mut reg = registry();
        let area = reg.get_or_create("Area", "A1", &[]).unwrap();
        let attr = AttributeMapping::column("capacity", "CAPACITY", ValueKind::Integer);
        let write = apply_attribute(&mut reg, area, &attr, &Row::new(0).with("CAPACITY", " "), "en").unwrap();
        assert_eq!(write, AttributeWrite::Absent);
    }

    #[test]
    fn test_undefined_attribute_is_reported() {
        let mut reg = registry();
        let area = reg.get_or_create("Area", "A1", &[]).unwrap();
        let attr = AttributeMapping::column("color", "COLOR", ValueKind::String);
        let err = apply_attribute(&mut reg, area, &attr, &Row::new(0).with("COLOR", "red"), "en").unwrap_err();
        assert!(matches!(err, PopulationError::UndefinedAttribute { .. }));
    }

    #[test]
    fn test_relations_from_context_and_column() {
        let mut reg = registry();
        let plant = reg.get_or_create("Plant", "P1", &[]).unwrap();
        let upstream = reg.get_or_create("Area", "A0", &[]).unwrap();
        let area = reg.get_or_create("Area", "A1", &[]).unwrap();

        let mut local = RowInstances::new();
        local.record("Plant", plant);
        local.record("Area", area);

        let row = Row::new(1).with("FEEDS", "A0");
        let mapping = mapping();
        let outcome = apply_relations(&mut reg, area, mapping.entity("Area").unwrap(), &row, &local);
        assert_eq!(outcome.applied, 2);
        assert_eq!(reg.get(area).unwrap().related("locatedInPlant"), Some(plant));
        assert_eq!(reg.get(area).unwrap().targets("feeds"), vec![upstream]);
    }

    #[test]
    fn test_missing_target_skips_only_that_relation() {
        let mut reg = registry();
        let plant = reg.get_or_create("Plant", "P1", &[]).unwrap();
        let area = reg.get_or_create("Area", "A1", &[]).unwrap();
        let mut local = RowInstances::new();
        local.record("Plant", plant);

        let row = Row::new(2).with("FEEDS", "A9");
        let mapping = mapping();
        let outcome = apply_relations(&mut reg, area, mapping.entity("Area").unwrap(), &row, &local);
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.issues.len(), 1);
        assert!(matches!(
            &outcome.issues[0],
            PopulationError::RelationTargetNotFound { target_key, .. } if target_key == "A9"
        ));
        assert!(reg.get(area).unwrap().has_relation("locatedInPlant"));
    }

    #[test]
    fn test_row_instances_alias() {
        let mut reg = registry();
        let plant = reg.get_or_create("Plant", "P1", &[]).unwrap();
        let mut local = RowInstances::new();
        local.record("Plant", plant);
        local.record("Plant", plant);
        local.alias("Resource", plant);
        assert_eq!(local.len(), 1);
        assert_eq!(local.get("Resource"), Some(plant));
        assert_eq!(local.touched().next(), Some(("Plant", plant)));
    }
}
