//! Identity registry: the single owner and mutation point of instances.
//!
//! Every instance is created through [`IdentityRegistry::get_or_create`],
//! which guarantees at most one instance per natural key. Attribute and
//! relation writes go through the same registry so cardinality and inverse
//! relations are enforced in one place.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, error, trace};

use super::instance::EntityInstance;
use super::snapshot::GraphSnapshot;
use crate::error::PopulationError;
use crate::naming::{InstanceId, NaturalKey};
use crate::schema::Schema;
use crate::value::Value;

/// Deduplicating store of entity instances.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use plantgraph::schema::{EntityType, Schema};
/// use plantgraph::{IdentityRegistry, ValueKind};
///
/// let schema = Schema::builder()
///     .entity_type(EntityType::new("Plant").attribute("plantId", ValueKind::String))
///     .build()
///     .unwrap();
/// let mut registry = IdentityRegistry::new(Arc::new(schema));
///
/// let first = registry.get_or_create("Plant", "P1", &["Plant P1"]).unwrap();
/// let again = registry.get_or_create("Plant", " P1 ", &[]).unwrap();
/// assert_eq!(first, again);
/// assert_eq!(registry.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct IdentityRegistry {
    schema: Arc<Schema>,
    instances: HashMap<InstanceId, EntityInstance>,
    by_key: HashMap<NaturalKey, InstanceId>,
}

impl IdentityRegistry {
    #[must_use]
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            instances: HashMap::new(),
            by_key: HashMap::new(),
        }
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Builds the natural key an entity type would use for a base identifier.
    ///
    /// # Errors
    ///
    /// Returns [`PopulationError::UnknownEntityType`] if the type is not in the schema.
    pub fn key_for(&self, entity_type: &str, base: &str) -> Result<NaturalKey, PopulationError> {
        let scope = self
            .schema
            .identity_scope(entity_type)
            .ok_or_else(|| PopulationError::UnknownEntityType {
                name: entity_type.to_string(),
            })?;
        Ok(NaturalKey::new(scope, base))
    }

    /// Returns the instance for `(entity_type, base)`, creating it if absent.
    ///
    /// An existing instance of the same type or a supertype is reused (and
    /// refined to the more specific type); labels not yet present are added.
    ///
    /// # Errors
    ///
    /// - [`PopulationError::EmptyIdentifier`] if `base` is blank
    /// - [`PopulationError::UnknownEntityType`] if the type is not in the schema
    /// - [`PopulationError::IdentityCollision`] if the key is bound to an
    ///   instance of an incompatible type
    pub fn get_or_create(
        &mut self,
        entity_type: &str,
        base: &str,
        labels: &[&str],
    ) -> Result<InstanceId, PopulationError> {
        if base.trim().is_empty() {
            return Err(PopulationError::EmptyIdentifier {
                entity_type: entity_type.to_string(),
            });
        }
        let key = self.key_for(entity_type, base)?;

        if let Some(&id) = self.by_key.get(&key) {
            let schema = Arc::clone(&self.schema);
            let instance = self
                .instances
                .get_mut(&id)
                .ok_or_else(|| PopulationError::UnknownInstance {
                    name: key.instance_name(),
                })?;
            let existing = instance.entity_type().to_string();
            if !schema.are_compatible(&existing, entity_type) {
                error!(
                    key = %key,
                    existing_type = %existing,
                    requested_type = %entity_type,
                    "Identity collision"
                );
                return Err(PopulationError::IdentityCollision {
                    key: key.to_string(),
                    existing_type: existing,
                    requested_type: entity_type.to_string(),
                });
            }
            if existing != entity_type && schema.is_subtype_of(entity_type, &existing) {
                debug!(instance = %instance.name(), from = %existing, to = %entity_type, "Refined instance type");
                instance.refine_type(entity_type);
            }
            for label in labels {
                instance.add_label(label);
            }
            trace!(instance = %instance.name(), "Reused instance");
            return Ok(id);
        }

        let mut instance = EntityInstance::new(key.clone(), entity_type);
        for label in labels {
            instance.add_label(label);
        }
        let id = instance.id();
        debug!(instance = %instance.name(), entity_type = %entity_type, "Created instance");
        self.instances.insert(id, instance);
        self.by_key.insert(key, id);
        Ok(id)
    }

    /// Finds an existing instance usable as an `entity_type` (same type or subtype).
    #[must_use]
    pub fn lookup(&self, entity_type: &str, base: &str) -> Option<InstanceId> {
        if base.trim().is_empty() {
            return None;
        }
        let key = self.key_for(entity_type, base).ok()?;
        let id = *self.by_key.get(&key)?;
        let instance = self.instances.get(&id)?;
        self.schema
            .is_subtype_of(instance.entity_type(), entity_type)
            .then_some(id)
    }

    #[must_use]
    pub fn get(&self, id: InstanceId) -> Option<&EntityInstance> {
        self.instances.get(&id)
    }

    /// Returns the instance name, or the id rendered as text when unknown.
    #[must_use]
    pub fn name_of(&self, id: InstanceId) -> String {
        self.instances
            .get(&id)
            .map_or_else(|| id.to_string(), |i| i.name().to_string())
    }

    /// Sets an attribute value according to its declared cardinality.
    ///
    /// `None` and blank strings are no-ops. Returns whether the instance changed.
    ///
    /// # Errors
    ///
    /// - [`PopulationError::UnknownInstance`] if `id` is not registered
    /// - [`PopulationError::UndefinedAttribute`] if the type lacks the attribute
    pub fn set_attribute(
        &mut self,
        id: InstanceId,
        attribute: &str,
        value: Option<Value>,
    ) -> Result<bool, PopulationError> {
        let instance = self
            .instances
            .get_mut(&id)
            .ok_or_else(|| PopulationError::UnknownInstance {
                name: id.to_string(),
            })?;
        let definition = self
            .schema
            .attribute(instance.entity_type(), attribute)
            .ok_or_else(|| PopulationError::UndefinedAttribute {
                entity_type: instance.entity_type().to_string(),
                attribute: attribute.to_string(),
            })?;

        let Some(value) = value else {
            return Ok(false);
        };
        if value.as_text().is_some_and(|t| t.trim().is_empty()) {
            return Ok(false);
        }

        let changed = if definition.cardinality.is_single() {
            instance.put_single(attribute, value)
        } else {
            instance.put_multi(attribute, value)
        };
        if changed {
            trace!(instance = %instance.name(), attribute = %attribute, "Set attribute");
        }
        Ok(changed)
    }

    /// Sets a relation edge and its declared inverse.
    ///
    /// Single-valued relations replace their previous target (and the stale
    /// inverse edge is removed); multi-valued relations add the target if
    /// absent. `None` is a no-op. Returns whether the source changed.
    ///
    /// # Errors
    ///
    /// - [`PopulationError::UnknownInstance`] if either instance is not registered
    /// - [`PopulationError::UndefinedRelation`] if the source type lacks the relation
    /// - [`PopulationError::IncompatibleRelationTarget`] if the target's type
    ///   is not one of the relation's target types
    pub fn set_relation(
        &mut self,
        source: InstanceId,
        relation: &str,
        target: Option<InstanceId>,
    ) -> Result<bool, PopulationError> {
        let source_type = self.type_of(source)?;
        let definition = self
            .schema
            .relation(&source_type, relation)
            .cloned()
            .ok_or_else(|| PopulationError::UndefinedRelation {
                entity_type: source_type.clone(),
                relation: relation.to_string(),
            })?;

        let Some(target) = target else {
            return Ok(false);
        };
        let target_type = self.type_of(target)?;
        if !definition
            .targets
            .iter()
            .any(|t| self.schema.is_subtype_of(&target_type, t))
        {
            return Err(PopulationError::IncompatibleRelationTarget {
                relation: relation.to_string(),
                target_type,
            });
        }

        let displaced = self.put_edge(source, relation, target, definition.cardinality.is_single());
        let Some(displaced) = displaced else {
            return Ok(false);
        };
        debug!(
            source = %self.name_of(source),
            relation = %relation,
            target = %self.name_of(target),
            "Set relation"
        );

        if let Some(inverse) = definition.inverse.as_deref() {
            for old in displaced {
                self.remove_edge(old, inverse, source);
            }
            match self.schema.relation(&target_type, inverse) {
                Some(inverse_def) => {
                    let single = inverse_def.cardinality.is_single();
                    if let Some(stale) = self.put_edge(target, inverse, source, single) {
                        for partner in stale {
                            self.remove_edge(partner, relation, target);
                        }
                    }
                }
                None => debug!(
                    target_type = %target_type,
                    inverse = %inverse,
                    "Inverse relation not defined on target type; skipped"
                ),
            }
        }
        Ok(true)
    }

    /// Returns every target of a relation on an instance.
    #[must_use]
    pub fn relation_targets(&self, id: InstanceId, relation: &str) -> Vec<InstanceId> {
        self.instances
            .get(&id)
            .map(|i| i.targets(relation))
            .unwrap_or_default()
    }

    /// Iterates over all instances in unspecified order.
    pub fn instances(&self) -> impl Iterator<Item = &EntityInstance> {
        self.instances.values()
    }

    /// Instances of a type or any of its subtypes, sorted by name.
    #[must_use]
    pub fn instances_of(&self, entity_type: &str) -> Vec<&EntityInstance> {
        let mut found: Vec<&EntityInstance> = self
            .instances
            .values()
            .filter(|i| self.schema.is_subtype_of(i.entity_type(), entity_type))
            .collect();
        found.sort_by(|a, b| a.name().cmp(b.name()));
        found
    }

    /// Number of instances per most specific type.
    #[must_use]
    pub fn count_by_type(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for instance in self.instances.values() {
            *counts.entry(instance.entity_type().to_string()).or_insert(0) += 1;
        }
        counts
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Takes a deterministic snapshot of the current graph.
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::capture(self)
    }

    fn type_of(&self, id: InstanceId) -> Result<String, PopulationError> {
        self.instances
            .get(&id)
            .map(|i| i.entity_type().to_string())
            .ok_or_else(|| PopulationError::UnknownInstance {
                name: id.to_string(),
            })
    }

    /// Writes one edge. Returns `None` if nothing changed, else the targets it displaced.
    fn put_edge(
        &mut self,
        source: InstanceId,
        relation: &str,
        target: InstanceId,
        single: bool,
    ) -> Option<Vec<InstanceId>> {
        let instance = self.instances.get_mut(&source)?;
        if single {
            instance.put_edge_single(relation, target)
        } else {
            instance.put_edge_multi(relation, target).then(Vec::new)
        }
    }

    fn remove_edge(&mut self, source: InstanceId, relation: &str, target: InstanceId) {
        if let Some(instance) = self.instances.get_mut(&source) {
            if instance.remove_edge(relation, target) {
                trace!(source = %instance.name(), relation = %relation, "Removed stale edge");
            }
        }
    }
}
