//! Entity instances held by the registry.

use std::collections::{BTreeMap, BTreeSet};

use crate::naming::{InstanceId, NaturalKey};
use crate::value::Value;

/// A node of the entity graph.
///
/// Instances are only created and mutated through
/// [`IdentityRegistry`](super::IdentityRegistry); callers get read access.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInstance {
    id: InstanceId,
    key: NaturalKey,
    name: String,
    entity_type: String,
    labels: BTreeSet<String>,
    attributes: BTreeMap<String, Vec<Value>>,
    relations: BTreeMap<String, BTreeSet<InstanceId>>,
}

impl EntityInstance {
    pub(crate) fn new(key: NaturalKey, entity_type: impl Into<String>) -> Self {
        Self {
            id: InstanceId::for_key(&key),
            name: key.instance_name(),
            key,
            entity_type: entity_type.into(),
            labels: BTreeSet::new(),
            attributes: BTreeMap::new(),
            relations: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> InstanceId {
        self.id
    }

    #[must_use]
    pub const fn key(&self) -> &NaturalKey {
        &self.key
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The most specific type this instance is known to have.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    /// Returns the first value of an attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).and_then(|v| v.first())
    }

    /// Returns every value of an attribute.
    #[must_use]
    pub fn attribute_values(&self, name: &str) -> &[Value] {
        self.attributes.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Returns the target of a relation, if any.
    ///
    /// For multi-valued relations this is the smallest target id.
    #[must_use]
    pub fn related(&self, relation: &str) -> Option<InstanceId> {
        self.relations
            .get(relation)
            .and_then(|t| t.iter().next().copied())
    }

    /// Returns every target of a relation.
    #[must_use]
    pub fn targets(&self, relation: &str) -> Vec<InstanceId> {
        self.relations
            .get(relation)
            .map(|t| t.iter().copied().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_relation(&self, relation: &str) -> bool {
        self.relations.get(relation).is_some_and(|t| !t.is_empty())
    }

    pub fn relations(&self) -> impl Iterator<Item = (&str, &BTreeSet<InstanceId>)> {
        self.relations.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of outgoing edges across all relations.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.relations.values().map(BTreeSet::len).sum()
    }

    pub(crate) fn refine_type(&mut self, entity_type: &str) {
        self.entity_type = entity_type.to_string();
    }

    pub(crate) fn add_label(&mut self, label: &str) -> bool {
        let label = label.trim();
        !label.is_empty() && self.labels.insert(label.to_string())
    }

    /// Replaces the value of a single-valued attribute. Returns false if unchanged.
    pub(crate) fn put_single(&mut self, name: &str, value: Value) -> bool {
        let slot = self.attributes.entry(name.to_string()).or_default();
        if slot.len() == 1 && slot[0] == value {
            return false;
        }
        slot.clear();
        slot.push(value);
        true
    }

    /// Adds a value to a multi-valued attribute. Returns false if already present.
    pub(crate) fn put_multi(&mut self, name: &str, value: Value) -> bool {
        let slot = self.attributes.entry(name.to_string()).or_default();
        if slot.contains(&value) {
            return false;
        }
        slot.push(value);
        true
    }

    /// Sets a single-valued edge, returning the displaced targets.
    pub(crate) fn put_edge_single(&mut self, relation: &str, target: InstanceId) -> Option<Vec<InstanceId>> {
        let slot = self.relations.entry(relation.to_string()).or_default();
        if slot.len() == 1 && slot.contains(&target) {
            return None;
        }
        let displaced: Vec<InstanceId> = slot.iter().copied().filter(|t| *t != target).collect();
        slot.clear();
        slot.insert(target);
        Some(displaced)
    }

    /// Adds a multi-valued edge. Returns false if already present.
    pub(crate) fn put_edge_multi(&mut self, relation: &str, target: InstanceId) -> bool {
        self.relations
            .entry(relation.to_string())
            .or_default()
            .insert(target)
    }

    pub(crate) fn remove_edge(&mut self, relation: &str, target: InstanceId) -> bool {
        let Some(slot) = self.relations.get_mut(relation) else {
            return false;
        };
        let removed = slot.remove(&target);
        if slot.is_empty() {
            self.relations.remove(relation);
        }
        removed
    }
}
