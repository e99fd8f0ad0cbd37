//! Deterministic, serializable view of a populated graph.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::registry::IdentityRegistry;
use crate::value::Value;

/// One instance as seen in a [`GraphSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    pub name: String,
    pub entity_type: String,
    pub labels: Vec<String>,
    pub attributes: BTreeMap<String, Vec<Value>>,
    /// Relation name to target instance names, sorted.
    pub relations: BTreeMap<String, Vec<String>>,
}

/// Graph contents ordered by instance name, independent of insertion order.
///
/// Two populations over the same rows produce equal snapshots regardless
/// of row order, which makes this the comparison basis for reproducibility
/// checks and the hand-off format for sinks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub instances: Vec<InstanceSnapshot>,
}

impl GraphSnapshot {
    pub(crate) fn capture(registry: &IdentityRegistry) -> Self {
        let mut instances: Vec<InstanceSnapshot> = registry
            .instances()
            .map(|instance| {
                let relations = instance
                    .relations()
                    .map(|(name, targets)| {
                        let mut names: Vec<String> = targets.iter().map(|t| registry.name_of(*t)).collect();
                        names.sort();
                        (name.to_string(), names)
                    })
                    .collect();
                let mut attributes: BTreeMap<String, Vec<Value>> = BTreeMap::new();
                for (name, values) in instance.attributes() {
                    attributes.insert(name.to_string(), values.to_vec());
                }
                InstanceSnapshot {
                    name: instance.name().to_string(),
                    entity_type: instance.entity_type().to_string(),
                    labels: instance.labels().map(str::to_string).collect(),
                    attributes,
                    relations,
                }
            })
            .collect();
        instances.sort_by(|a, b| a.name.cmp(&b.name));
        Self { instances }
    }

    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.instances
            .iter()
            .flat_map(|i| i.relations.values())
            .map(Vec::len)
            .sum()
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&InstanceSnapshot> {
        self.instances
            .binary_search_by(|i| i.name.as_str().cmp(name))
            .ok()
            .map(|idx| &self.instances[idx])
    }

    /// Serializes the snapshot as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be represented in JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
