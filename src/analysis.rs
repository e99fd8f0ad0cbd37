//! Post-population summary of a registry.
//!
//! Reports how many instances each schema type received, which types stayed
//! empty, and which schema attributes and relations no instance uses. Types
//! are counted by their most specific type only.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::graph::IdentityRegistry;

/// Maximum sample names kept per type.
pub const SAMPLE_LIMIT: usize = 10;

/// Usage of one schema type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeUsage {
    pub count: usize,
    /// First instance names in name order, at most [`SAMPLE_LIMIT`].
    pub samples: Vec<String>,
    /// Attributes the type defines or inherits that no instance sets.
    pub unused_attributes: Vec<String>,
    /// Relations the type defines or inherits that no instance has an edge for.
    pub unused_relations: Vec<String>,
}

/// Summary of a populated registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationSummary {
    pub total_instances: usize,
    pub total_edges: usize,
    pub types: BTreeMap<String, TypeUsage>,
}

impl PopulationSummary {
    /// Types that received no instance.
    pub fn empty_types(&self) -> impl Iterator<Item = &str> {
        self.types
            .iter()
            .filter(|(_, usage)| usage.count == 0)
            .map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn count(&self, entity_type: &str) -> usize {
        self.types.get(entity_type).map_or(0, |u| u.count)
    }
}

/// Summarizes a registry against its schema.
#[must_use]
pub fn summarize(registry: &IdentityRegistry) -> PopulationSummary {
    let schema = registry.schema();
    let mut summary = PopulationSummary {
        total_instances: registry.len(),
        total_edges: registry.instances().map(|i| i.edge_count()).sum(),
        types: BTreeMap::new(),
    };

    for resolved in schema.types() {
        let instances: Vec<_> = registry
            .instances_of(resolved.name())
            .into_iter()
            .filter(|i| i.entity_type() == resolved.name())
            .collect();

        let mut set_attributes = BTreeSet::new();
        let mut set_relations = BTreeSet::new();
        for instance in &instances {
            set_attributes.extend(instance.attributes().map(|(name, _)| name));
            set_relations.extend(
                instance
                    .relations()
                    .filter(|(_, targets)| !targets.is_empty())
                    .map(|(name, _)| name),
            );
        }

        let usage = TypeUsage {
            count: instances.len(),
            samples: instances
                .iter()
                .take(SAMPLE_LIMIT)
                .map(|i| i.name().to_string())
                .collect(),
            unused_attributes: resolved
                .attributes()
                .filter(|a| !set_attributes.contains(a.name.as_str()))
                .map(|a| a.name.clone())
                .collect(),
            unused_relations: resolved
                .relations()
                .filter(|r| !set_relations.contains(r.name.as_str()))
                .map(|r| r.name.clone())
                .collect(),
        };
        summary.types.insert(resolved.name().to_string(), usage);
    }

    info!(
        instances = summary.total_instances,
        edges = summary.total_edges,
        empty_types = summary.empty_types().count(),
        "Population summary"
    );
    summary
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::schema::{EntityType, RelationDefinition, Schema};
    use crate::value::{Value, ValueKind};

    fn registry() -> IdentityRegistry {
        let schema = Schema::builder()
            .entity_type(
                EntityType::new("Equipment")
                    .attribute("equipmentId", ValueKind::String)
                    .attribute("equipmentModel", ValueKind::String)
                    .relation(RelationDefinition::new("memberOfClass", "EquipmentClass"))
                    .relation(RelationDefinition::new("isImmediatelyUpstreamOf", "Equipment")),
            )
            .entity_type(EntityType::new("EquipmentClass"))
            .entity_type(EntityType::new("Shift"))
            .build()
            .unwrap();
        IdentityRegistry::new(Arc::new(schema))
    }

    #[test]
    fn test_summary_counts_and_unused_members() {
        let mut reg = registry();
        let class = reg.get_or_create("EquipmentClass", "Filler", &[]).unwrap();
        for i in 0..12 {
            let id = reg.get_or_create("Equipment", &format!("E{i:02}"), &[]).unwrap();
            reg.set_attribute(id, "equipmentId", Some(Value::from(format!("E{i:02}").as_str())))
                .unwrap();
            reg.set_relation(id, "memberOfClass", Some(class)).unwrap();
        }

        let summary = summarize(&reg);
        assert_eq!(summary.total_instances, 13);
        assert_eq!(summary.total_edges, 12);
        assert_eq!(summary.count("Equipment"), 12);
        assert_eq!(summary.empty_types().collect::<Vec<_>>(), vec!["Shift"]);

        let equipment = &summary.types["Equipment"];
        assert_eq!(equipment.samples.len(), SAMPLE_LIMIT);
        assert_eq!(equipment.samples[0], "Equipment_E00");
        assert_eq!(equipment.unused_attributes, vec!["equipmentModel"]);
        assert_eq!(equipment.unused_relations, vec!["isImmediatelyUpstreamOf"]);
    }

    #[test]
    fn test_empty_registry() {
        let summary = summarize(&registry());
        assert_eq!(summary.total_instances, 0);
        assert_eq!(summary.empty_types().count(), 3);
    }
}
