//! Interfaces to collaborators that persist or check a populated graph.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::snapshot::GraphSnapshot;
use crate::schema::Schema;

/// Receives a finished graph, e.g. to serialize it to a store.
pub trait GraphSink {
    type Error: std::error::Error;

    /// Accepts one snapshot.
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn write(&mut self, snapshot: &GraphSnapshot) -> Result<(), Self::Error>;
}

/// Outcome of a consistency check over a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConsistencyVerdict {
    Consistent,
    Inconsistent {
        /// Human-readable violations, one per offending instance or edge.
        violations: Vec<String>,
    },
    /// The checker could not decide (e.g. it timed out or is unavailable).
    Unknown {
        reason: String,
    },
}

impl ConsistencyVerdict {
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        matches!(self, Self::Consistent)
    }
}

/// Checks a graph for logical consistency, e.g. through an external reasoner.
pub trait ConsistencyChecker {
    fn check(&self, snapshot: &GraphSnapshot) -> ConsistencyVerdict;
}

/// Sink that keeps every snapshot in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    snapshots: Vec<GraphSnapshot>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshots(&self) -> &[GraphSnapshot] {
        &self.snapshots
    }

    #[must_use]
    pub fn last(&self) -> Option<&GraphSnapshot> {
        self.snapshots.last()
    }
}

impl GraphSink for MemorySink {
    type Error = std::convert::Infallible;

    fn write(&mut self, snapshot: &GraphSnapshot) -> Result<(), Self::Error> {
        self.snapshots.push(snapshot.clone());
        Ok(())
    }
}

/// Checks the structural guarantees the registry is meant to uphold.
///
/// Verifies that every instance has a schema type, every edge targets a
/// known instance, single-valued relations hold at most one target, and
/// declared inverses are mirrored.
#[derive(Debug, Clone, Copy)]
pub struct StructuralChecker<'a> {
    schema: &'a Schema,
}

impl<'a> StructuralChecker<'a> {
    #[must_use]
    pub const fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }
}

impl ConsistencyChecker for StructuralChecker<'_> {
    fn check(&self, snapshot: &GraphSnapshot) -> ConsistencyVerdict {
        let mut violations = Vec::new();
        let names: BTreeSet<&str> = snapshot.instances.iter().map(|i| i.name.as_str()).collect();

        for instance in &snapshot.instances {
            let Some(resolved) = self.schema.get(&instance.entity_type) else {
                violations.push(format!("{}: unknown type '{}'", instance.name, instance.entity_type));
                continue;
            };
            for (relation, targets) in &instance.relations {
                let Some(definition) = resolved.relation(relation) else {
                    violations.push(format!("{}: undefined relation '{relation}'", instance.name));
                    continue;
                };
                if definition.cardinality.is_single() && targets.len() > 1 {
                    violations.push(format!(
                        "{}: single-valued '{relation}' has {} targets",
                        instance.name,
                        targets.len()
                    ));
                }
                for target in targets {
                    if !names.contains(target.as_str()) {
                        violations.push(format!("{}: '{relation}' targets missing '{target}'", instance.name));
                        continue;
                    }
                    let Some(inverse) = definition.inverse.as_deref() else {
                        continue;
                    };
                    let mirrored = snapshot.find(target).is_some_and(|t| {
                        self.schema.relation(&t.entity_type, inverse).is_none()
                            || t.relations
                                .get(inverse)
                                .is_some_and(|back| back.iter().any(|n| *n == instance.name))
                    });
                    if !mirrored {
                        violations.push(format!(
                            "{}: '{relation}' -> '{target}' lacks inverse '{inverse}'",
                            instance.name
                        ));
                    }
                }
            }
        }

        if violations.is_empty() {
            ConsistencyVerdict::Consistent
        } else {
            ConsistencyVerdict::Inconsistent { violations }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;
    use crate::graph::snapshot::InstanceSnapshot;
    use crate::graph::IdentityRegistry;
    use crate::schema::{EntityType, RelationDefinition};

    fn schema() -> Schema {
        Schema::builder()
            .entity_type(EntityType::new("Equipment").relation(
                RelationDefinition::new("isPartOfProductionLine", "ProductionLine").with_inverse("hasEquipmentPart"),
            ))
            .entity_type(EntityType::new("ProductionLine").relation(
                RelationDefinition::new("hasEquipmentPart", "Equipment")
                    .multi()
                    .with_inverse("isPartOfProductionLine"),
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn test_registry_output_is_consistent() {
        let schema = Arc::new(schema());
        let mut reg = IdentityRegistry::new(Arc::clone(&schema));
        let eq = reg.get_or_create("Equipment", "E1", &[]).unwrap();
        let line = reg.get_or_create("ProductionLine", "L1", &[]).unwrap();
        reg.set_relation(eq, "isPartOfProductionLine", Some(line)).unwrap();

        let mut sink = MemorySink::new();
        sink.write(&reg.snapshot()).unwrap();
        let verdict = StructuralChecker::new(&schema).check(sink.last().unwrap());
        assert!(verdict.is_consistent());
        assert_eq!(sink.snapshots().len(), 1);
    }

    #[test]
    fn test_detects_violations() {
        let snapshot = GraphSnapshot {
            instances: vec![
                InstanceSnapshot {
                    name: "Equipment_E1".to_string(),
                    entity_type: "Equipment".to_string(),
                    labels: vec![],
                    attributes: BTreeMap::new(),
                    relations: BTreeMap::from([(
                        "isPartOfProductionLine".to_string(),
                        vec!["ProductionLine_L1".to_string(), "ProductionLine_L2".to_string()],
                    )]),
                },
                InstanceSnapshot {
                    name: "ProductionLine_L1".to_string(),
                    entity_type: "ProductionLine".to_string(),
                    labels: vec![],
                    attributes: BTreeMap::new(),
                    relations: BTreeMap::new(),
                },
            ],
        };
        let schema = schema();
        match StructuralChecker::new(&schema).check(&snapshot) {
            ConsistencyVerdict::Inconsistent { violations } => {
                assert_eq!(violations.len(), 3);
                assert!(violations[0].contains("has 2 targets"));
                assert!(violations[1].contains("lacks inverse"));
                assert!(violations[2].contains("missing 'ProductionLine_L2'"));
            }
            other => panic!("expected inconsistent verdict, got {other:?}"),
        }
    }
}
